//! Entity lump parsing and serialization.
//!
//! The lump is a sequence of `{ "key" "value" ... }` blocks. Keys keep their
//! insertion order per dict, which matters for byte-stable round trips: the light
//! stage only touches `style` keys and the `lightmap_scale` rename before the lump
//! is written back.

use glam::Vec3;

use crate::{util, LightError, LightResult};

/// Maximum entity key length including the NUL the engine reserves.
pub const MAX_ENT_KEY: usize = 32;
/// Maximum entity value length including the NUL the engine reserves.
pub const MAX_ENT_VALUE: usize = 1024;

/// A single entity: an insertion-ordered string map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntDict {
	pairs: Vec<(String, String)>,
}

impl EntDict {
	pub fn get(&self, key: &str) -> Option<&str> {
		self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// The value for `key`, or the empty string when absent.
	pub fn string_for_key(&self, key: &str) -> &str {
		self.get(key).unwrap_or("")
	}

	/// The leading float of the value for `key`, or 0 when absent or unparsable.
	pub fn float_for_key(&self, key: &str) -> f32 {
		util::parse_float(self.string_for_key(key)).unwrap_or(0.0)
	}

	/// scanf-style vector read: parses up to three floats, missing components stay 0.
	pub fn vec3_for_key(&self, key: &str) -> Vec3 {
		let mut vec = Vec3::ZERO;
		for (i, t) in self.string_for_key(key).split_whitespace().take(3).enumerate() {
			match t.parse() {
				Ok(f) => vec[i] = f,
				Err(_) => break,
			}
		}
		vec
	}

	/// Set `key` to `value`, overwriting in place when the key already exists so the
	/// original position is kept.
	pub fn set(&mut self, key: &str, value: &str) {
		match self.pairs.iter_mut().find(|(k, _)| k == key) {
			Some((_, v)) => *v = value.to_string(),
			None => self.pairs.push((key.to_string(), value.to_string())),
		}
	}

	pub fn remove(&mut self, key: &str) {
		self.pairs.retain(|(k, _)| k != key);
	}

	pub fn classname(&self) -> &str {
		self.string_for_key("classname")
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
		self.pairs.iter_mut().map(|(_, v)| v)
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}
}

/// Quake-style tokenizer: whitespace separated, `"..."` strings without escapes,
/// `{` and `}` as single-character tokens, `//` comments skipped.
struct Tokenizer<'a> {
	rest: &'a [u8],
}

impl<'a> Tokenizer<'a> {
	fn new(data: &'a str) -> Self {
		Self { rest: data.as_bytes() }
	}

	fn next_token(&mut self) -> Option<String> {
		loop {
			while let [c, rest @ ..] = self.rest {
				if c.is_ascii_whitespace() {
					self.rest = rest;
				} else {
					break;
				}
			}
			if let [b'/', b'/', ..] = self.rest {
				let end = self.rest.iter().position(|&c| c == b'\n').unwrap_or(self.rest.len());
				self.rest = &self.rest[end..];
				continue;
			}
			break;
		}

		match self.rest {
			[] => None,
			[b'"', rest @ ..] => {
				let end = rest.iter().position(|&c| c == b'"').unwrap_or(rest.len());
				let token = String::from_utf8_lossy(&rest[..end]).into_owned();
				self.rest = &rest[(end + 1).min(rest.len())..];
				Some(token)
			}
			[c @ (b'{' | b'}'), rest @ ..] => {
				self.rest = rest;
				Some((*c as char).to_string())
			}
			_ => {
				let end = self
					.rest
					.iter()
					.position(|&c| c.is_ascii_whitespace() || matches!(c, b'{' | b'}' | b'"'))
					.unwrap_or(self.rest.len());
				let token = String::from_utf8_lossy(&self.rest[..end]).into_owned();
				self.rest = &self.rest[end..];
				Some(token)
			}
		}
	}
}

/// Parse an entity lump into its dicts. Structural problems are corrupt input and
/// abort the parse.
pub fn parse(entdata: &str) -> LightResult<Vec<EntDict>> {
	let mut tokenizer = Tokenizer::new(entdata);
	let mut result = Vec::new();

	while let Some(token) = tokenizer.next_token() {
		if token != "{" {
			return Err(LightError::ExpectedOpenBrace(token));
		}

		let mut entity = EntDict::default();

		loop {
			let Some(key) = tokenizer.next_token() else {
				return Err(LightError::UnexpectedEof);
			};
			if key == "}" {
				break;
			}
			if key.len() > MAX_ENT_KEY - 1 {
				return Err(LightError::EntTokenTooLong {
					kind: "key",
					len: key.len(),
					max: MAX_ENT_KEY - 1,
				});
			}

			let Some(value) = tokenizer.next_token() else {
				return Err(LightError::UnexpectedEof);
			};
			if value.starts_with('}') {
				return Err(LightError::BraceWithoutData);
			}
			if value.len() > MAX_ENT_VALUE - 1 {
				return Err(LightError::EntTokenTooLong {
					kind: "value",
					len: value.len(),
					max: MAX_ENT_VALUE - 1,
				});
			}

			entity.set(&key, &value);
		}

		result.push(entity);
	}

	log::info!("{} entities read", result.len());
	Ok(result)
}

/// Serialize dicts back into entity lump text.
pub fn write(dicts: &[EntDict]) -> String {
	let mut out = String::new();
	for ent in dicts {
		out.push_str("{\n");
		for (key, value) in ent.iter() {
			out.push_str(&format!("\"{key}\" \"{value}\"\n"));
		}
		out.push_str("}\n");
	}
	out
}

/// Decode `\b` escape toggles: between toggles, every byte gets the high bit set,
/// which selects the gold/bold glyph set of the Quake charset. Everything else
/// passes through.
pub fn parse_escape_sequences(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut bold = false;

	let bytes = input.as_bytes();
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'b') {
			bold = !bold;
			i += 2;
		} else {
			let mut c = bytes[i];
			if bold {
				c |= 128;
			}
			out.push(char::from(c));
			i += 1;
		}
	}
	out
}
