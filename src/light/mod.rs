//! The light model: typed light/sun records and the [`LightingContext`] holding
//! every table the pipeline builds.

pub mod bounce;
pub mod entities;

use glam::{Mat4, Vec3};
use rand::{rngs::SmallRng, SeedableRng};
use std::collections::HashMap;

use crate::{
	data::{BoundingBox, BspData},
	entity::EntDict,
	settings::{set_color, set_float, set_int, set_vec3, GlobalSettings, Setting},
	LightError, LightResult,
};

pub use bounce::{BounceLight, StyleMap};

/// Intensity given to lights that specify none (or an explicit 0).
pub const DEFAULT_LIGHT_LEVEL: f32 = 300.0;

/// Switchable lights get one style each from the 32..63 range.
pub const MAX_LIGHT_TARGETS: usize = 32;

/// Distance attenuation formula, selected by the `delay` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Formula {
	#[default]
	Linear,
	Inverse,
	Inverse2,
	Infinite,
	LocalMin,
	Inverse2a,
}

impl Formula {
	/// Decode a `delay` value. Unknown numbers read as `None` and fall back to
	/// [`Formula::Linear`] during validation.
	pub fn from_delay(delay: i32) -> Option<Self> {
		Some(match delay {
			0 => Self::Linear,
			1 => Self::Inverse,
			2 => Self::Inverse2,
			3 => Self::Infinite,
			4 => Self::LocalMin,
			5 => Self::Inverse2a,
			_ => return None,
		})
	}
}

/// A light emitter under construction. Bindable fields are [`Setting`] cells; the
/// rest is derived state filled in by the pipeline.
#[derive(Debug, Clone)]
pub struct Light {
	pub origin: Setting<Vec3>,
	/// Intensity. Divided by the sample count for inverse-family formulas so
	/// jittering keeps the apparent brightness.
	pub light: Setting<f32>,
	/// 0-255 per component after normalization.
	pub color: Setting<Vec3>,
	pub style: Setting<i32>,
	/// Raw `delay` value, decoded through [`Formula::from_delay`].
	pub delay: Setting<i32>,
	pub atten: Setting<f32>,
	pub anglescale: Setting<f32>,
	/// Jitter radius in units.
	pub deviance: Setting<f32>,
	/// Jitter sample count, including the original light.
	pub samples: Setting<i32>,
	/// Spot cone full angle in degrees; 0 selects the 40 degree default.
	pub spotangle: Setting<f32>,
	/// Inner cone angle; clamped to the primary during setup.
	pub spotangle2: Setting<f32>,
	pub mangle: Setting<Vec3>,
	pub projfov: Setting<f32>,
	pub projangle: Setting<Vec3>,
	pub project_texture: Setting<String>,

	pub spotlight: bool,
	pub spotvec: Vec3,
	/// `-cos(spotangle / 2)`.
	pub spotfalloff: f32,
	pub spotfalloff2: f32,

	/// Index of the matched target dict in the context's entdicts. Stable because
	/// entdicts never grow after load.
	pub targetent: Option<usize>,
	/// Index of the projected texture in the miptex table.
	pub projected_mip: Option<usize>,
	pub projection_matrix: Mat4,

	/// Index of the source dict in the context's entdicts. Absent only for lights
	/// that never had one.
	pub epairs: Option<usize>,
	/// Cached containing leaf in the world model.
	pub leaf: Option<usize>,
	/// Synthesized lights (jitter copies, surface lights) are never written back to
	/// the entity lump.
	pub generated: bool,
}

impl Default for Light {
	fn default() -> Self {
		Self {
			origin: Setting::new(Vec3::ZERO),
			light: Setting::new(DEFAULT_LIGHT_LEVEL),
			color: Setting::new(Vec3::splat(255.0)),
			style: Setting::new(0),
			delay: Setting::new(0),
			atten: Setting::new(1.0),
			// out-of-range marker, replaced by the global default during validation
			anglescale: Setting::new(-1.0),
			deviance: Setting::new(0.0),
			samples: Setting::new(0),
			spotangle: Setting::new(0.0),
			spotangle2: Setting::new(0.0),
			mangle: Setting::new(Vec3::ZERO),
			projfov: Setting::new(90.0),
			projangle: Setting::new(Vec3::ZERO),
			project_texture: Setting::new(String::new()),
			spotlight: false,
			spotvec: Vec3::ZERO,
			spotfalloff: 0.0,
			spotfalloff2: 0.0,
			targetent: None,
			projected_mip: None,
			projection_matrix: Mat4::IDENTITY,
			epairs: None,
			leaf: None,
			generated: false,
		}
	}
}

impl Light {
	/// Bind every recognized key of `dict` onto this light's setting cells. Unknown
	/// keys are ignored; non-numeric keys like `target` are read from the dict on
	/// demand instead.
	pub fn bind_settings(&mut self, dict: &EntDict) {
		for (key, value) in dict.iter() {
			match key {
				"origin" => set_vec3(&mut self.origin, value),
				"light" | "_light" => set_float(&mut self.light, value),
				"_color" | "color" => set_color(&mut self.color, value),
				"style" => set_int(&mut self.style, value),
				"delay" => set_int(&mut self.delay, value),
				"wait" | "_wait" => set_float(&mut self.atten, value),
				"_anglescale" | "_anglesense" => set_float(&mut self.anglescale, value),
				"_deviance" => set_float(&mut self.deviance, value),
				"_samples" => set_int(&mut self.samples, value),
				"angle" => set_float(&mut self.spotangle, value),
				"_softangle" => set_float(&mut self.spotangle2, value),
				"mangle" => set_vec3(&mut self.mangle, value),
				"_project_fov" => set_float(&mut self.projfov, value),
				"_project_mangle" => set_vec3(&mut self.projangle, value),
				"_project_texture" => self.project_texture.set(value.to_string()),
				_ => {}
			}
		}
	}

	/// The validated attenuation formula.
	pub fn formula(&self) -> Formula {
		Formula::from_delay(self.delay.value()).unwrap_or_default()
	}
}

/// A directional light modeled as a point far away: `vec` is the origin-relative
/// far point (-16384 units along the travel direction).
#[derive(Debug, Clone, Copy)]
pub struct Sun {
	pub sunvec: Vec3,
	pub sunlight: f32,
	pub sunlight_color: Vec3,
	pub anglescale: f32,
	pub dirt: bool,
}

/// Per-face model policy resolved by the caller: which bmodel owns the face, its
/// world offset, and whether it casts shadows.
#[derive(Debug, Clone, Copy)]
pub struct ModelInfo {
	pub offset: Vec3,
	pub shadow: bool,
}

/// External policy collaborator. The light core does not decide face-to-model
/// ownership or visibility; the embedding tool does.
pub trait ModelInfoSource {
	/// Model info for a face, or `None` when the face belongs to no lightable model.
	fn model_info_for_face(&self, bsp: &BspData, facenum: usize) -> Option<ModelInfo>;

	/// Coarse bounds of the region visible from `point`, used to cull bounce
	/// contributions. The default declines to estimate.
	fn estimate_visible_bounds(&self, point: Vec3) -> Option<BoundingBox> {
		let _ = point;
		None
	}
}

/// Everything the lighting pipeline reads and builds, packaged so the whole run is
/// a value instead of process globals.
pub struct LightingContext<'a> {
	pub bsp: &'a BspData,
	pub cfg: GlobalSettings,

	/// Parsed entity dicts. Frozen (never reallocated) once `load_entities` returns;
	/// lights reference them by index.
	pub entdicts: Vec<EntDict>,
	pub lights: Vec<Light>,
	pub suns: Vec<Sun>,

	/// Registry backing switchable-light style assignment.
	light_target_names: Vec<String>,
	/// Prototypes for surface-light emission, copied out of `lights`.
	pub templates: Vec<Light>,

	/// Average texture color by texture name.
	pub texture_colors: HashMap<String, Vec3>,
	radlights: Vec<BounceLight>,
	radlights_by_facenum: HashMap<usize, Vec<usize>>,

	pub(crate) rng: SmallRng,
	pub(crate) warned_unknown_formula: bool,
}

impl<'a> LightingContext<'a> {
	pub fn new(bsp: &'a BspData, cfg: GlobalSettings) -> Self {
		let rng = SmallRng::seed_from_u64(cfg.seed);

		Self {
			bsp,
			cfg,
			entdicts: Vec::new(),
			lights: Vec::new(),
			suns: Vec::new(),
			light_target_names: Vec::new(),
			templates: Vec::new(),
			texture_colors: HashMap::new(),
			radlights: Vec::new(),
			radlights_by_facenum: HashMap::new(),
			rng,
			warned_unknown_formula: false,
		}
	}

	/// The worldspawn dict. It must exist, be unique and come first.
	pub fn world_ent(&self) -> LightResult<&EntDict> {
		match self.entdicts.first() {
			Some(dict) if dict.classname() == "worldspawn" => Ok(dict),
			_ => Err(LightError::NoWorldspawn),
		}
	}

	pub fn set_world_key_value(&mut self, key: &str, value: &str) -> LightResult<()> {
		self.world_ent()?;
		self.entdicts[0].set(key, value);
		Ok(())
	}

	pub fn world_value_for_key(&self, key: &str) -> LightResult<&str> {
		Ok(self.world_ent()?.string_for_key(key))
	}

	/// Linear search for the first dict carrying `key` = `value`.
	pub fn find_entdict_with_key_pair(&self, key: &str, value: &str) -> Option<usize> {
		self.entdicts.iter().position(|dict| dict.string_for_key(key) == value)
	}

	/// Read a key from the light's source dict. Lights without a dict read every key
	/// as empty.
	pub fn light_value<'s>(&'s self, light: &Light, key: &str) -> &'s str {
		light
			.epairs
			.map(|i| self.entdicts[i].string_for_key(key))
			.unwrap_or("")
	}

	pub fn light_classname<'s>(&'s self, light: &Light) -> &'s str {
		self.light_value(light, "classname")
	}

	pub fn bounce_lights(&self) -> &[BounceLight] {
		&self.radlights
	}

	/// Indices into [`Self::bounce_lights`] for one face. Deterministic across runs
	/// for fixed inputs.
	pub fn bounce_lights_for_facenum(&self, facenum: usize) -> &[usize] {
		self.radlights_by_facenum.get(&facenum).map(Vec::as_slice).unwrap_or(&[])
	}

	pub(crate) fn push_bounce_light(&mut self, facenum: usize, light: BounceLight) {
		let index = self.radlights.len();
		self.radlights.push(light);
		self.radlights_by_facenum.entry(facenum).or_default().push(index);
	}

	/// Look up or allocate the switchable style for `targetname`. Styles are handed
	/// out as `32 + index`; the registry holds at most [`MAX_LIGHT_TARGETS`] names.
	pub(crate) fn light_style_for_targetname(names: &mut Vec<String>, targetname: &str) -> LightResult<i32> {
		if let Some(i) = names.iter().position(|name| name == targetname) {
			return Ok(32 + i as i32);
		}
		if names.len() == MAX_LIGHT_TARGETS {
			return Err(LightError::TooManyLightTargets);
		}

		names.push(targetname.to_string());
		Ok(32 + names.len() as i32 - 1)
	}

	pub(crate) fn target_names_mut(&mut self) -> &mut Vec<String> {
		&mut self.light_target_names
	}

	pub fn switchable_style_count(&self) -> usize {
		self.light_target_names.len()
	}
}
