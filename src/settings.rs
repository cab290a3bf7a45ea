//! Typed entity settings.
//!
//! Every bindable field is a [`Setting`] cell that remembers whether it was ever
//! explicitly assigned; validation uses that to tell "left at default" apart from
//! "set to the default value". Worldspawn keys bind to [`GlobalSettings`] before any
//! light is constructed.

use glam::{vec3, Vec3};

use crate::util::{normalize_color_format, parse_float, parse_vec3, vec_from_mangle};

/// A setting value plus a `changed` flag, set on the first explicit assignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Setting<T> {
	value: T,
	changed: bool,
}

impl<T> Setting<T> {
	pub fn new(default: T) -> Self {
		Self {
			value: default,
			changed: false,
		}
	}

	pub fn get(&self) -> &T {
		&self.value
	}

	pub fn set(&mut self, value: T) {
		self.value = value;
		self.changed = true;
	}

	pub fn is_changed(&self) -> bool {
		self.changed
	}
}

impl<T: Copy> Setting<T> {
	pub fn value(&self) -> T {
		self.value
	}
}

/// Global lighting configuration: worldspawn-bindable settings plus the tool knobs
/// that have no entity key.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
	/// Default light anglescale, also applied to suns.
	pub anglescale: Setting<f32>,
	/// Global dirt flag, inherited by dirt tri-states left at 0.
	pub dirt: Setting<f32>,

	pub sunlight: Setting<f32>,
	pub sunlight_color: Setting<Vec3>,
	/// Direction the primary sun light travels, derived from `_sunlight_mangle`.
	pub sunvec: Setting<Vec3>,
	/// Sun penumbra in degrees (`_sunlight_penumbra`).
	pub sun_deviance: Setting<f32>,
	pub sunlight_dirt: Setting<f32>,

	pub sun2: Setting<f32>,
	pub sun2_color: Setting<Vec3>,
	pub sun2vec: Setting<Vec3>,

	pub sunlight2: Setting<f32>,
	pub sunlight2_color: Setting<Vec3>,
	pub sunlight3: Setting<f32>,
	pub sunlight3_color: Setting<Vec3>,
	pub sunlight2_dirt: Setting<f32>,

	pub surflight_subdivide: Setting<f32>,
	pub bouncecolorscale: Setting<f32>,

	/// Penumbra/dome sample budget.
	pub sunsamples: i32,
	/// Count LOCALMIN lights into the jitter brightness normalization.
	pub addminlight: bool,
	/// Parse entities but build no lights.
	pub nolights: bool,
	/// Skip the visible-bounds estimate on bounce lights.
	pub novisapprox: bool,
	/// Seed for jitter and penumbra sampling; fixed seed means reproducible output.
	pub seed: u64,
}

impl Default for GlobalSettings {
	fn default() -> Self {
		Self {
			anglescale: Setting::new(0.5),
			dirt: Setting::new(0.0),
			sunlight: Setting::new(0.0),
			sunlight_color: Setting::new(vec3(255.0, 255.0, 255.0)),
			sunvec: Setting::new(vec3(0.0, 0.0, -1.0)),
			sun_deviance: Setting::new(0.0),
			sunlight_dirt: Setting::new(0.0),
			sun2: Setting::new(0.0),
			sun2_color: Setting::new(vec3(255.0, 255.0, 255.0)),
			sun2vec: Setting::new(vec3(0.0, 0.0, -1.0)),
			sunlight2: Setting::new(0.0),
			sunlight2_color: Setting::new(vec3(255.0, 255.0, 255.0)),
			sunlight3: Setting::new(0.0),
			sunlight3_color: Setting::new(vec3(255.0, 255.0, 255.0)),
			sunlight2_dirt: Setting::new(0.0),
			surflight_subdivide: Setting::new(128.0),
			bouncecolorscale: Setting::new(0.0),
			sunsamples: 64,
			addminlight: false,
			nolights: false,
			novisapprox: false,
			seed: 0,
		}
	}
}

impl GlobalSettings {
	/// Bind a single worldspawn key. Unknown keys are ignored.
	pub fn set_global(&mut self, key: &str, value: &str) {
		match key {
			"_anglescale" | "_anglesense" => set_float(&mut self.anglescale, value),
			"_dirt" => set_float(&mut self.dirt, value),
			"_sunlight" => set_float(&mut self.sunlight, value),
			"_sunlight_color" => set_color(&mut self.sunlight_color, value),
			"_sunlight_mangle" | "_sun_mangle" => set_mangle(&mut self.sunvec, value),
			"_sunlight_penumbra" => set_float(&mut self.sun_deviance, value),
			"_sunlight_dirt" => set_float(&mut self.sunlight_dirt, value),
			"_sun2" => set_float(&mut self.sun2, value),
			"_sun2_color" => set_color(&mut self.sun2_color, value),
			"_sun2_mangle" => set_mangle(&mut self.sun2vec, value),
			"_sunlight2" => set_float(&mut self.sunlight2, value),
			"_sunlight2_color" => set_color(&mut self.sunlight2_color, value),
			"_sunlight3" => set_float(&mut self.sunlight3, value),
			"_sunlight3_color" => set_color(&mut self.sunlight3_color, value),
			"_sunlight2_dirt" => set_float(&mut self.sunlight2_dirt, value),
			"_surflight_subdivide" => set_float(&mut self.surflight_subdivide, value),
			"_bouncecolorscale" => set_float(&mut self.bouncecolorscale, value),
			_ => {}
		}
	}

	/// Whether dirt mapping is globally enabled.
	pub fn global_dirt(&self) -> bool {
		self.dirt.value() != 0.0
	}
}

pub(crate) fn set_float(setting: &mut Setting<f32>, value: &str) {
	if let Some(f) = parse_float(value) {
		setting.set(f);
	}
}

pub(crate) fn set_int(setting: &mut Setting<i32>, value: &str) {
	if let Some(f) = parse_float(value) {
		setting.set(f as i32);
	}
}

pub(crate) fn set_vec3(setting: &mut Setting<Vec3>, value: &str) {
	if let Some(v) = parse_vec3(value) {
		setting.set(v);
	}
}

pub(crate) fn set_color(setting: &mut Setting<Vec3>, value: &str) {
	if let Some(v) = parse_vec3(value) {
		setting.set(normalize_color_format(v));
	}
}

fn set_mangle(setting: &mut Setting<Vec3>, value: &str) {
	if let Some(m) = parse_vec3(value) {
		setting.set(vec_from_mangle(m));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn changed_flag_tracks_first_assignment() {
		let mut setting = Setting::new(1.0f32);
		assert!(!setting.is_changed());
		assert_eq!(setting.value(), 1.0);

		setting.set(1.0);
		assert!(setting.is_changed());
	}

	#[test]
	fn worldspawn_binding() {
		let mut cfg = GlobalSettings::default();
		cfg.set_global("_sunlight", "250");
		cfg.set_global("_sunlight_color", "1 0.5 0");
		cfg.set_global("_sunlight_mangle", "0 -90 0");
		cfg.set_global("some_unknown_key", "whatever");

		assert_eq!(cfg.sunlight.value(), 250.0);
		assert_eq!(cfg.sunlight_color.value(), vec3(255.0, 127.5, 0.0));
		assert!(cfg.sunvec.value().abs_diff_eq(vec3(0.0, 0.0, -1.0), 1e-6));
		assert!(!cfg.sunlight2.is_changed());
	}

	#[test]
	fn scalar_splats_across_vector_components() {
		let mut setting = Setting::new(Vec3::ZERO);
		set_vec3(&mut setting, "7");
		assert_eq!(setting.value(), Vec3::splat(7.0));
	}
}
