//! Entity and light model assembly.
//!
//! The pipeline runs in a fixed order; every step sees the lights added by the
//! steps before it, and nothing after jittering may change the light count:
//!
//! 1. [`load_entities`](LightingContext::load_entities)
//! 2. [`make_surface_lights`](LightingContext::make_surface_lights)
//! 3. [`jitter_entities`](LightingContext::jitter_entities)
//! 4. `match_targets`
//! 5. `setup_spotlights`
//! 6. `setup_suns`
//! 7. `setup_sky_dome`
//! 8. `fix_lights_on_faces`
//! 9. `setup_light_leafnums`
//!
//! [`setup_lights`](LightingContext::setup_lights) drives the whole sequence.

use std::f32::consts::PI;

use glam::{vec3, Mat4, Vec3};
use rand::Rng;

use crate::{
	data::{BspData, ContentFlags, GameDialect, CONTENTS_EMPTY},
	entity,
	light::{Formula, Light, LightingContext, ModelInfo, ModelInfoSource, Sun, DEFAULT_LIGHT_LEVEL},
	util::{parse_float, vec_from_mangle},
	winding::Winding,
	LightError, LightResult,
};

/// Suns sit this far from every sample point, effectively at infinity.
const SUN_DISTANCE: f32 = 16384.0;

impl<'a> LightingContext<'a> {
	/// Parse the entity lump and build the initial light list.
	///
	/// The first pass makes the permanent dict edits that get written back to the
	/// BSP at the end of the run: the `lightmap_scale` rename, style assignment for
	/// switchable lights, and escape decoding. Worldspawn keys then bind to the
	/// global settings before any light is constructed.
	pub fn load_entities(&mut self) -> LightResult<()> {
		self.entdicts = entity::parse(&self.bsp.entities)?;

		for i in 0..self.entdicts.len() {
			// fix "lightmap_scale"
			let lmscale = self.entdicts[i].string_for_key("lightmap_scale").to_string();
			if !lmscale.is_empty() {
				log::warn!("lightmap_scale should be _lightmap_scale");
				self.entdicts[i].remove("lightmap_scale");
				self.entdicts[i].set("_lightmap_scale", &lmscale);
			}

			// switchable lights with no explicit style get one from the registry
			if self.entdicts[i].classname().starts_with("light") {
				let targetname = self.entdicts[i].string_for_key("targetname").to_string();
				let style = self.entdicts[i].float_for_key("style") as i32;
				if !targetname.is_empty() && style == 0 {
					let style = Self::light_style_for_targetname(self.target_names_mut(), &targetname)?;
					self.entdicts[i].set("style", &style.to_string());
				}
			}

			for value in self.entdicts[i].values_mut() {
				*value = entity::parse_escape_sequences(value);
			}
		}

		let world_pairs: Vec<(String, String)> = self
			.world_ent()?
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		for (key, value) in &world_pairs {
			self.cfg.set_global(key, value);
		}

		debug_assert!(self.lights.is_empty());
		if self.cfg.nolights {
			return Ok(());
		}

		for i in 0..self.entdicts.len() {
			if !self.entdicts[i].classname().starts_with("light") {
				continue;
			}
			let light = self.build_light(i)?;
			self.lights.push(light);
		}

		log::info!("{} entities read, {} are lights", self.entdicts.len(), self.lights.len());
		Ok(())
	}

	fn build_light(&mut self, dict_index: usize) -> LightResult<Light> {
		let mut entity = Light {
			epairs: Some(dict_index),
			..Default::default()
		};
		entity.bind_settings(&self.entdicts[dict_index]);

		if entity.mangle.is_changed() {
			entity.spotvec = vec_from_mangle(entity.mangle.value());
			entity.spotlight = true;

			// the projection points the same way unless overridden
			if !entity.projangle.is_changed() {
				entity.projangle.set(entity.mangle.value());
			}
		}

		if !entity.project_texture.get().is_empty() {
			let texname = entity.project_texture.get().clone();
			entity.projected_mip = find_projection_texture(self.bsp, &texname);
			if entity.projected_mip.is_none() {
				log::warn!("light has \"_project_texture\" \"{texname}\", but this texture is not present in the bsp");
			}
		}

		if let Some(mip_index) = entity.projected_mip {
			let miptex = &self.bsp.miptexes[mip_index];
			let (width, height) = (miptex.width as f32, miptex.height as f32);
			let fov = entity.projfov.value();

			// the configured fov covers the texture's long axis
			let (fovx, fovy) = if width > height {
				(fov, calc_fov(fov, width, height)?)
			} else {
				(calc_fov(fov, height, width)?, fov)
			};
			entity.projection_matrix = make_model_view_proj(entity.projangle.value(), entity.origin.value(), fovx, fovy);
		}

		self.check_entity_fields(&mut entity)?;
		Ok(entity)
	}

	/// Validate and default a freshly bound light.
	fn check_entity_fields(&mut self, entity: &mut Light) -> LightResult<()> {
		if entity.light.value() == 0.0 {
			entity.light.set(DEFAULT_LIGHT_LEVEL);
		}
		if entity.atten.value() <= 0.0 {
			entity.atten.set(1.0);
		}
		if entity.anglescale.value() < 0.0 || entity.anglescale.value() > 1.0 {
			entity.anglescale.set(self.cfg.anglescale.value());
		}

		if Formula::from_delay(entity.delay.value()).is_none() {
			if !self.warned_unknown_formula {
				self.warned_unknown_formula = true;
				let classname = entity
					.epairs
					.map(|i| self.entdicts[i].classname().to_string())
					.unwrap_or_default();
				log::warn!(
					"unknown formula number ({}) in delay field, {} at ({}), further formula warnings will be suppressed",
					entity.delay.value(),
					classname,
					entity.origin.value()
				);
			}
			entity.delay.set(0);
		}

		// deviance and samples defaults
		if entity.deviance.value() > 0.0 && entity.samples.value() == 0 {
			entity.samples.set(16);
		}
		if entity.deviance.value() <= 0.0 || entity.samples.value() <= 1 {
			entity.deviance.set(0.0);
			entity.samples.set(1);
		}

		// For most formulas the light value is divided across the jitter samples to
		// keep the apparent brightness.
		let divide = match entity.formula() {
			Formula::Inverse | Formula::Inverse2 | Formula::Infinite | Formula::Inverse2a => true,
			Formula::LocalMin => self.cfg.addminlight,
			Formula::Linear => false,
		};
		if divide {
			entity.light.set(entity.light.value() / entity.samples.value() as f32);
		}

		let style = entity.style.value();
		if !(0..=254).contains(&style) {
			return Err(LightError::BadLightStyle(style));
		}
		Ok(())
	}

	/// Move `_surface` templates aside and emit point lights across every matching
	/// face, one per subdivision cell.
	pub fn make_surface_lights<M: ModelInfoSource>(&mut self, models: &M) -> LightResult<()> {
		for i in 0..self.lights.len() {
			let tex = self.light_value(&self.lights[i], "_surface").to_string();
			if tex.is_empty() {
				continue;
			}
			let origin = self.light_value(&self.lights[i], "origin").to_string();

			self.templates.push(self.lights[i].clone());
			// the template itself must not cast light
			self.lights[i].light.set(0.0);

			log::info!("creating surface lights for texture \"{tex}\" from template at ({origin})");
		}

		if self.templates.is_empty() {
			return Ok(());
		}

		// each face is processed once, no matter how many leaves reference it
		let mut face_visited = vec![false; self.bsp.faces.len()];

		for leafnum in 0..self.bsp.leaves.len() {
			let leaf = self.bsp.leaves[leafnum];
			let underwater = match self.bsp.dialect {
				GameDialect::Quake1 => leaf.contents != CONTENTS_EMPTY,
				GameDialect::Quake2 => ContentFlags::from_bits_truncate(leaf.contents as u32)
					.intersects(ContentFlags::LAVA | ContentFlags::SLIME | ContentFlags::WATER),
			};

			for k in 0..leaf.num_mark_surfaces as usize {
				let facenum = self.bsp.mark_surfaces[leaf.first_mark_surface as usize + k] as usize;

				let Some(info) = models.model_info_for_face(self.bsp, facenum) else {
					continue;
				};

				// ignore the underwater side of liquid surfaces
				let texname = self.bsp.face_texture_name(self.bsp.face(facenum));
				if texname.starts_with('*') && underwater {
					continue;
				}

				if face_visited[facenum] {
					continue;
				}
				face_visited[facenum] = true;

				self.subdivide_surface(facenum, &info)?;
			}
		}

		Ok(())
	}

	fn subdivide_surface(&mut self, facenum: usize, info: &ModelInfo) -> LightResult<()> {
		let face = self.bsp.face(facenum);
		let winding = Winding::from_face(self.bsp, face);

		let mut cells = Vec::new();
		winding.subdivide(self.cfg.surflight_subdivide.value(), &mut |cell| cells.push(cell.clone()))?;

		let texname = self.bsp.face_texture_name(face);
		for cell in &cells {
			for template_index in 0..self.templates.len() {
				let surface = self.light_value(&self.templates[template_index], "_surface");
				if texname.eq_ignore_ascii_case(surface) {
					self.create_surface_light_on_subdivision(facenum, template_index, info, cell);
				}
			}
		}
		Ok(())
	}

	fn create_surface_light_on_subdivision(&mut self, facenum: usize, template_index: usize, info: &ModelInfo, cell: &Winding) {
		let face = self.bsp.face(facenum);

		let mut normal = self.bsp.planes[face.plane_idx as usize].normal;
		if face.side {
			normal = -normal;
		}

		let mut offset = parse_float(self.light_value(&self.templates[template_index], "_surface_offset")).unwrap_or(0.0);
		if offset == 0.0 {
			offset = 2.0;
		}

		// nudge off the face, then apply the owning model's offset
		let origin = cell.center() + normal * offset + info.offset;

		let spotlight =
			parse_float(self.light_value(&self.templates[template_index], "_surface_spotlight")).unwrap_or(0.0) != 0.0;

		let mut entity = self.templates[template_index].clone();
		entity.origin.set(origin);
		// don't write generated lights back to the bsp
		entity.generated = true;
		if spotlight {
			entity.spotlight = true;
			entity.spotvec = normal;
		}

		self.lights.push(entity);
	}

	/// Append jittered duplicates for lights with more than one sample. Only the
	/// pre-jitter slice is walked; duplicates are not themselves jittered.
	pub fn jitter_entities(&mut self) {
		let starting_size = self.lights.len();

		for i in 0..starting_size {
			let samples = self.lights[i].samples.value();
			let deviance = self.lights[i].deviance.value();
			let origin = self.lights[i].origin.value();

			for _ in 1..samples {
				let mut light = self.lights[i].clone();
				light.generated = true;

				let jitter = vec3(
					(self.rng.gen::<f32>() * 2.0 - 1.0) * deviance,
					(self.rng.gen::<f32>() * 2.0 - 1.0) * deviance,
					(self.rng.gen::<f32>() * 2.0 - 1.0) * deviance,
				);
				light.origin.set(origin + jitter);

				self.lights.push(light);
			}
		}
	}

	/// Resolve `target` keys to entdict indices. Entdicts must not be modified after
	/// this point.
	fn match_targets(&mut self) {
		for i in 0..self.lights.len() {
			let target = self.light_value(&self.lights[i], "target").to_string();
			if target.is_empty() {
				continue;
			}

			match self.find_entdict_with_key_pair("targetname", &target) {
				Some(index) => self.lights[i].targetent = Some(index),
				None => log::warn!(
					"entity at ({}) ({}) has unmatched target ({})",
					self.lights[i].origin.value(),
					self.light_classname(&self.lights[i]),
					target
				),
			}
		}
	}

	fn setup_spotlights(&mut self) {
		for i in 0..self.lights.len() {
			if let Some(target_index) = self.lights[i].targetent {
				let target_origin = self.entdicts[target_index].vec3_for_key("origin");
				self.lights[i].spotvec = (target_origin - self.lights[i].origin.value()).normalize_or_zero();
				self.lights[i].spotlight = true;
			}

			let entity = &mut self.lights[i];
			if entity.spotlight {
				let angle = if entity.spotangle.value() > 0.0 {
					entity.spotangle.value()
				} else {
					40.0
				};
				entity.spotfalloff = -(angle / 2.0).to_radians().cos();

				let mut angle2 = entity.spotangle2.value();
				if angle2 <= 0.0 || angle2 > angle {
					angle2 = angle;
				}
				entity.spotfalloff2 = -(angle2 / 2.0).to_radians().cos();
			}
		}
	}

	/// Resolve a dirt tri-state (1 = on, -1 = off, anything else inherits the
	/// global flag).
	fn resolve_dirt_flag(&self, dirt: i32) -> bool {
		match dirt {
			1 => true,
			-1 => false,
			_ => self.cfg.global_dirt(),
		}
	}

	fn add_sun(&mut self, sunvec: Vec3, light: f32, color: Vec3, dirt: i32) {
		self.suns.push(Sun {
			sunvec: sunvec.normalize_or_zero() * -SUN_DISTANCE,
			sunlight: light,
			sunlight_color: color,
			anglescale: self.cfg.anglescale.value(),
			dirt: self.resolve_dirt_flag(dirt),
		});
	}

	/// One sun, or a penumbra's worth of jittered suns sharing the total intensity.
	fn setup_sun(&mut self, mut light: f32, color: Vec3, sunvec_in: Vec3) {
		let deviance = self.cfg.sun_deviance.value();

		let sun_num_samples = if deviance == 0.0 {
			1
		} else {
			log::info!("using _sunlight_penumbra of {deviance} degrees from worldspawn");
			self.cfg.sunsamples
		};

		let sunvec = sunvec_in.normalize_or_zero();
		light /= sun_num_samples as f32;

		let dirt = self.cfg.sunlight_dirt.value() as i32;

		for i in 0..sun_num_samples {
			let direction = if i == 0 {
				sunvec
			} else {
				let d = (sunvec.x * sunvec.x + sunvec.y * sunvec.y).sqrt();
				let mut angle = sunvec.y.atan2(sunvec.x);
				let mut elevation = sunvec.z.atan2(d);

				// jitter the angles, keeping the sample inside the deviance disk
				let (mut da, mut de);
				loop {
					da = (self.rng.gen::<f32>() * 2.0 - 1.0) * deviance.to_radians();
					de = (self.rng.gen::<f32>() * 2.0 - 1.0) * deviance.to_radians();
					if da * da + de * de <= deviance * deviance {
						break;
					}
				}
				angle += da;
				elevation += de;

				vec3(angle.cos() * elevation.cos(), angle.sin() * elevation.cos(), elevation.sin())
			};

			self.add_sun(direction, light, color, dirt);
		}
	}

	fn setup_suns(&mut self) {
		if self.cfg.sunlight.value() != 0.0 {
			self.setup_sun(self.cfg.sunlight.value(), self.cfg.sunlight_color.value(), self.cfg.sunvec.value());
		}

		if self.cfg.sun2.value() != 0.0 {
			log::info!("creating sun2");
			self.setup_sun(self.cfg.sun2.value(), self.cfg.sun2_color.value(), self.cfg.sun2vec.value());
		}
	}

	/// A dome of suns approximating sky illumination: `_sunlight2` fills the upper
	/// hemisphere, `_sunlight3` the mirrored lower one.
	fn setup_sky_dome(&mut self) {
		let sunlight2 = self.cfg.sunlight2.value();
		let sunlight3 = self.cfg.sunlight3.value();
		if sunlight2 <= 0.0 && sunlight3 <= 0.0 {
			return;
		}

		// pick 'iterations' so the sun count lands close to the sample budget
		let iterations = (((self.cfg.sunsamples - 1) as f32 / 4.0).sqrt().round() as i32 + 1).max(2);

		let elevation_steps = iterations - 1;
		let angle_steps = elevation_steps * 4;
		let elevation_step = (90.0 / (elevation_steps + 1) as f32).to_radians(); // skip elevation 0
		let angle_step = (360.0 / angle_steps as f32).to_radians();

		let num_suns = angle_steps * elevation_steps + 1;
		if sunlight2 > 0.0 {
			log::info!(
				"using {num_suns} suns for _sunlight2, total light {sunlight2}, color {}",
				self.cfg.sunlight2_color.value()
			);
		}
		if sunlight3 > 0.0 {
			log::info!(
				"using {num_suns} suns for _sunlight3, total light {sunlight3}, color {}",
				self.cfg.sunlight3_color.value()
			);
		}

		let sunlight2_value = sunlight2 / num_suns as f32;
		let sunlight3_value = sunlight3 / num_suns as f32;
		// both dome halves resolve dirt through the _sunlight2 flag
		let dirt = self.cfg.sunlight2_dirt.value() as i32;

		let sunlight2_color = self.cfg.sunlight2_color.value();
		let sunlight3_color = self.cfg.sunlight3_color.value();

		let mut angle = 0.0f32;
		let mut elevation = elevation_step * 0.5;

		for _ in 0..elevation_steps {
			for _ in 0..angle_steps {
				let mut direction = vec3(
					angle.cos() * elevation.cos(),
					angle.sin() * elevation.cos(),
					-elevation.sin(),
				);

				if sunlight2_value > 0.0 {
					self.add_sun(direction, sunlight2_value, sunlight2_color, dirt);
				}

				direction.z = -direction.z;

				if sunlight3_value > 0.0 {
					self.add_sun(direction, sunlight3_value, sunlight3_color, dirt);
				}

				angle += angle_step;
			}

			elevation += elevation_step;
			// phase shift between rows, breaks up banding along shared azimuths
			angle += angle_step / elevation_steps as f32;
		}

		// vertical suns
		if sunlight2_value > 0.0 {
			self.add_sun(vec3(0.0, 0.0, 1.0), sunlight2_value, sunlight2_color, dirt);
		}
		if sunlight3_value > 0.0 {
			self.add_sun(vec3(0.0, 0.0, -1.0), sunlight3_value, sunlight3_color, dirt);
		}
	}

	fn fix_light_on_face(&self, point: Vec3) -> LightResult<Vec3> {
		let world = self.bsp.world_model()?;

		if !self.bsp.point_in_solid(world, point)? {
			return Ok(point);
		}

		for i in 0..6 {
			let mut testpoint = point;
			let axis = i / 2;
			let add = i % 2 == 1;
			// sample points are 1 unit off faces, so nudge by 2 to clear them
			testpoint[axis] += if add { 2.0 } else { -2.0 };

			if !self.bsp.point_in_solid(world, testpoint)? {
				return Ok(testpoint);
			}
		}

		log::warn!("couldn't nudge light in solid at ({point})");
		Ok(point)
	}

	/// Push lights that ended up inside world solid out along the nearest free axis.
	fn fix_lights_on_faces(&mut self) -> LightResult<()> {
		for i in 0..self.lights.len() {
			if self.lights[i].light.value() == 0.0 {
				continue;
			}
			let fixed = self.fix_light_on_face(self.lights[i].origin.value())?;
			self.lights[i].origin.set(fixed);
		}
		Ok(())
	}

	/// Cache each light's containing world leaf.
	fn setup_light_leafnums(&mut self) -> LightResult<()> {
		let world = self.bsp.world_model()?;

		for i in 0..self.lights.len() {
			self.lights[i].leaf = Some(self.bsp.leaf_at_point(world, self.lights[i].origin.value()));
		}
		Ok(())
	}

	/// Run the whole assembly pipeline in its fixed order.
	pub fn setup_lights<M: ModelInfoSource>(&mut self, models: &M) -> LightResult<()> {
		self.load_entities()?;
		log::info!("setup_lights: {} initial lights", self.lights.len());

		// creates more light entities, must run before everything else
		self.make_surface_lights(models)?;
		log::info!("setup_lights: {} after surface lights", self.lights.len());

		self.jitter_entities();
		log::info!("setup_lights: {} after jittering", self.lights.len());

		let final_light_count = self.lights.len();

		self.match_targets();
		self.setup_spotlights();
		self.setup_suns();
		self.setup_sky_dome();
		self.fix_lights_on_faces()?;
		self.setup_light_leafnums()?;

		log::info!("final count: {} lights, {} suns in use", self.lights.len(), self.suns.len());

		// the steps after jittering mutate in place only
		debug_assert_eq!(final_light_count, self.lights.len());
		Ok(())
	}

	/// Serialize the (possibly edited) entity dicts back into lump bytes, NUL
	/// terminated. The caller overwrites the BSP's entity lump with this.
	pub fn entity_lump(&self) -> Vec<u8> {
		let entdata = entity::write(&self.entdicts);

		log::info!("{} switchable light styles", self.switchable_style_count());

		// the engine reads raw bytes; glyph characters above 127 truncate back to
		// single bytes
		let mut out: Vec<u8> = entdata.chars().map(|c| c as u32 as u8).collect();
		out.push(0);
		out
	}
}

/// Find the miptex a `_project_texture` key refers to.
fn find_projection_texture(bsp: &BspData, texname: &str) -> Option<usize> {
	bsp.miptexes
		.iter()
		.position(|miptex| !miptex.name.is_empty() && miptex.name.eq_ignore_ascii_case(texname))
}

/// Vertical fov matching `fov_x` over a `width` x `height` image.
fn calc_fov(fov_x: f32, width: f32, height: f32) -> LightResult<f32> {
	if !(1.0..=179.0).contains(&fov_x) {
		return Err(LightError::BadFov(fov_x));
	}

	let x = width / (fov_x / 360.0 * PI).tan();
	Ok((height / x).atan() * 360.0 / PI)
}

/// Infinite-far-plane projection matrix, column major, near plane at `neard`. The
/// z element carries the engine's fixed depth bias.
fn projection_inf(fovx: f32, fovy: f32, neard: f32) -> Mat4 {
	let ymax = neard * (fovy * PI / 360.0).tan();
	let ymin = -ymax;

	let (xmax, xmin) = if fovx == fovy {
		(ymax, ymin)
	} else {
		let xmax = neard * (fovx * PI / 360.0).tan();
		(xmax, -xmax)
	};

	Mat4::from_cols_array(&[
		(2.0 * neard) / (xmax - xmin), 0.0, 0.0, 0.0,
		0.0, (2.0 * neard) / (ymax - ymin), 0.0, 0.0,
		(xmax + xmin) / (xmax - xmin), (ymax + ymin) / (ymax - ymin), -0.5, -1.0,
		0.0, 0.0, -2.0 * neard, 0.0,
	])
}

/// Model-view matrix for a mangle-oriented viewer in the quake axis convention
/// (x forward, z up).
fn model_view(viewangles: Vec3, vieworg: Vec3) -> Mat4 {
	let base = Mat4::from_cols_array(&[
		0.0, 0.0, -1.0, 0.0,
		-1.0, 0.0, 0.0, 0.0,
		0.0, 1.0, 0.0, 0.0,
		0.0, 0.0, 0.0, 1.0,
	]);

	base * Mat4::from_axis_angle(Vec3::X, (-viewangles.z).to_radians())
		* Mat4::from_axis_angle(Vec3::Y, viewangles.y.to_radians())
		* Mat4::from_axis_angle(Vec3::Z, (-viewangles.x).to_radians())
		* Mat4::from_translation(-vieworg)
}

fn make_model_view_proj(viewangles: Vec3, vieworg: Vec3, fovx: f32, fovy: f32) -> Mat4 {
	projection_inf(fovx, fovy, 4.0) * model_view(viewangles, vieworg)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{entity::EntDict, settings::GlobalSettings};

	fn empty_ctx(bsp: &BspData) -> LightingContext {
		LightingContext::new(bsp, GlobalSettings::default())
	}

	#[test]
	fn check_fields_defaults() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		let mut light = Light::default();
		light.light.set(0.0);
		light.atten.set(-3.0);
		ctx.check_entity_fields(&mut light).unwrap();

		assert_eq!(light.light.value(), DEFAULT_LIGHT_LEVEL);
		assert_eq!(light.atten.value(), 1.0);
		assert_eq!(light.anglescale.value(), ctx.cfg.anglescale.value());
		assert_eq!(light.samples.value(), 1);
		assert_eq!(light.deviance.value(), 0.0);
	}

	#[test]
	fn check_fields_jitter_defaults() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		// deviance without samples implies 16 samples
		let mut light = Light::default();
		light.deviance.set(4.0);
		ctx.check_entity_fields(&mut light).unwrap();
		assert_eq!(light.samples.value(), 16);

		// a single sample disables deviance
		let mut light = Light::default();
		light.deviance.set(4.0);
		light.samples.set(1);
		ctx.check_entity_fields(&mut light).unwrap();
		assert_eq!(light.deviance.value(), 0.0);
	}

	#[test]
	fn check_fields_divides_inverse_brightness_across_samples() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		let mut light = Light::default();
		light.light.set(400.0);
		light.delay.set(2); // INVERSE2
		light.deviance.set(4.0);
		light.samples.set(4);
		ctx.check_entity_fields(&mut light).unwrap();
		assert_eq!(light.light.value(), 100.0);

		// LINEAR keeps its intensity
		let mut light = Light::default();
		light.light.set(400.0);
		light.deviance.set(4.0);
		light.samples.set(4);
		ctx.check_entity_fields(&mut light).unwrap();
		assert_eq!(light.light.value(), 400.0);
	}

	#[test]
	fn check_fields_resets_unknown_formula() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		let mut light = Light::default();
		light.delay.set(17);
		ctx.check_entity_fields(&mut light).unwrap();
		assert_eq!(light.formula(), Formula::Linear);
		assert!(ctx.warned_unknown_formula);
	}

	#[test]
	fn check_fields_rejects_bad_style() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		let mut light = Light::default();
		light.style.set(255);
		assert!(matches!(ctx.check_entity_fields(&mut light), Err(LightError::BadLightStyle(255))));
	}

	#[test]
	fn mangle_makes_a_spotlight() {
		let bsp = BspData::default();
		let mut ctx = empty_ctx(&bsp);

		let mut dict = EntDict::default();
		dict.set("classname", "light");
		dict.set("mangle", "0 -90 0");
		ctx.entdicts.push(dict);

		let light = ctx.build_light(0).unwrap();
		assert!(light.spotlight);
		assert!(light.spotvec.abs_diff_eq(vec3(0.0, 0.0, -1.0), 1e-6));
		// projangle inherits the mangle when not set explicitly
		assert_eq!(light.projangle.value(), vec3(0.0, -90.0, 0.0));
	}

	#[test]
	fn fov_validation() {
		assert!(calc_fov(0.5, 64.0, 64.0).is_err());
		assert!(calc_fov(180.0, 64.0, 64.0).is_err());

		// square images keep the fov
		let fov = calc_fov(90.0, 64.0, 64.0).unwrap();
		assert!((fov - 90.0).abs() < 1e-4);
		// taller-than-wide raises it
		assert!(calc_fov(90.0, 64.0, 128.0).unwrap() > 90.0);
	}

	#[test]
	fn projection_matrix_shape() {
		let proj = projection_inf(90.0, 90.0, 4.0);
		let cols = proj.to_cols_array();

		// symmetric frustum: no off-center terms, fixed depth row
		assert_eq!(cols[8], 0.0);
		assert_eq!(cols[9], 0.0);
		assert_eq!(cols[10], -0.5);
		assert_eq!(cols[11], -1.0);
		assert_eq!(cols[14], -8.0);
		assert!((cols[0] - 1.0).abs() < 1e-5);
		assert!((cols[5] - 1.0).abs() < 1e-5);
	}
}
