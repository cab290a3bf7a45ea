//! Bounce lights: secondary emitters standing in for light reflected off faces.
//!
//! Faces are diced into patches, direct lighting is sampled per patch, and the
//! area-weighted average becomes one emitter per face. The pass runs in parallel
//! across face numbers; results merge at the barrier in face order, so the output
//! is deterministic for fixed inputs.

use std::collections::BTreeMap;

use glam::{vec3, Vec3};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::{
	data::{BoundingBox, ExtendedTexFlags},
	light::{LightingContext, ModelInfoSource},
	winding::{inward_edge_planes, Plane, Winding},
};

/// Per-style colors, keyed by light style. Ordered so iteration (and any
/// serialization) is deterministic.
pub type StyleMap = BTreeMap<i32, Vec3>;

/// Bounce patches are diced to at most this many units per side.
const BOUNCE_PATCH_SIZE: f32 = 64.0;

/// Texture color used when the source art is unavailable.
const GRAY: Vec3 = vec3(127.0, 127.0, 127.0);

/// A secondary emitter derived from one face.
#[derive(Debug, Clone)]
pub struct BounceLight {
	/// The face polygon.
	pub poly: Vec<Vec3>,
	pub poly_edge_planes: SmallVec<[Plane; 8]>,
	/// Face center lifted 1 unit along the normal.
	pub pos: Vec3,
	/// Emitted radiance per style, components in 0..1.
	pub color_by_style: StyleMap,
	/// Componentwise max over all styles, for cheap culling.
	pub componentwise_max_color: Vec3,
	pub surfnormal: Vec3,
	pub area: f32,
	/// Coarse visible-region bounds, when estimated.
	pub bounds: Option<BoundingBox>,
}

/// A diced sample cell of a face.
struct Patch {
	w: Winding,
	light_by_style: StyleMap,
}

/// Sample direct lighting at the patch center, lifted 1 unit off the surface.
fn make_patch<D: Fn(Vec3, Vec3) -> StyleMap>(direct: &D, w: Winding) -> Patch {
	let plane = w.plane();
	let samplepoint = w.center() + plane.normal;
	let light_by_style = direct(samplepoint, plane.normal);

	Patch { w, light_by_style }
}

impl<'a> LightingContext<'a> {
	/// Average every RGBA texture's opaque texels into the name -> color table the
	/// bounce pass blends with.
	pub fn make_texture_colors(&mut self) {
		if self.bsp.rgba_miptexes.is_empty() {
			return;
		}

		log::info!("computing texture colors");

		for miptex in &self.bsp.rgba_miptexes {
			let Some(pixels) = &miptex.pixels else {
				continue;
			};
			self.texture_colors.insert(miptex.name.clone(), texture_avg_color(pixels));
		}
	}

	fn face_texture_color(&self, facenum: usize) -> Vec3 {
		let name = self.bsp.face_texture_name(self.bsp.face(facenum));
		self.texture_colors.get(name).copied().unwrap_or(GRAY)
	}

	fn face_should_bounce<M: ModelInfoSource>(&self, models: &M, facenum: usize) -> bool {
		let face = self.bsp.face(facenum);

		// only shadow-casting faces reflect
		match models.model_info_for_face(self.bsp, facenum) {
			Some(info) if info.shadow => {}
			_ => return false,
		}

		if !self.bsp.face_is_lightmapped(face) {
			return false;
		}

		let texname = self.bsp.face_texture_name(face);
		if texname.eq_ignore_ascii_case("skip") {
			return false;
		}

		// per-surface "_bounce" "-1"
		if let Some(texinfo) = self.bsp.texinfo(face.tex_info_idx) {
			if texinfo.extended.contains(ExtendedTexFlags::NO_BOUNCE) {
				return false;
			}
		}

		true
	}

	fn make_bounce_light<M, D>(&self, models: &M, direct: &D, facenum: usize) -> Option<BounceLight>
	where
		M: ModelInfoSource,
		D: Fn(Vec3, Vec3) -> StyleMap,
	{
		if !self.face_should_bounce(models, facenum) {
			return None;
		}

		let face = self.bsp.face(facenum);
		let winding = Winding::from_face(self.bsp, face);

		let facearea = winding.area();
		if facearea == 0.0 {
			// degenerate face
			return None;
		}

		let faceplane = winding.plane();
		let facemidpoint = winding.center() + faceplane.normal;

		let mut patches = Vec::new();
		winding.dice(BOUNCE_PATCH_SIZE, &mut |w| patches.push(make_patch(direct, w)));

		// area-weighted average per style
		let mut sum = StyleMap::new();
		let mut totalarea = 0.0;

		for patch in &patches {
			let patcharea = patch.w.area();
			totalarea += patcharea;

			for (style, color) in &patch.light_by_style {
				*sum.entry(*style).or_insert(Vec3::ZERO) += *color * patcharea;
			}
		}

		// tiny and zero-area faces would turn the average into nonsense
		if totalarea < 1.0 {
			return None;
		}
		for color in sum.values_mut() {
			*color *= 1.0 / totalarea;
		}

		// lerp between gray and the texture color according to bouncecolorscale
		let scale = self.cfg.bouncecolorscale.value();
		let blended = self.face_texture_color(facenum) * scale + GRAY * (1.0 - scale);

		// received radiosity times reflectance, both mapped to 0..1
		let mut emitcolors = StyleMap::new();
		for (style, color) in &sum {
			emitcolors.insert(*style, (*color / 255.0) * (blended / 255.0));
		}

		for color in emitcolors.values() {
			debug_assert!(color.cmpge(Vec3::ZERO).all());
		}
		debug_assert!(facearea > 0.0);

		let poly = self.bsp.face_points(face);
		let poly_edge_planes = inward_edge_planes(&poly, faceplane.normal);

		let componentwise_max_color = emitcolors.values().fold(Vec3::ZERO, |max, color| max.max(*color));

		let bounds = if self.cfg.novisapprox {
			None
		} else {
			models.estimate_visible_bounds(facemidpoint)
		};

		Some(BounceLight {
			poly,
			poly_edge_planes,
			pos: facemidpoint,
			color_by_style: emitcolors,
			componentwise_max_color,
			surfnormal: faceplane.normal,
			area: facearea,
			bounds,
		})
	}

	/// Generate bounce lights for every qualifying face. `direct` is the external
	/// direct-lighting sampler; it is called once per patch.
	pub fn make_bounce_lights<M, D>(&mut self, models: &M, direct: &D)
	where
		M: ModelInfoSource + Sync,
		D: Fn(Vec3, Vec3) -> StyleMap + Sync,
	{
		log::info!("generating bounce lights");

		let results: Vec<(usize, BounceLight)> = (0..self.bsp.faces.len())
			.into_par_iter()
			.filter_map(|facenum| self.make_bounce_light(models, direct, facenum).map(|light| (facenum, light)))
			.collect();

		for (facenum, light) in results {
			self.push_bounce_light(facenum, light);
		}

		log::info!("{} bounce lights created", self.bounce_lights().len());
	}
}

/// Average color of a texture in 0..255, counting only texels with alpha >= 128 but
/// dividing by the full texel count, so transparent regions darken the average.
fn texture_avg_color(pixels: &image::RgbaImage) -> Vec3 {
	let texel_count = pixels.width() * pixels.height();
	if texel_count == 0 {
		return Vec3::ZERO;
	}

	let mut color = Vec3::ZERO;
	for pixel in pixels.pixels() {
		if pixel[3] < 128 {
			continue;
		}
		color += vec3(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
	}

	color / texel_count as f32
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{settings::GlobalSettings, testbsp};

	#[test]
	fn avg_color_counts_transparent_texels_in_the_divisor() {
		let mut pixels = image::RgbaImage::new(2, 1);
		pixels.put_pixel(0, 0, image::Rgba([255, 255, 255, 255]));
		pixels.put_pixel(1, 0, image::Rgba([255, 255, 255, 0]));

		assert_eq!(texture_avg_color(&pixels), Vec3::splat(127.5));
	}

	#[test]
	fn avg_color_of_opaque_texture() {
		let pixels = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
		assert_eq!(texture_avg_color(&pixels), vec3(10.0, 20.0, 30.0));
	}

	#[test]
	fn texture_colors_skip_textures_without_pixels() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		bsp.rgba_miptexes.push(crate::data::RgbaMiptex {
			name: "floor".to_string(),
			pixels: Some(image::RgbaImage::from_pixel(2, 2, image::Rgba([40, 80, 120, 255]))),
		});
		bsp.rgba_miptexes.push(crate::data::RgbaMiptex {
			name: "unreadable".to_string(),
			pixels: None,
		});

		let mut ctx = LightingContext::new(&bsp, GlobalSettings::default());
		ctx.make_texture_colors();

		assert_eq!(ctx.texture_colors.get("floor"), Some(&vec3(40.0, 80.0, 120.0)));
		assert!(!ctx.texture_colors.contains_key("unreadable"));
	}

	#[test]
	fn skip_faces_do_not_bounce() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "skip", "");
		let ctx = LightingContext::new(&bsp, GlobalSettings::default());

		assert!(!ctx.face_should_bounce(&testbsp::AllShadow, 0));
	}

	#[test]
	fn nobounce_extended_flag_wins() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		bsp.tex_info[0].extended = ExtendedTexFlags::NO_BOUNCE;

		let ctx = LightingContext::new(&bsp, GlobalSettings::default());
		assert!(!ctx.face_should_bounce(&testbsp::AllShadow, 0));
	}
}
