//! The BSP query layer: indexed accessors, face geometry, texture and contents
//! classification, and the point queries used by light placement.
//!
//! Accessor bounds violations are programmer errors and panic, except leaf lookups,
//! which can be driven out of range by corrupt node children and therefore report a
//! formatted error. Tree descents use an explicit stack; deep maps overflow the call
//! stack otherwise.

use glam::Vec3;
use smallvec::SmallVec;

use crate::{
	data::*,
	winding::{edge_planes_contain, inward_edge_planes, Plane},
	LightError, LightResult,
};

/// Straddle epsilon for node-plane distances. Descending both sides inside this band
/// is what makes faces lying exactly on node planes findable.
const ON_NODE_EPSILON: f32 = 0.1;

/// Quake 1 contents classification of a face, derived from its texture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureContents {
	Solid,
	Water,
	Slime,
	Lava,
	Sky,
}

/// What a face is made of: Quake 1 texture-name contents or the raw Quake 2
/// surface flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
	Contents(TextureContents),
	Surface(SurfaceFlags),
}

impl FaceKind {
	/// Quake 2 counts a surface as translucent when it carries some but not all of
	/// the alpha bits (the full combo is the opaque fence marker). Quake 1 liquids
	/// are translucent by contents.
	pub fn is_translucent(&self) -> bool {
		match *self {
			Self::Contents(contents) => {
				matches!(contents, TextureContents::Water | TextureContents::Slime | TextureContents::Lava)
			}
			Self::Surface(flags) => {
				let alpha = flags.intersection(SurfaceFlags::TRANSLUCENT);
				!alpha.is_empty() && alpha != SurfaceFlags::TRANSLUCENT
			}
		}
	}
}

/// Classify a Quake 1 texture name by its special prefixes.
pub fn texture_name_contents(texname: &str) -> TextureContents {
	let name = texname.as_bytes();

	if name.len() >= 3 && name[..3].eq_ignore_ascii_case(b"sky") {
		TextureContents::Sky
	} else if name.len() >= 5 && name[..5].eq_ignore_ascii_case(b"*lava") {
		TextureContents::Lava
	} else if name.len() >= 6 && name[..6].eq_ignore_ascii_case(b"*slime") {
		TextureContents::Slime
	} else if name.first() == Some(&b'*') {
		TextureContents::Water
	} else {
		TextureContents::Solid
	}
}

impl BspData {
	/// The worldspawn model. A BSP without one is unusable for lighting.
	pub fn world_model(&self) -> LightResult<&BspModel> {
		self.models.first().ok_or(LightError::NoWorldModel)
	}

	pub fn node(&self, nodenum: usize) -> &BspNode {
		&self.nodes[nodenum]
	}

	pub fn plane(&self, planenum: usize) -> &BspPlane {
		&self.planes[planenum]
	}

	pub fn face(&self, facenum: usize) -> &BspFace {
		&self.faces[facenum]
	}

	/// Leaf lookup. Unlike the other accessors this reports corrupt indices as an
	/// error, because node children come straight from the file.
	pub fn leaf(&self, leafnum: usize) -> LightResult<&BspLeaf> {
		self.leaves.get(leafnum).ok_or(LightError::LeafOutOfBounds {
			leafnum,
			numleafs: self.leaves.len(),
		})
	}

	/// Texinfo lookup; negative and out-of-range indices read as absent.
	pub fn texinfo(&self, texinfo: i32) -> Option<&BspTexInfo> {
		usize::try_from(texinfo).ok().and_then(|i| self.tex_info.get(i))
	}

	/// Retrieve the vertex index of face corner `v` through the surfedge table. A
	/// negative surfedge selects the edge's second endpoint; this ordering defines
	/// the winding direction.
	pub fn face_vertex_index(&self, face: &BspFace, v: usize) -> usize {
		assert!(v < face.num_edges as usize);

		let surf_edge = self.surface_edges[face.first_edge as usize + v];
		let edge = &self.edges[surf_edge.unsigned_abs() as usize];

		if surf_edge.is_negative() {
			edge.b as usize
		} else {
			edge.a as usize
		}
	}

	pub fn face_point(&self, face: &BspFace, v: usize) -> Vec3 {
		self.vertices[self.face_vertex_index(face, v)]
	}

	pub fn face_points(&self, face: &BspFace) -> Vec<Vec3> {
		(0..face.num_edges as usize).map(|v| self.face_point(face, v)).collect()
	}

	pub fn face_centroid(&self, face: &BspFace) -> Vec3 {
		let points = self.face_points(face);
		points.iter().sum::<Vec3>() / points.len() as f32
	}

	/// The face's plane, negated when `side` is set.
	pub fn face_plane(&self, face: &BspFace) -> Plane {
		let plane = &self.planes[face.plane_idx as usize];

		if face.side {
			Plane {
				normal: -plane.normal,
				dist: -plane.dist,
			}
		} else {
			Plane {
				normal: plane.normal,
				dist: plane.dist,
			}
		}
	}

	pub fn face_normal(&self, face: &BspFace) -> Vec3 {
		self.face_plane(face).normal
	}

	/// Inward-facing boundary planes of a face.
	pub fn face_edge_planes(&self, face: &BspFace) -> SmallVec<[Plane; 8]> {
		inward_edge_planes(&self.face_points(face), self.face_normal(face))
	}

	pub fn face_miptex(&self, face: &BspFace) -> Option<&Miptex> {
		// no miptex data (Q2 maps)
		if self.miptexes.is_empty() {
			return None;
		}

		let texinfo = self.texinfo(face.tex_info_idx)?;
		let miptex = self.miptexes.get(texinfo.miptex)?;

		// sometimes the texture just wasn't written, including its name
		if miptex.name.is_empty() {
			return None;
		}

		Some(miptex)
	}

	pub fn face_rgba_miptex(&self, face: &BspFace) -> Option<&RgbaMiptex> {
		if self.rgba_miptexes.is_empty() {
			return None;
		}

		let texinfo = self.texinfo(face.tex_info_idx)?;
		self.rgba_miptexes.get(texinfo.miptex)
	}

	/// The face's texture name: the miptex name, the RGBA miptex name, or the
	/// Quake 2 texinfo name, whichever exists first. Empty when all are absent.
	pub fn face_texture_name(&self, face: &BspFace) -> &str {
		if let Some(miptex) = self.face_miptex(face) {
			return &miptex.name;
		}
		if let Some(miptex) = self.face_rgba_miptex(face) {
			return &miptex.name;
		}
		if let Some(texinfo) = self.texinfo(face.tex_info_idx) {
			if !texinfo.texture.is_empty() {
				return &texinfo.texture;
			}
		}
		""
	}

	/// Whether the face receives a lightmap. Quake 1 excludes SPECIAL surfaces (sky
	/// and liquids); Quake 2 excludes sky, warp and nodraw surfaces.
	pub fn face_is_lightmapped(&self, face: &BspFace) -> bool {
		let Some(texinfo) = self.texinfo(face.tex_info_idx) else {
			return false;
		};

		match self.dialect {
			GameDialect::Quake1 => texinfo.flags & TEX_SPECIAL == 0,
			GameDialect::Quake2 => !SurfaceFlags::from_bits_truncate(texinfo.flags)
				.intersects(SurfaceFlags::SKY | SurfaceFlags::WARP | SurfaceFlags::NODRAW),
		}
	}

	/// Contents classification of a face: texture-name derived for Quake 1, the raw
	/// surface flags for Quake 2.
	pub fn face_contents(&self, face: &BspFace) -> FaceKind {
		match self.dialect {
			GameDialect::Quake2 => {
				let flags = self.texinfo(face.tex_info_idx).map(|t| t.flags).unwrap_or(0);
				FaceKind::Surface(SurfaceFlags::from_bits_truncate(flags))
			}
			GameDialect::Quake1 => FaceKind::Contents(texture_name_contents(self.face_texture_name(face))),
		}
	}

	pub fn face_is_translucent(&self, face: &BspFace) -> bool {
		self.face_contents(face).is_translucent()
	}

	/// Whether a leaf is solid for light placement. Quake 1 treats sky leaves as
	/// solid too; lights inside sky are just as stuck.
	pub fn leaf_is_solid(&self, leaf: &BspLeaf) -> bool {
		match self.dialect {
			GameDialect::Quake2 => ContentFlags::from_bits_truncate(leaf.contents as u32).contains(ContentFlags::SOLID),
			GameDialect::Quake1 => leaf.contents == CONTENTS_SOLID || leaf.contents == CONTENTS_SKY,
		}
	}

	/// Test whether `point` is inside solid space of `model`'s hull 0.
	///
	/// Points within [`ON_NODE_EPSILON`] of a node plane check both subtrees, so a
	/// point resting exactly on a wall counts as solid.
	pub fn point_in_solid(&self, model: &BspModel, point: Vec3) -> LightResult<bool> {
		// fast bounds check
		if !model.bound.contains(point) {
			return Ok(false);
		}

		let mut stack = vec![model.head_node];

		while let Some(node_ref) = stack.pop() {
			match node_ref {
				BspNodeRef::Leaf(leafnum) => {
					if self.leaf_is_solid(self.leaf(leafnum as usize)?) {
						return Ok(true);
					}
				}
				BspNodeRef::Node(nodenum) => {
					let node = self.node(nodenum as usize);
					let dist = self.plane(node.plane_idx as usize).point_side(point);

					if dist > ON_NODE_EPSILON {
						stack.push(node.front);
					} else if dist < -ON_NODE_EPSILON {
						stack.push(node.back);
					} else {
						// too close to the plane, check both sides
						stack.push(node.front);
						stack.push(node.back);
					}
				}
			}
		}

		Ok(false)
	}

	/// [`Self::point_in_solid`] against the world model.
	pub fn point_in_world_solid(&self, point: Vec3) -> LightResult<bool> {
		self.point_in_solid(self.world_model()?, point)
	}

	/// Search for a face touching `point` and facing roughly along `wanted_normal`.
	///
	/// Water and sky can produce two coincident candidates facing opposite ways; the
	/// wanted normal disambiguates them. Returns the face number of the first match,
	/// preferring the front subtree.
	pub fn find_face_at_point(&self, model: &BspModel, point: Vec3, wanted_normal: Vec3) -> Option<usize> {
		let mut stack = vec![model.head_node];

		while let Some(node_ref) = stack.pop() {
			// only nodes are interesting, faces are owned by nodes
			let BspNodeRef::Node(nodenum) = node_ref else {
				continue;
			};

			let node = self.node(nodenum as usize);
			let dist = self.plane(node.plane_idx as usize).point_side(point);

			if dist > ON_NODE_EPSILON {
				stack.push(node.front);
				continue;
			}
			if dist < -ON_NODE_EPSILON {
				stack.push(node.back);
				continue;
			}

			// the point is on this node's plane, check the faces that lie on it
			for i in 0..node.num_faces {
				let facenum = (node.first_face + i) as usize;
				let face = self.face(facenum);

				if self.face_normal(face).dot(wanted_normal) < 0.0 {
					// facing the wrong way
					continue;
				}

				if edge_planes_contain(&self.face_edge_planes(face), point) {
					return Some(facenum);
				}
			}

			// no match on this plane, check both subtrees, front first
			stack.push(node.back);
			stack.push(node.front);
		}

		None
	}

	/// The leaf containing `point` within `model`'s hull 0.
	pub fn leaf_at_point(&self, model: &BspModel, point: Vec3) -> usize {
		let mut node_ref = model.head_node;

		loop {
			match node_ref {
				BspNodeRef::Leaf(leafnum) => return leafnum as usize,
				BspNodeRef::Node(nodenum) => {
					let node = self.node(nodenum as usize);

					node_ref = if self.plane(node.plane_idx as usize).point_side(point) >= 0.0 {
						node.front
					} else {
						node.back
					};
				}
			}
		}
	}

	/// Resolve a `*N` submodel reference from an entity's `model` key.
	pub fn model_for_string(&self, submodel: &str) -> Option<&BspModel> {
		let index: usize = submodel.strip_prefix('*')?.parse().ok()?;
		self.models.get(index)
	}
}

#[cfg(test)]
mod tests {
	use glam::vec3;

	use super::*;
	use crate::testbsp;

	#[test]
	fn face_winding_follows_surfedge_signs() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let face = bsp.face(0);

		// the fixture stores one reversed edge selected by a negative surfedge
		let points = bsp.face_points(face);
		assert_eq!(
			points,
			vec![
				vec3(-32.0, -32.0, -64.0),
				vec3(-32.0, 32.0, -64.0),
				vec3(32.0, 32.0, -64.0),
				vec3(32.0, -32.0, -64.0),
			]
		);

		for (i, point) in points.iter().enumerate() {
			assert_eq!(*point, bsp.vertices[bsp.face_vertex_index(face, i)]);
		}
	}

	#[test]
	fn face_plane_side_flips_normal_and_distance() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let face = bsp.faces[0];
		assert!(bsp.face_plane(&face).normal.abs_diff_eq(Vec3::Z, 1e-6));
		assert_eq!(bsp.face_plane(&face).dist, -64.0);

		bsp.faces[0].side = true;
		let face = bsp.faces[0];
		assert!(bsp.face_plane(&face).normal.abs_diff_eq(Vec3::NEG_Z, 1e-6));
		assert_eq!(bsp.face_plane(&face).dist, 64.0);
	}

	#[test]
	fn centroid_is_inside_every_convex_face() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let face = bsp.face(0);
		assert!(edge_planes_contain(&bsp.face_edge_planes(face), bsp.face_centroid(face)));
	}

	#[test]
	fn point_in_solid_inside_and_outside() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let world = bsp.world_model().unwrap();

		// strictly inside the empty interior leaf
		assert!(!bsp.point_in_solid(world, Vec3::ZERO).unwrap());
		// buried in the +x wall
		assert!(bsp.point_in_solid(world, vec3(40.0, 0.0, 0.0)).unwrap());
		// outside the model bounds short-circuits to false
		assert!(!bsp.point_in_solid(world, vec3(4096.0, 0.0, 0.0)).unwrap());
		// exactly on the floor plane straddles into the solid side
		assert!(bsp.point_in_solid(world, vec3(0.0, 0.0, -64.0)).unwrap());
	}

	#[test]
	fn find_face_at_point_respects_wanted_normal() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let world = bsp.world_model().unwrap();
		let on_floor = vec3(0.0, 0.0, -64.0);

		assert_eq!(bsp.find_face_at_point(world, on_floor, Vec3::Z), Some(0));
		assert_eq!(bsp.find_face_at_point(world, on_floor, Vec3::NEG_Z), None);
		// off the face polygon
		assert_eq!(bsp.find_face_at_point(world, vec3(100.0, 0.0, -64.0), Vec3::Z), None);
	}

	#[test]
	fn leaf_at_point_finds_the_interior() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let world = bsp.world_model().unwrap();

		let leafnum = bsp.leaf_at_point(world, Vec3::ZERO);
		assert_eq!(bsp.leaves[leafnum].contents, CONTENTS_EMPTY);
	}

	#[test]
	fn corrupt_leaf_index_is_a_formatted_error() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		assert!(matches!(bsp.leaf(999), Err(LightError::LeafOutOfBounds { leafnum: 999, .. })));
	}

	#[test]
	fn texture_name_fallback_order() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let face = bsp.faces[0];
		assert_eq!(bsp.face_texture_name(&face), "floor");

		// unnamed miptex falls through to the texinfo name (Q2 path)
		bsp.miptexes[0].name.clear();
		bsp.tex_info[0].texture = "e1u1/floor3_3".to_string();
		assert_eq!(bsp.face_texture_name(&face), "e1u1/floor3_3");

		bsp.tex_info[0].texture.clear();
		assert_eq!(bsp.face_texture_name(&face), "");
	}

	#[test]
	fn quake1_contents_from_texture_names() {
		assert_eq!(texture_name_contents("sky4"), TextureContents::Sky);
		assert_eq!(texture_name_contents("SKY1"), TextureContents::Sky);
		assert_eq!(texture_name_contents("*lava1"), TextureContents::Lava);
		assert_eq!(texture_name_contents("*slime0"), TextureContents::Slime);
		assert_eq!(texture_name_contents("*water2"), TextureContents::Water);
		assert_eq!(texture_name_contents("wbrick1_5"), TextureContents::Solid);
	}

	#[test]
	fn translucency_rules() {
		assert!(FaceKind::Contents(TextureContents::Water).is_translucent());
		assert!(!FaceKind::Contents(TextureContents::Solid).is_translucent());

		assert!(FaceKind::Surface(SurfaceFlags::TRANS33).is_translucent());
		assert!(FaceKind::Surface(SurfaceFlags::TRANS66).is_translucent());
		// the fence combo is opaque
		assert!(!FaceKind::Surface(SurfaceFlags::TRANSLUCENT).is_translucent());
	}

	#[test]
	fn quake2_face_contents_are_raw_flags() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		bsp.dialect = GameDialect::Quake2;
		bsp.tex_info[0].flags = (SurfaceFlags::LIGHT | SurfaceFlags::TRANS33).bits();

		let face = bsp.faces[0];
		match bsp.face_contents(&face) {
			FaceKind::Surface(flags) => {
				assert!(flags.contains(SurfaceFlags::LIGHT));
				assert!(bsp.face_is_translucent(&face));
			}
			FaceKind::Contents(_) => panic!("expected surface flags on Quake 2"),
		}
	}

	#[test]
	fn lightmapped_predicate_per_dialect() {
		let mut bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		let face = bsp.faces[0];
		assert!(bsp.face_is_lightmapped(&face));

		bsp.tex_info[0].flags = TEX_SPECIAL;
		assert!(!bsp.face_is_lightmapped(&face));

		bsp.dialect = GameDialect::Quake2;
		bsp.tex_info[0].flags = SurfaceFlags::SKY.bits();
		assert!(!bsp.face_is_lightmapped(&face));
		bsp.tex_info[0].flags = SurfaceFlags::LIGHT.bits();
		assert!(bsp.face_is_lightmapped(&face));
	}

	#[test]
	fn submodel_references() {
		let bsp = testbsp::box_world(32.0, 32.0, 64.0, "floor", "");
		assert!(bsp.model_for_string("*0").is_some());
		assert!(bsp.model_for_string("*9").is_none());
		assert!(bsp.model_for_string("maps/b_bh100.bsp").is_none());
	}
}
