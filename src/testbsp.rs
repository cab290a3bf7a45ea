//! Hand-built BSP fixtures for tests.
//!
//! `box_world` is a hollow axis-aligned room: solid outside all six walls, one
//! empty interior leaf, and a single floor face at the bottom. `slab_world` is a
//! solid slab in otherwise empty space, for nudge tests.

use glam::{vec3, Vec3};

use crate::{
	data::*,
	light::{ModelInfo, ModelInfoSource},
};

/// Policy stub: every face belongs to the world and casts shadows.
pub struct AllShadow;

impl ModelInfoSource for AllShadow {
	fn model_info_for_face(&self, _bsp: &BspData, _facenum: usize) -> Option<ModelInfo> {
		Some(ModelInfo {
			offset: Vec3::ZERO,
			shadow: true,
		})
	}
}

/// Policy stub: no face belongs to any model.
pub struct NoModels;

impl ModelInfoSource for NoModels {
	fn model_info_for_face(&self, _bsp: &BspData, _facenum: usize) -> Option<ModelInfo> {
		None
	}
}

fn axial_plane(axis: usize, dist: f32) -> BspPlane {
	let (normal, ty) = match axis {
		0 => (Vec3::X, BspPlaneType::AxialX),
		1 => (Vec3::Y, BspPlaneType::AxialY),
		_ => (Vec3::Z, BspPlaneType::AxialZ),
	};
	BspPlane { normal, dist, ty }
}

/// A hollow room spanning `-hx..hx` by `-hy..hy` by `-hz..hz`, with one floor face
/// at `z = -hz` facing up, textured `texture`, and `entities` as the entity lump.
///
/// The BSP tree peels one wall per node; everything beyond a wall is solid. The
/// floor face hangs off the final node and is listed in the interior leaf's
/// marksurfaces. One of its edges is stored reversed and referenced through a
/// negative surfedge to exercise the sign convention.
pub fn box_world(hx: f32, hy: f32, hz: f32, texture: &str, entities: &str) -> BspData {
	let planes = vec![
		axial_plane(0, hx),
		axial_plane(0, -hx),
		axial_plane(1, hy),
		axial_plane(1, -hy),
		axial_plane(2, hz),
		axial_plane(2, -hz),
	];

	let solid = BspLeaf {
		contents: CONTENTS_SOLID,
		first_mark_surface: 0,
		num_mark_surfaces: 0,
	};
	let mut leaves = vec![solid; 7];
	// leaf 5 is the interior
	leaves[5] = BspLeaf {
		contents: CONTENTS_EMPTY,
		first_mark_surface: 0,
		num_mark_surfaces: 1,
	};

	let node = |plane_idx: u32, front: BspNodeRef, back: BspNodeRef| BspNode {
		plane_idx,
		front,
		back,
		first_face: 0,
		num_faces: 0,
	};
	use BspNodeRef::{Leaf, Node};
	let mut nodes = vec![
		node(0, Leaf(0), Node(1)),
		node(1, Node(2), Leaf(1)),
		node(2, Leaf(2), Node(3)),
		node(3, Node(4), Leaf(3)),
		node(4, Leaf(4), Node(5)),
		node(5, Leaf(5), Leaf(6)),
	];
	// the floor face lies on node 5's plane
	nodes[5].num_faces = 1;

	let vertices = vec![
		vec3(-hx, -hy, -hz),
		vec3(-hx, hy, -hz),
		vec3(hx, hy, -hz),
		vec3(hx, -hy, -hz),
	];

	// edge 0 is the conventional dummy; edge 2 is stored reversed and selected
	// through surfedge -2
	let edges = vec![
		BspEdge { a: 0, b: 0 },
		BspEdge { a: 0, b: 1 },
		BspEdge { a: 2, b: 1 },
		BspEdge { a: 2, b: 3 },
		BspEdge { a: 3, b: 0 },
	];
	let surface_edges = vec![1, -2, 3, 4];

	let faces = vec![BspFace {
		plane_idx: 5,
		side: false,
		first_edge: 0,
		num_edges: 4,
		tex_info_idx: 0,
	}];

	let tex_info = vec![BspTexInfo {
		projection: PlanarTextureProjection {
			u_axis: Vec3::X,
			u_offset: 0.0,
			v_axis: Vec3::Y,
			v_offset: 0.0,
		},
		miptex: 0,
		flags: 0,
		texture: String::new(),
		extended: ExtendedTexFlags::empty(),
	}];

	let miptexes = vec![Miptex {
		name: texture.to_string(),
		width: 16,
		height: 16,
		data: None,
	}];

	let margin = Vec3::splat(32.0);
	let models = vec![BspModel {
		bound: BoundingBox {
			min: vec3(-hx, -hy, -hz) - margin,
			max: vec3(hx, hy, hz) + margin,
		},
		origin: Vec3::ZERO,
		head_node: Node(0),
		first_face: 0,
		num_faces: 1,
	}];

	BspData {
		dialect: GameDialect::Quake1,
		entities: entities.to_string(),
		vertices,
		planes,
		edges,
		surface_edges,
		faces,
		nodes,
		leaves,
		mark_surfaces: vec![0],
		models,
		tex_info,
		miptexes,
		rgba_miptexes: Vec::new(),
	}
}

/// A solid slab between `x = x0` and `x = x1`, empty everywhere else. No faces.
pub fn slab_world(x0: f32, x1: f32, entities: &str) -> BspData {
	use BspNodeRef::{Leaf, Node};

	let planes = vec![axial_plane(0, x1), axial_plane(0, x0)];

	let nodes = vec![
		BspNode {
			plane_idx: 0,
			front: Leaf(0),
			back: Node(1),
			first_face: 0,
			num_faces: 0,
		},
		BspNode {
			plane_idx: 1,
			front: Leaf(1),
			back: Leaf(2),
			first_face: 0,
			num_faces: 0,
		},
	];

	let empty = BspLeaf {
		contents: CONTENTS_EMPTY,
		first_mark_surface: 0,
		num_mark_surfaces: 0,
	};
	let mut leaves = vec![empty; 3];
	leaves[1].contents = CONTENTS_SOLID;

	let models = vec![BspModel {
		bound: BoundingBox {
			min: Vec3::splat(-1024.0),
			max: Vec3::splat(1024.0),
		},
		origin: Vec3::ZERO,
		head_node: Node(0),
		first_face: 0,
		num_faces: 0,
	}];

	BspData {
		dialect: GameDialect::Quake1,
		entities: entities.to_string(),
		nodes,
		planes,
		leaves,
		models,
		..Default::default()
	}
}
