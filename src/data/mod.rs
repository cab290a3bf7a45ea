//! The read-only BSP view consumed by the lighting pipeline.
//!
//! These types are the contract with the (external) BSP loader: it hands us
//! already-parsed lumps, we never touch the on-disk encoding. Index fields keep
//! their on-disk meaning, including the signed surface-edge convention and the
//! negative-children node encoding (wrapped in [`BspNodeRef`]).

use bitflags::bitflags;
use glam::Vec3;

/// Which game family the BSP was compiled for. Quake 1 encodes leaf contents as a
/// negative enum and derives surface behavior from texture names; Quake 2 uses
/// content/surface bitflags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GameDialect {
	#[default]
	Quake1,
	Quake2,
}

/// Quake 1 leaf contents values.
pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;

bitflags! {
	/// Quake 2 leaf content flags. Only the bits the light pipeline inspects are named.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct ContentFlags: u32 {
		const SOLID = 1;
		const WINDOW = 1 << 1;
		const AUX = 1 << 2;
		const LAVA = 1 << 3;
		const SLIME = 1 << 4;
		const WATER = 1 << 5;
		const MIST = 1 << 6;
	}
}

bitflags! {
	/// Quake 2 per-texinfo surface flags.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct SurfaceFlags: u32 {
		/// Emissive surface.
		const LIGHT = 1;
		const SLICK = 1 << 1;
		const SKY = 1 << 2;
		const WARP = 1 << 3;
		const TRANS33 = 1 << 4;
		const TRANS66 = 1 << 5;
		const FLOWING = 1 << 6;
		const NODRAW = 1 << 7;

		/// Both alpha bits together. KMQ2 uses the full combo as a fence-texture
		/// marker, which renders opaque.
		const TRANSLUCENT = Self::TRANS33.bits() | Self::TRANS66.bits();
	}
}

bitflags! {
	/// Extended tool-side texinfo flags (from per-surface overrides such as
	/// `"_bounce" "-1"`). These never appear in the BSP itself; the loader resolves
	/// them before handing the view over.
	#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
	pub struct ExtendedTexFlags: u32 {
		const NO_BOUNCE = 1;
		const NO_MINLIGHT = 1 << 1;
		const NO_DIRT = 1 << 2;
		const NO_SHADOW = 1 << 3;
	}
}

/// Quake 1 texinfo flag marking unlit surfaces (sky and liquids).
pub const TEX_SPECIAL: u32 = 1;

/// A reference to either a node or a leaf of the BSP tree.
///
/// On disk this is an `i32` where a negative value encodes the leaf `-1 - value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BspNodeRef {
	Node(u32),
	Leaf(u32),
}

impl BspNodeRef {
	/// Decode the on-disk child value. Negative means a leaf; bitwise not handles
	/// the `-1 - value` encoding including integer asymmetry.
	pub const fn from_i32(value: i32) -> Self {
		if value.is_negative() {
			Self::Leaf(!value as u32)
		} else {
			Self::Node(value as u32)
		}
	}

	pub fn node(&self) -> Option<u32> {
		match *self {
			Self::Node(i) => Some(i),
			Self::Leaf(_) => None,
		}
	}

	pub fn leaf(&self) -> Option<u32> {
		match *self {
			Self::Leaf(i) => Some(i),
			Self::Node(_) => None,
		}
	}
}

impl From<i32> for BspNodeRef {
	fn from(value: i32) -> Self {
		Self::from_i32(value)
	}
}

/// Type of plane depending on its normal. The axial types allow a one-subtraction
/// distance computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BspPlaneType {
	AxialX = 0,
	AxialY = 1,
	AxialZ = 2,
	AroundX = 3,
	AroundY = 4,
	AroundZ = 5,
}

#[derive(Debug, Clone, Copy)]
pub struct BspPlane {
	pub normal: Vec3,
	pub dist: f32,
	pub ty: BspPlaneType,
}

impl BspPlane {
	/// Signed distance from `point` to the plane. `>0` = front, `<0` = back.
	///
	/// Axial planes take the fast path; general planes compute the dot product in
	/// f64 to minimise float drift on large maps.
	pub fn point_side(&self, point: Vec3) -> f32 {
		let plane_axis = self.ty as usize;

		if plane_axis < 3 {
			point[plane_axis] - self.dist
		} else {
			(self.normal.as_dvec3().dot(point.as_dvec3()) - self.dist as f64) as f32
		}
	}
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
	pub min: Vec3,
	pub max: Vec3,
}

impl BoundingBox {
	pub fn contains(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}
}

/// A non-leaf node of the BSP tree. Faces lying on the node plane are owned by the
/// node via `first_face..first_face + num_faces`.
#[derive(Debug, Clone, Copy)]
pub struct BspNode {
	pub plane_idx: u32,
	pub front: BspNodeRef,
	pub back: BspNodeRef,
	pub first_face: u32,
	pub num_faces: u32,
}

/// A leaf of the BSP tree.
///
/// `contents` keeps the raw on-disk word: a [`CONTENTS_SOLID`]-style enum value for
/// Quake 1, [`ContentFlags`] bits for Quake 2. The query layer interprets it through
/// the dialect flag.
#[derive(Debug, Clone, Copy)]
pub struct BspLeaf {
	pub contents: i32,
	pub first_mark_surface: u32,
	pub num_mark_surfaces: u32,
}

/// An unordered vertex pair; surface edges select the traversal direction by sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BspEdge {
	pub a: u32,
	pub b: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct BspFace {
	pub plane_idx: u32,
	/// When set, the face normal is the negated plane normal.
	pub side: bool,
	/// Index of the first entry in the surface-edge array.
	pub first_edge: u32,
	pub num_edges: u32,
	/// Index into the texinfo table; negative means no texinfo.
	pub tex_info_idx: i32,
}

/// A single model. Model 0 is worldspawn; entities reference the others as `*N`.
#[derive(Debug, Clone, Copy)]
pub struct BspModel {
	pub bound: BoundingBox,
	pub origin: Vec3,
	/// Hull 0 root, used for point queries. The clip hulls are not part of the
	/// lighting view.
	pub head_node: BspNodeRef,
	pub first_face: u32,
	pub num_faces: u32,
}

/// Texture projection axes, one offset per texture axis.
#[derive(Debug, Clone, Copy)]
pub struct PlanarTextureProjection {
	pub u_axis: Vec3,
	pub u_offset: f32,
	pub v_axis: Vec3,
	pub v_offset: f32,
}

#[derive(Debug, Clone)]
pub struct BspTexInfo {
	pub projection: PlanarTextureProjection,
	/// Index into the miptex (Quake 1) or RGBA miptex (extended) tables.
	pub miptex: usize,
	/// Raw flags word: Quake 1 texture flags ([`TEX_SPECIAL`]) or Quake 2
	/// [`SurfaceFlags`] bits, depending on dialect.
	pub flags: u32,
	/// Quake 2 stores the texture name directly on the texinfo. Empty for Quake 1.
	pub texture: String,
	pub extended: ExtendedTexFlags,
}

/// An embedded Quake 1 texture. `data` is the full-resolution paletted payload when
/// the compiler wrote one.
#[derive(Debug, Clone)]
pub struct Miptex {
	pub name: String,
	pub width: u32,
	pub height: u32,
	pub data: Option<Vec<u8>>,
}

/// An RGBA texture carried alongside the BSP (decoded by the loader from the source
/// art). Only present when the toolchain had access to it.
#[derive(Debug, Clone)]
pub struct RgbaMiptex {
	pub name: String,
	pub pixels: Option<image::RgbaImage>,
}

/// The loaded BSP, as handed over by the loader.
#[derive(Debug, Clone, Default)]
pub struct BspData {
	pub dialect: GameDialect,
	/// The raw entity lump text (NUL terminator already stripped).
	pub entities: String,
	pub vertices: Vec<Vec3>,
	pub planes: Vec<BspPlane>,
	pub edges: Vec<BspEdge>,
	pub surface_edges: Vec<i32>,
	pub faces: Vec<BspFace>,
	pub nodes: Vec<BspNode>,
	pub leaves: Vec<BspLeaf>,
	pub mark_surfaces: Vec<u32>,
	pub models: Vec<BspModel>,
	pub tex_info: Vec<BspTexInfo>,
	pub miptexes: Vec<Miptex>,
	pub rgba_miptexes: Vec<RgbaMiptex>,
}
