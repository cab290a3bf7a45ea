//! Windings: ordered convex vertex loops on a plane, plus the polygon operations
//! the lighting passes need (area, subdivision, dicing, edge-plane containment).

use glam::Vec3;
use smallvec::SmallVec;

use crate::{
	data::{BspData, BspFace},
	LightError, LightResult,
};

/// Subdividing a polygon with more vertices than this is refused outright; clipping
/// buffers in the original tooling were fixed at 64 entries.
pub const MAX_SUBDIVIDE_VERTS: usize = 60;

/// A general plane (no axial type tag).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
	pub normal: Vec3,
	pub dist: f32,
}

impl Plane {
	/// Signed distance from `point`, computed in f64 like the BSP plane variant.
	pub fn distance_to(&self, point: Vec3) -> f32 {
		(self.normal.as_dvec3().dot(point.as_dvec3()) - self.dist as f64) as f32
	}
}

impl std::ops::Neg for Plane {
	type Output = Plane;

	fn neg(self) -> Plane {
		Plane {
			normal: -self.normal,
			dist: -self.dist,
		}
	}
}

/// An ordered list of vertices forming a convex polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Winding(pub Vec<Vec3>);

impl Winding {
	/// Build the winding of a face. Vertex order comes from the surface-edge signs
	/// and defines the winding direction; do not reorder.
	pub fn from_face(bsp: &BspData, face: &BspFace) -> Self {
		Self((0..face.num_edges as usize).map(|i| bsp.face_point(face, i)).collect())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Polygon area via the triangle fan around vertex 0.
	pub fn area(&self) -> f32 {
		let mut total = 0.0;
		for i in 2..self.0.len() {
			let d1 = self.0[i - 1] - self.0[0];
			let d2 = self.0[i] - self.0[0];
			total += 0.5 * d1.cross(d2).length();
		}
		total
	}

	/// Arithmetic mean of the vertices. Not area weighted.
	pub fn center(&self) -> Vec3 {
		self.0.iter().sum::<Vec3>() / self.0.len() as f32
	}

	/// The plane the winding lies on, derived from the first non-collinear vertex
	/// triple. The vertex ordering determines the normal's orientation.
	pub fn plane(&self) -> Plane {
		let v1 = self.0[1] - self.0[0];
		let mut normal = Vec3::ZERO;

		for k in 2..self.0.len() {
			normal = (self.0[k] - self.0[0]).cross(v1);
			if normal.length_squared() > 1e-8 {
				break;
			}
		}
		let normal = normal.normalize_or_zero();

		Plane {
			normal,
			dist: self.0[0].dot(normal),
		}
	}

	pub fn bounds(&self) -> (Vec3, Vec3) {
		let mut mins = Vec3::INFINITY;
		let mut maxs = Vec3::NEG_INFINITY;
		for v in &self.0 {
			mins = mins.min(*v);
			maxs = maxs.max(*v);
		}
		(mins, maxs)
	}

	/// Clip against the axis plane `x[axis] = dist`, returning the front and back
	/// halves.
	///
	/// The emission rules are load bearing for output stability: a vertex exactly on
	/// the plane goes to both sides, and a split vertex is interpolated only on a
	/// strict sign flip.
	fn split_axis(&self, axis: usize, dist: f32) -> (Winding, Winding) {
		let n = self.0.len();
		let dists: Vec<f32> = self.0.iter().map(|v| v[axis] - dist).collect();

		let mut front = Vec::new();
		let mut back = Vec::new();

		for j in 0..n {
			let v = self.0[j];
			let d0 = dists[j];
			let d1 = dists[(j + 1) % n];

			if d0 >= 0.0 {
				front.push(v);
			}
			if d0 <= 0.0 {
				back.push(v);
			}
			if d0 == 0.0 || d1 == 0.0 {
				continue;
			}
			if (d0 > 0.0) != (d1 > 0.0) {
				let v2 = self.0[(j + 1) % n];
				let frac = d0 / (d0 - d1);
				let mid = v + (v2 - v) * frac;
				front.push(mid);
				back.push(mid);
			}
		}

		(Winding(front), Winding(back))
	}

	/// GLQuake-style axis-aligned subdivision.
	///
	/// For each axis, the midpoint is rounded to the nearest multiple of
	/// `subdivide_size`; if that grid line is at least 8 units from both bounds the
	/// polygon is cut there and both halves recurse. A polygon no axis qualifies for
	/// is a leaf cell and is passed to `f`.
	pub fn subdivide(&self, subdivide_size: f32, f: &mut dyn FnMut(&Winding)) -> LightResult<()> {
		if self.0.len() > MAX_SUBDIVIDE_VERTS {
			return Err(LightError::SubdivisionOverflow(self.0.len()));
		}

		let (mins, maxs) = self.bounds();

		for axis in 0..3 {
			let mut m = (mins[axis] + maxs[axis]) * 0.5;
			m = subdivide_size * (m / subdivide_size + 0.5).floor();
			if maxs[axis] - m < 8.0 {
				continue;
			}
			if m - mins[axis] < 8.0 {
				continue;
			}

			let (front, back) = self.split_axis(axis, m);
			front.subdivide(subdivide_size, f)?;
			back.subdivide(subdivide_size, f)?;
			return Ok(());
		}

		f(self);
		Ok(())
	}

	/// Repeatedly split the largest side of the bounding extent at its midpoint
	/// until no side exceeds `max_size`, calling `f` on every leaf piece.
	pub fn dice(&self, max_size: f32, f: &mut dyn FnMut(Winding)) {
		let (mins, maxs) = self.bounds();
		let size = maxs - mins;

		let mut axis = 0;
		for i in 1..3 {
			if size[i] > size[axis] {
				axis = i;
			}
		}

		if size[axis] <= max_size {
			f(self.clone());
			return;
		}

		let (front, back) = self.split_axis(axis, (mins[axis] + maxs[axis]) * 0.5);
		if front.0.len() >= 3 {
			front.dice(max_size, f);
		}
		if back.0.len() >= 3 {
			back.dice(max_size, f);
		}
	}
}

/// Inward-facing boundary planes of a convex polygon: one per edge, normal the
/// cross of the edge direction with the polygon normal.
pub fn inward_edge_planes(points: &[Vec3], face_normal: Vec3) -> SmallVec<[Plane; 8]> {
	let mut out = SmallVec::new();

	for i in 0..points.len() {
		let v0 = points[i];
		let v1 = points[(i + 1) % points.len()];

		let edgevec = (v1 - v0).normalize_or_zero();
		let normal = edgevec.cross(face_normal);

		out.push(Plane {
			normal,
			dist: normal.dot(v0),
		});
	}

	out
}

/// A point is inside the polygon iff it is on or in front of every edge plane.
pub fn edge_planes_contain(edge_planes: &[Plane], point: Vec3) -> bool {
	edge_planes.iter().all(|plane| plane.distance_to(point) >= 0.0)
}
