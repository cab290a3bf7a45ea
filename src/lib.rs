//! Light compiler core for Quake 1/2 family BSPs.
//!
//! The crate takes an already-loaded BSP (see [`data::BspData`]) together with its
//! entity lump and turns them into light emitters: point and spot lights, suns, a
//! sky dome, synthetic surface lights, and bounce lights for radiosity. It also
//! provides the spatial queries a lighting pipeline needs (point-in-solid, face
//! lookup by point and normal, face geometry, polygon dicing).
//!
//! The pieces around it stay external: the BSP file loader, the direct-lighting
//! sampler, the per-face model policy ([`light::ModelInfoSource`]) and the final
//! lightmap baker. A run looks like:
//!
//! ```no_run
//! # fn direct_lighting(_: glam::Vec3, _: glam::Vec3) -> qlight::light::StyleMap { Default::default() }
//! # struct Models;
//! # impl qlight::light::ModelInfoSource for Models {
//! #     fn model_info_for_face(&self, _: &qlight::data::BspData, _: usize) -> Option<qlight::light::ModelInfo> { None }
//! # }
//! # let bsp = qlight::data::BspData::default();
//! # let models = Models;
//! use qlight::{light::LightingContext, settings::GlobalSettings};
//!
//! let mut ctx = LightingContext::new(&bsp, GlobalSettings::default());
//! ctx.setup_lights(&models)?;
//!
//! // ... run the direct lighting pass, then:
//! ctx.make_texture_colors();
//! ctx.make_bounce_lights(&models, &direct_lighting);
//!
//! let new_entity_lump = ctx.entity_lump();
//! # Ok::<(), qlight::LightError>(())
//! ```

pub mod data;
pub mod entity;
pub mod light;
pub mod prelude;
pub mod query;
pub mod settings;
pub mod util;
pub mod winding;

#[cfg(test)]
pub(crate) mod testbsp;


// Re-exports
pub use glam;
pub use image;
pub use smallvec;

use thiserror::Error;

/// Fatal lighting errors: corrupt input or unusable configuration. Anything
/// recoverable is logged instead.
#[derive(Debug, Clone, Error)]
pub enum LightError {
	#[error("BSP has no models")]
	NoWorldModel,

	#[error("Corrupt BSP: leaf {leafnum} is out of bounds (numleafs = {numleafs})")]
	LeafOutOfBounds { leafnum: usize, numleafs: usize },

	#[error("found \"{0}\" when expecting {{")]
	ExpectedOpenBrace(String),

	#[error("EOF without closing brace")]
	UnexpectedEof,

	#[error("closing brace without data")]
	BraceWithoutData,

	#[error("entity {kind} length {len} exceeds the maximum of {max}")]
	EntTokenTooLong {
		kind: &'static str,
		len: usize,
		max: usize,
	},

	#[error("worldspawn missing, duplicated or not the first entity")]
	NoWorldspawn,

	#[error("bad light style {0} (must be 0-254)")]
	BadLightStyle(i32),

	#[error("bad fov: {0}")]
	BadFov(f32),

	#[error("too many unique light targetnames")]
	TooManyLightTargets,

	#[error("polygon subdivision overflow ({0} vertices)")]
	SubdivisionOverflow(usize),
}

pub type LightResult<T> = Result<T, LightError>;
