//! Module that re-exports the types most embedders need.

pub use crate::{
	data::{BspData, GameDialect},
	entity::EntDict,
	light::{BounceLight, Formula, Light, LightingContext, ModelInfo, ModelInfoSource, StyleMap, Sun},
	settings::{GlobalSettings, Setting},
	winding::{Plane, Winding},
	LightError, LightResult,
};
