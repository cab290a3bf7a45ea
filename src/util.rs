//! Small conversion helpers shared across the entity and light layers.

use glam::{vec3, Vec3};

/// Convert an id-format mangle (`yaw pitch roll`, degrees) into a unit direction.
/// Roll has no effect on the direction.
pub fn vec_from_mangle(m: Vec3) -> Vec3 {
	let yaw = m.x.to_radians();
	let pitch = m.y.to_radians();

	vec3(yaw.cos() * pitch.cos(), yaw.sin() * pitch.cos(), pitch.sin())
}

/// Detect colors with all components in 0-1 and scale them to 0-255.
pub fn normalize_color_format(color: Vec3) -> Vec3 {
	if color.cmpge(Vec3::ZERO).all() && color.cmple(Vec3::ONE).all() {
		color * 255.0
	} else {
		color
	}
}

/// Parse the leading float of a value string. Unparsable input reads as `None`.
pub fn parse_float(value: &str) -> Option<f32> {
	value.split_whitespace().next()?.parse().ok()
}

/// Parse an entity vector value. Accepts a space-separated triple, or a single
/// scalar which is duplicated across all three components.
pub fn parse_vec3(value: &str) -> Option<Vec3> {
	let floats: Vec<f32> = value.split_whitespace().map_while(|t| t.parse().ok()).collect();

	match floats.len() {
		1 => Some(Vec3::splat(floats[0])),
		3.. => Some(vec3(floats[0], floats[1], floats[2])),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mangle_cardinal_directions() {
		assert!(vec_from_mangle(Vec3::ZERO).abs_diff_eq(Vec3::X, 1e-6));
		assert!(vec_from_mangle(vec3(90.0, 0.0, 0.0)).abs_diff_eq(Vec3::Y, 1e-6));
		assert!(vec_from_mangle(vec3(0.0, 90.0, 0.0)).abs_diff_eq(Vec3::Z, 1e-6));
		assert!(vec_from_mangle(vec3(0.0, -90.0, 0.0)).abs_diff_eq(Vec3::NEG_Z, 1e-6));
	}

	#[test]
	fn color_normalization() {
		assert_eq!(normalize_color_format(vec3(1.0, 0.0, 0.5)), vec3(255.0, 0.0, 127.5));
		// any component above 1 means the color is already in byte range
		assert_eq!(normalize_color_format(vec3(200.0, 10.0, 10.0)), vec3(200.0, 10.0, 10.0));
	}

	#[test]
	fn vec3_parsing() {
		assert_eq!(parse_vec3("1 2 3"), Some(vec3(1.0, 2.0, 3.0)));
		assert_eq!(parse_vec3("5"), Some(Vec3::splat(5.0)));
		assert_eq!(parse_vec3("1 2"), None);
		assert_eq!(parse_vec3(""), None);
	}
}
