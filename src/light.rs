//! Light descriptors and the read-only registry that holds them. Grounded in
//! `original_source/renderer/light.hpp`,
//! which models the same three variants behind one polymorphic interface;
//! here that becomes an enum rather than a C++ virtual base, matching how
//! the teacher favors closed tagged unions over trait objects for small,
//! fixed sets of shader-adjacent types (e.g. `Handedness`, `YAxisDirection`
//! in the teacher's `pipeline.rs`).

use vek::{Rgb, Vec3};

/// A directional, point, or spot light. Read-only during a draw call,
/// mutated only between frames via `Light::set_position` etc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Directional {
        direction: Vec3<f32>,
        intensity: Rgb<f32>,
    },
    Point {
        position: Vec3<f32>,
        intensity: Rgb<f32>,
        /// Constant, linear, quadratic attenuation coefficients.
        attenuation: (f32, f32, f32),
    },
    Spot {
        position: Vec3<f32>,
        direction: Vec3<f32>,
        intensity: Rgb<f32>,
        attenuation: (f32, f32, f32),
        /// Cosine of the inner cone angle (full intensity within).
        inner_cos: f32,
        /// Cosine of the outer cone angle (zero intensity beyond).
        outer_cos: f32,
    },
}

impl Light {
    #[inline]
    pub fn intensity(&self) -> Rgb<f32> {
        match self {
            Light::Directional { intensity, .. }
            | Light::Point { intensity, .. }
            | Light::Spot { intensity, .. } => *intensity,
        }
    }

    /// Unit vector from `frag_pos` towards the light.
    #[inline]
    pub fn direction(&self, frag_pos: Vec3<f32>) -> Vec3<f32> {
        match self {
            Light::Directional { direction, .. } => -direction.normalized(),
            Light::Point { position, .. } | Light::Spot { position, .. } => {
                (*position - frag_pos).normalized()
            }
        }
    }

    /// `1 / (c + l*d + q*d^2)` for point/spot lights, `1.0` for directional.
    #[inline]
    pub fn attenuation(&self, frag_pos: Vec3<f32>) -> f32 {
        match self {
            Light::Directional { .. } => 1.0,
            Light::Point {
                position,
                attenuation: (c, l, q),
                ..
            }
            | Light::Spot {
                position,
                attenuation: (c, l, q),
                ..
            } => {
                let d = (*position - frag_pos).magnitude();
                1.0 / (c + l * d + q * d * d)
            }
        }
    }

    /// Spot cutoff factor in `[0, 1]`; `1.0` for point/directional lights.
    #[inline]
    pub fn cutoff(&self, light_dir: Vec3<f32>) -> f32 {
        match self {
            Light::Spot {
                direction,
                inner_cos,
                outer_cos,
                ..
            } => {
                let cos_theta = light_dir.dot(-direction.normalized());
                ((cos_theta - outer_cos) / (inner_cos - outer_cos)).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    pub fn set_position(&mut self, new_pos: Vec3<f32>) {
        match self {
            Light::Point { position, .. } | Light::Spot { position, .. } => *position = new_pos,
            Light::Directional { .. } => {
                log::warn!("set_position has no effect on a directional light");
            }
        }
    }

    pub fn set_direction(&mut self, new_dir: Vec3<f32>) {
        match self {
            Light::Directional { direction, .. } | Light::Spot { direction, .. } => {
                *direction = new_dir
            }
            Light::Point { .. } => {
                log::warn!("set_direction has no effect on a point light");
            }
        }
    }
}

/// An ordered set of lights, read-only during a draw call.
#[derive(Clone, Debug, Default)]
pub struct LightRegistry {
    lights: Vec<Light>,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light and return its index, mirroring
    /// `Renderer::addLightSource`'s integer-handle contract in
    /// `original_source/renderer/renderer.hpp`.
    pub fn add(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_has_unit_attenuation() {
        let l = Light::Directional {
            direction: Vec3::new(0.0, -1.0, 0.0),
            intensity: Rgb::new(1.0, 1.0, 1.0),
        };
        assert_eq!(l.attenuation(Vec3::zero()), 1.0);
        assert_eq!(l.cutoff(Vec3::unit_y()), 1.0);
    }

    #[test]
    fn point_light_attenuates_with_distance() {
        let l = Light::Point {
            position: Vec3::new(0.0, 0.0, 10.0),
            intensity: Rgb::new(1.0, 1.0, 1.0),
            attenuation: (1.0, 0.0, 0.01),
        };
        let near = l.attenuation(Vec3::new(0.0, 0.0, 9.0));
        let far = l.attenuation(Vec3::zero());
        assert!(near > far);
    }

    #[test]
    fn spot_cutoff_is_one_inside_inner_cone_zero_outside_outer() {
        let l = Light::Spot {
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
            intensity: Rgb::new(1.0, 1.0, 1.0),
            attenuation: (1.0, 0.0, 0.0),
            inner_cos: 0.95,
            outer_cos: 0.8,
        };
        let dir_to_light = Vec3::unit_z(); // fragment directly below the light, looking straight up
        assert_eq!(l.cutoff(dir_to_light), 1.0);
    }

    #[test]
    fn registry_add_returns_stable_index() {
        let mut reg = LightRegistry::new();
        let idx = reg.add(Light::Directional {
            direction: Vec3::unit_y(),
            intensity: Rgb::one(),
        });
        assert_eq!(idx, 0);
        assert!(reg.get(0).is_some());
    }
}
