//! The host texture boundary: the virtual machine calls out through
//! [`TextureService`] for `texture`, `environment`, and `shadow` lookups.
//!
//! A service returning `None` leaves the result at its default of zero; a
//! service that fails internally is responsible for reporting through its
//! own channels before returning `None`.

use crate::math3d::Vec3;

/// Texture, environment, and shadow map lookups resolved by the host.
pub trait TextureService {
    /// Samples the named texture at `(s, t)`.
    fn texture(&mut self, name: &str, s: f32, t: f32) -> Option<Vec3>;

    /// Samples the named environment map in `direction`.
    fn environment(&mut self, name: &str, direction: Vec3) -> Option<Vec3>;

    /// Evaluates the named shadow map at `position` with depth `bias`,
    /// returning occlusion in `[0, 1]`.
    fn shadow(&mut self, name: &str, position: Vec3, bias: f32) -> Option<f32>;
}

/// A host with no textures loaded; every lookup misses.
#[derive(Debug, Default)]
pub struct NoTextures;

impl TextureService for NoTextures {
    fn texture(&mut self, _name: &str, _s: f32, _t: f32) -> Option<Vec3> {
        None
    }

    fn environment(&mut self, _name: &str, _direction: Vec3) -> Option<Vec3> {
        None
    }

    fn shadow(&mut self, _name: &str, _position: Vec3, _bias: f32) -> Option<f32> {
        None
    }
}
