//! The execution context handed to the virtual machine: the seeded random
//! number generator behind `random()`, the host texture service, and the
//! error policy for runtime host failures.

use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};

use crate::{error::ErrorPolicy, texture::TextureService};

/// Renderer-provided state for one shader execution.
///
/// The generator is seeded explicitly rather than drawn from process
/// state, so runs are reproducible.
pub struct ShadingContext<'a> {
    pub(crate) rng: ChaCha8Rng,
    pub(crate) textures: &'a mut dyn TextureService,
    pub(crate) errors: &'a mut dyn ErrorPolicy,
}

impl<'a> ShadingContext<'a> {
    #[must_use]
    pub fn new(seed: u64, textures: &'a mut dyn TextureService, errors: &'a mut dyn ErrorPolicy) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            textures,
            errors,
        }
    }
}
