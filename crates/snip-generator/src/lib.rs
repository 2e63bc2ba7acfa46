//! Short code generators.

pub mod random;
pub mod seq;

pub use random::RandomGenerator;
pub use seq::SeqGenerator;

use snip_core::ShortCode;
use std::sync::Arc;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage, so
/// a generated code may already be taken. The shortener service checks for
/// collisions and asks again.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}

impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn generate(&self) -> ShortCode {
        (**self).generate()
    }
}
