//! The bundled host class library.
//!
//! Scripts reach these classes through reflection by their dotted names:
//! `math.Tuple`, `math.Vector2`, `text.StringBuilder` and `util.Counter`.

use flint_runtime::HostRegistry;

pub mod math;
pub mod text;
pub mod util;

/// A registry holding every class in the library.
pub fn host_registry() -> HostRegistry {
    let mut registry = HostRegistry::new();
    math::register(&mut registry);
    text::register(&mut registry);
    util::register(&mut registry);
    registry
}
