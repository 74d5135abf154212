//! Resampler backends
//!
//! - [`RubatoBackend`]: polynomial interpolation via rubato (default)
//! - [`LinearBackend`]: deterministic linear interpolation

pub mod linear;
pub mod rubato;

pub use self::linear::LinearBackend;
pub use self::rubato::RubatoBackend;
