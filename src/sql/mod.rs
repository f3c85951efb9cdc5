//! SQL helpers: identifiers from settings only, values always as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
