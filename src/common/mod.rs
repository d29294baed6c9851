//! Common module - shared traits and utilities

pub mod traits;
pub mod utils;

pub use traits::RegistryApi;
pub use utils::{Timer, ValidationUtils};
