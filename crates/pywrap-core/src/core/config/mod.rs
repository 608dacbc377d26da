//! Wrapper configuration, captured once from the process environment.

pub mod settings;

pub use settings::*;
