//! Core selection types, free of IO.

pub mod errors;
pub mod model;
