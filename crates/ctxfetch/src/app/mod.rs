//! Application layer: the selection store, rendering, and their wiring.

pub mod listeners;
pub mod render;
pub mod scan;
pub mod selection;
pub mod session;
