//! Core retrieval building blocks: grid geometry, frozen regression models,
//! convex-hull tables, run parameters, and the per-pixel processing stages.
//! These are internal primitives consumed by the high-level `api` module.
pub mod grid;
pub mod hull;
pub mod model;
pub mod params;
pub mod processing;
