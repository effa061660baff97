//! The fusion step: weather at a sampled coordinate plus a named planet.

mod coordinates;
mod engine;

pub use coordinates::{CANDIDATE_COORDINATES, CoordinateSelector, FixedSelector, RandomSelector};
pub use engine::{FusionEngine, FusionOutcome, planet_cache_key, weather_cache_key};
