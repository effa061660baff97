//! Public types for the Astrofusion API.

mod fusion;
mod planet;
mod weather;

pub use fusion::{Clima, FusionResult, HistoryRecord};
pub use planet::Planet;
pub use weather::{Condition, Coordinates, WeatherReading};
