//! Weather readings and coordinates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A point on Earth, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `"<lat>,<lon>"`, the form weather APIs take as a location query.
    pub fn query(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// Current conditions at a location.
///
/// Only the fields the fusion needs are typed; everything else the
/// upstream sends is kept in `extra` so a cached reading round-trips intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Temperature in Celsius, exactly as the upstream wrote it.
    pub temp_c: Number,
    pub condition: Condition,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Human-readable condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
