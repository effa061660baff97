//! Fusion result and history record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

use super::{Coordinates, Planet, WeatherReading};

/// Planet attributes merged with the weather at a coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub planeta: String,
    pub poblacion: String,
    pub terreno: String,
    pub coordenadas: Coordinates,
    pub clima: Clima,
}

/// Weather portion of a fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clima {
    pub temp_c: Number,
    pub condition: String,
    pub icon: String,
}

impl FusionResult {
    /// Merge a planet and a weather reading taken at `coordinates`.
    pub fn merge(planet: &Planet, weather: &WeatherReading, coordinates: Coordinates) -> Self {
        Self {
            planeta: planet.name.clone(),
            poblacion: planet.population.clone(),
            terreno: planet.terrain.clone(),
            coordenadas: coordinates,
            clima: Clima {
                temp_c: weather.temp_c.clone(),
                condition: weather.condition.text.clone(),
                icon: weather.condition.icon.clone(),
            },
        }
    }
}

/// Immutable log entry for one successful fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub fecha: DateTime<Utc>,
    pub planeta: String,
    pub fusion: FusionResult,
}
