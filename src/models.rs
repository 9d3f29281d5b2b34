use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PollenError;

// ============================================================================
// Pollen.com Forecast Models
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Forecast {
    #[serde(rename = "Type", deserialize_with = "null_as_default")]
    pub report_type: String,
    #[serde(rename = "ForecastDate", deserialize_with = "null_as_default")]
    pub issued_at: String,
    #[serde(rename = "Location", deserialize_with = "null_as_default")]
    pub location: ForecastLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastLocation {
    #[serde(rename = "ZIP", deserialize_with = "null_as_default")]
    pub zip: String,
    #[serde(rename = "City", deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(rename = "State", deserialize_with = "null_as_default")]
    pub state: String,
    /// Yesterday, today and tomorrow, in that order.
    #[serde(deserialize_with = "null_as_default")]
    pub periods: Vec<ForecastPeriod>,
    #[serde(rename = "DisplayLocation", deserialize_with = "null_as_default")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastPeriod {
    /// "Yesterday", "Today" or "Tomorrow"
    #[serde(rename = "Type", deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "Period", deserialize_with = "null_as_default")]
    pub period: String,
    #[serde(rename = "Index", deserialize_with = "null_as_default")]
    pub index: f64,
    #[serde(rename = "Triggers", deserialize_with = "null_as_default")]
    pub triggers: Vec<ForecastIndexEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForecastIndexEntry {
    #[serde(rename = "Name", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Genus", deserialize_with = "null_as_default")]
    pub genus: String,
    #[serde(rename = "PlantType", deserialize_with = "null_as_default")]
    pub plant_type: String,
    #[serde(rename = "LGID", deserialize_with = "null_as_default")]
    pub source_id: i64,
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Position of today's period in `ForecastLocation::periods`
pub const TODAY: usize = 1;

impl Forecast {
    /// Decodes a forecast body, falling back to an empty forecast when the
    /// body is not valid JSON. Unknown fields are ignored and missing or
    /// `null` ones take their zero value.
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(forecast) => forecast,
            Err(e) => {
                tracing::warn!("Failed to decode forecast body, using empty forecast: {}", e);
                Self::default()
            }
        }
    }

    /// Today's period. Short forecasts are rejected instead of indexed.
    pub fn today(&self) -> Result<&ForecastPeriod, PollenError> {
        self.location
            .periods
            .get(TODAY)
            .ok_or_else(|| PollenError::MalformedForecast {
                periods: self.location.periods.len(),
            })
    }
}

impl ForecastPeriod {
    /// Trigger names in the order the forecast lists them.
    pub fn trigger_names(&self) -> Vec<&str> {
        self.triggers.iter().map(|t| t.name.as_str()).collect()
    }
}
