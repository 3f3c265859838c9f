use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{WeatherError, WeatherResult};

/// Description used for days that neither the store nor the provider can fill.
pub const NO_DATA: &str = "No data";

/// A persisted per-location, per-day weather record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub id: i64,
    pub location: String,
    pub date: NaiveDate,
    /// Degrees Celsius.
    pub temperature: f64,
    pub description: Option<String>,
    /// Percent.
    pub humidity: Option<i64>,
    /// Kilometres per hour.
    pub wind_speed: Option<f64>,
}

/// An observation that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    pub location: String,
    pub date: NaiveDate,
    pub temperature: f64,
    pub description: Option<String>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
}

impl NewObservation {
    pub fn from_forecast(location: &str, date: NaiveDate, day: &DayForecast) -> Self {
        Self {
            location: location.to_string(),
            date,
            temperature: day.temperature,
            description: day.description.clone(),
            humidity: day.humidity,
            wind_speed: day.wind_speed,
        }
    }
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationPatch {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub humidity: Option<i64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
}

impl ObservationPatch {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.description.is_none()
            && self.humidity.is_none()
            && self.wind_speed.is_none()
    }

    /// Range checks applied at the boundary before a patch reaches the store.
    pub fn validate(&self) -> WeatherResult<()> {
        if self.is_empty() {
            return Err(WeatherError::validation("no fields to update"));
        }
        if let Some(t) = self.temperature {
            if !(-100.0..=100.0).contains(&t) {
                return Err(WeatherError::validation(format!(
                    "temperature must be between -100 and 100, got {t}"
                )));
            }
        }
        if let Some(h) = self.humidity {
            if !(0..=100).contains(&h) {
                return Err(WeatherError::validation(format!(
                    "humidity must be between 0 and 100, got {h}"
                )));
            }
        }
        if let Some(w) = self.wind_speed {
            if w.is_nan() || w < 0.0 {
                return Err(WeatherError::validation(format!(
                    "wind_speed must be non-negative, got {w}"
                )));
            }
        }
        Ok(())
    }

    /// Apply the patch onto an existing observation.
    pub fn apply_to(&self, obs: &mut WeatherObservation) {
        if let Some(t) = self.temperature {
            obs.temperature = t;
        }
        if let Some(d) = &self.description {
            obs.description = Some(d.clone());
        }
        if let Some(h) = self.humidity {
            obs.humidity = Some(h);
        }
        if let Some(w) = self.wind_speed {
            obs.wind_speed = Some(w);
        }
    }
}

/// One day of provider forecast data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayForecast {
    pub temperature: f64,
    pub description: Option<String>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaySource {
    Cached,
    Fetched,
    Placeholder,
}

/// One row of a range resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDay {
    pub id: Option<i64>,
    pub location: String,
    pub date: NaiveDate,
    pub temperature: Option<f64>,
    pub description: Option<String>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
    pub source: DaySource,
}

impl ResolvedDay {
    pub fn from_observation(obs: &WeatherObservation, source: DaySource) -> Self {
        Self {
            id: Some(obs.id),
            location: obs.location.clone(),
            date: obs.date,
            temperature: Some(obs.temperature),
            description: obs.description.clone(),
            humidity: obs.humidity,
            wind_speed: obs.wind_speed,
            source,
        }
    }

    pub fn placeholder(location: &str, date: NaiveDate) -> Self {
        Self {
            id: None,
            location: location.to_string(),
            date,
            temperature: None,
            description: Some(NO_DATA.to_string()),
            humidity: None,
            wind_speed: None,
            source: DaySource::Placeholder,
        }
    }
}

/// Input to the summary generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub location: String,
    pub date: NaiveDate,
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
}

impl From<&WeatherObservation> for SummaryInput {
    fn from(obs: &WeatherObservation) -> Self {
        Self {
            location: obs.location.clone(),
            date: obs.date,
            temperature: Some(obs.temperature),
            humidity: obs.humidity,
            wind_speed: obs.wind_speed,
            description: obs.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub summary: String,
    #[serde(default)]
    pub clothes: String,
    #[serde(default)]
    pub precautions: String,
}
