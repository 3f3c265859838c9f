use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    error::{WeatherError, WeatherResult},
    model::DayForecast,
    provider::{ForecastPayload, MIN_SEARCH_LEN, format_place, http_client, truncate_body},
};

use super::ForecastProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// m/s to km/h.
const MPS_TO_KPH: f64 = 3.6;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: Option<OwWind>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
    city: Option<OwCity>,
}

#[derive(Debug, Deserialize)]
struct OwGeoResult {
    name: String,
    state: Option<String>,
}

/// Running totals for one calendar day of 3-hour slots.
#[derive(Debug, Default)]
struct DayAccumulator {
    temp_sum: f64,
    slots: usize,
    humidity_sum: f64,
    humidity_slots: usize,
    max_wind_mps: Option<f64>,
    // (description, count), in first-seen order
    descriptions: Vec<(String, usize)>,
}

impl DayAccumulator {
    fn push(&mut self, entry: &OwForecastEntry) {
        self.temp_sum += entry.main.temp;
        self.slots += 1;

        if let Some(h) = entry.main.humidity {
            self.humidity_sum += h;
            self.humidity_slots += 1;
        }

        if let Some(wind) = &entry.wind {
            self.max_wind_mps = Some(self.max_wind_mps.map_or(wind.speed, |m| m.max(wind.speed)));
        }

        if let Some(w) = entry.weather.first() {
            match self.descriptions.iter_mut().find(|(d, _)| *d == w.description) {
                Some((_, count)) => *count += 1,
                None => self.descriptions.push((w.description.clone(), 1)),
            }
        }
    }

    fn finish(self) -> DayForecast {
        let mut description: Option<(String, usize)> = None;
        for (text, count) in self.descriptions {
            if description.as_ref().is_none_or(|(_, best)| count > *best) {
                description = Some((text, count));
            }
        }

        DayForecast {
            temperature: self.temp_sum / self.slots as f64,
            description: description.map(|(text, _)| text),
            humidity: (self.humidity_slots > 0)
                .then(|| (self.humidity_sum / self.humidity_slots as f64).round() as i64),
            wind_speed: self.max_wind_mps.map(|mps| mps * MPS_TO_KPH),
        }
    }
}

/// Collapse 3-hour entries into at most `days` per-day forecasts, keyed by
/// the calendar date at the forecast location.
fn aggregate_daily(entries: &[OwForecastEntry], utc_offset_secs: i32, days: u32) -> ForecastPayload {
    let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
    let mut by_date: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for entry in entries {
        let Some(date) = unix_to_utc(entry.dt).map(|dt| dt.with_timezone(&offset).date_naive()) else {
            continue;
        };
        by_date.entry(date).or_default().push(entry);
    }

    by_date
        .into_iter()
        .take(days as usize)
        .map(|(date, acc)| (date, acc.finish()))
        .collect()
}

#[async_trait]
impl ForecastProvider for OpenWeatherProvider {
    async fn fetch_forecast(&self, location: &str, days: u32) -> WeatherResult<ForecastPayload> {
        let url = format!("{}/data/2.5/forecast", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| {
                WeatherError::provider(format!("Failed to send request to OpenWeather (5-day forecast): {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::provider(format!("Failed to read OpenWeather forecast response body: {e}"))
        })?;

        if status == StatusCode::NOT_FOUND {
            debug!(location, "OpenWeather could not resolve location");
            return Ok(ForecastPayload::new());
        }

        if !status.is_success() {
            return Err(WeatherError::provider(format!(
                "OpenWeather forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OwForecastResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::provider(format!("Failed to parse OpenWeather forecast JSON: {e}"))
        })?;

        let utc_offset = parsed.city.as_ref().map_or(0, |c| c.timezone);
        Ok(aggregate_daily(&parsed.list, utc_offset, days))
    }

    async fn search_locations(&self, query: &str) -> WeatherResult<Vec<String>> {
        if query.trim().chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        let url = format!("{}/geo/1.0/direct", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("q", query), ("limit", "5"), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                WeatherError::provider(format!("Failed to send request to OpenWeather (geocoding): {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::provider(format!("Failed to read OpenWeather geocoding response body: {e}"))
        })?;

        if !status.is_success() {
            return Err(WeatherError::provider(format!(
                "OpenWeather geocoding request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let results: Vec<OwGeoResult> = serde_json::from_str(&body).map_err(|e| {
            WeatherError::provider(format!("Failed to parse OpenWeather geocoding JSON: {e}"))
        })?;

        Ok(results
            .iter()
            .map(|r| format_place(&r.name, r.state.as_deref()))
            .collect())
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}
