use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{WeatherError, WeatherResult},
    model::{DayForecast, NO_DATA},
    provider::{ForecastPayload, MIN_SEARCH_LEN, format_place, http_client, truncate_body},
};

use super::ForecastProvider;

const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// WeatherAPI.com error code for "No matching location found."
const UNKNOWN_LOCATION_CODE: i64 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
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

    async fn get_body(&self, endpoint: &str, query: &[(&str, &str)]) -> WeatherResult<(reqwest::StatusCode, String)> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| {
                WeatherError::provider(format!("Failed to send request to WeatherAPI.com ({endpoint}): {e}"))
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            WeatherError::provider(format!("Failed to read WeatherAPI {endpoint} response body: {e}"))
        })?;

        Ok((status, body))
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    avgtemp_c: f64,
    avghumidity: Option<f64>,
    maxwind_kph: Option<f64>,
    condition: Option<WaCondition>,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    #[serde(default)]
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    forecast: Option<WaForecast>,
}

#[derive(Debug, Deserialize)]
struct WaErrorDetail {
    code: i64,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WaSearchResult {
    name: String,
    region: Option<String>,
}

impl WaForecastResponse {
    fn into_payload(self) -> ForecastPayload {
        let days = self.forecast.map(|f| f.forecastday).unwrap_or_default();

        days.into_iter()
            .map(|fd| {
                let description = fd
                    .day
                    .condition
                    .map(|c| c.text)
                    .unwrap_or_else(|| NO_DATA.to_string());
                let day = DayForecast {
                    temperature: fd.day.avgtemp_c,
                    description: Some(description),
                    humidity: fd.day.avghumidity.map(|h| h.round() as i64),
                    wind_speed: fd.day.maxwind_kph,
                };
                (fd.date, day)
            })
            .collect()
    }
}

fn is_unknown_location(body: &str) -> bool {
    serde_json::from_str::<WaErrorResponse>(body)
        .map(|e| e.error.code == UNKNOWN_LOCATION_CODE)
        .unwrap_or(false)
}

#[async_trait]
impl ForecastProvider for WeatherApiProvider {
    async fn fetch_forecast(&self, location: &str, days: u32) -> WeatherResult<ForecastPayload> {
        let days = days.to_string();
        let (status, body) = self
            .get_body("forecast.json", &[("q", location), ("days", days.as_str())])
            .await?;

        if !status.is_success() {
            if is_unknown_location(&body) {
                debug!(location, "WeatherAPI could not resolve location");
                return Ok(ForecastPayload::new());
            }
            return Err(WeatherError::provider(format!(
                "WeatherAPI forecast request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: WaForecastResponse = serde_json::from_str(&body).map_err(|e| {
            WeatherError::provider(format!("Failed to parse WeatherAPI forecast JSON: {e}"))
        })?;

        Ok(parsed.into_payload())
    }

    async fn search_locations(&self, query: &str) -> WeatherResult<Vec<String>> {
        if query.trim().chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }

        let (status, body) = self.get_body("search.json", &[("q", query)]).await?;

        if !status.is_success() {
            return Err(WeatherError::provider(format!(
                "WeatherAPI search request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let results: Vec<WaSearchResult> = serde_json::from_str(&body).map_err(|e| {
            WeatherError::provider(format!("Failed to parse WeatherAPI search JSON: {e}"))
        })?;

        Ok(results
            .iter()
            .map(|r| format_place(&r.name, r.region.as_deref()))
            .collect())
    }
}
