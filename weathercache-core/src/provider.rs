use crate::{
    Config,
    error::WeatherResult,
    model::DayForecast,
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::{collections::BTreeMap, convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;
pub mod weatherapi;

/// Forecast days keyed by calendar date. Empty means the location did not resolve.
pub type ForecastPayload = BTreeMap<NaiveDate, DayForecast>;

/// Queries shorter than this return no suggestions.
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    WeatherApi,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::WeatherApi => "weatherapi",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::WeatherApi, ProviderId::OpenWeather]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weatherapi" => Ok(ProviderId::WeatherApi),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: weatherapi, openweather."
            )),
        }
    }
}

/// An external multi-day forecast source.
#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// Fetch up to `days` days of forecast for `location`, starting today.
    ///
    /// Returns an empty payload when the provider cannot resolve the location;
    /// transport, status and parse failures are `ProviderUnavailable`.
    async fn fetch_forecast(&self, location: &str, days: u32) -> WeatherResult<ForecastPayload>;

    /// Location name suggestions for autocomplete.
    async fn search_locations(&self, query: &str) -> WeatherResult<Vec<String>>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn ForecastProvider>> {
    let provider_cfg = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weathercache configure {id}` and enter your API key."
        )
    })?;

    let api_key = provider_cfg.api_key.clone();
    let base_url = provider_cfg.base_url.as_deref();

    let provider: Arc<dyn ForecastProvider> = match id {
        ProviderId::WeatherApi => Arc::new(match base_url {
            Some(url) => WeatherApiProvider::with_base_url(api_key, url),
            None => WeatherApiProvider::new(api_key),
        }),
        ProviderId::OpenWeather => Arc::new(match base_url {
            Some(url) => OpenWeatherProvider::with_base_url(api_key, url),
            None => OpenWeatherProvider::new(api_key),
        }),
    };

    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn ForecastProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn http_client() -> reqwest::Client {
    http_client_with_timeout(HTTP_TIMEOUT)
}

fn http_client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client, falling back to defaults without a timeout: {e}");
            reqwest::Client::new()
        })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// "Name, Region", or just "Name" when the region is blank.
pub(crate) fn format_place(name: &str, region: Option<&str>) -> String {
    match region.map(str::trim).filter(|r| !r.is_empty()) {
        Some(region) => format!("{name}, {region}"),
        None => name.to_string(),
    }
}
