//! Core library for `weathercache`.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Forecast providers (WeatherAPI.com, OpenWeather)
//! - The SQLite observation store
//! - Date-range resolution with cache-first lookups
//! - CSV export and LLM-backed daily summaries
//!
//! It is used by `weathercache-cli`, which exposes it over HTTP and on the command line.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod store;
pub mod summary;

#[cfg(test)]
mod testing;

pub use config::{Config, ProviderConfig, SummaryConfig};
pub use error::{WeatherError, WeatherResult};
pub use model::{
    DayForecast, DaySource, NewObservation, ObservationPatch, ResolvedDay, SummaryInput,
    WeatherObservation, WeatherSummary,
};
pub use provider::{ForecastPayload, ForecastProvider, ProviderId};
pub use resolver::RangeResolver;
pub use service::WeatherService;
pub use store::{ObservationStore, SqliteObservationStore};
pub use summary::{AnthropicSummarizer, SummaryGenerator};
