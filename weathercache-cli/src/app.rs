use anyhow::Context;
use std::sync::Arc;
use weathercache_core::{
    AnthropicSummarizer, Config, SqliteObservationStore, WeatherService,
    provider::default_provider_from_config,
};

/// Wire the provider, store and optional summarizer described by `config`.
pub fn build_service(config: &Config) -> anyhow::Result<WeatherService> {
    let provider = default_provider_from_config(config)?;

    let db_path = config.database_file_path()?;
    let store = SqliteObservationStore::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "Opened observation store");

    let mut service = WeatherService::new(provider, Arc::new(store), config.horizon_days());

    match &config.summary {
        Some(summary) => {
            service = service.with_summarizer(Arc::new(AnthropicSummarizer::new(summary)));
        }
        None => tracing::info!("No summary API key configured; summaries disabled"),
    }

    Ok(service)
}
