//! Caller-facing operations: validation in front of the resolver and store.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

use crate::error::{WeatherError, WeatherResult};
use crate::export::observations_to_csv;
use crate::model::{ObservationPatch, ResolvedDay, SummaryInput, WeatherObservation, WeatherSummary};
use crate::provider::ForecastProvider;
use crate::resolver::{RangeResolver, validate_range};
use crate::store::ObservationStore;
use crate::summary::SummaryGenerator;

pub struct WeatherService {
    resolver: RangeResolver,
    provider: Arc<dyn ForecastProvider>,
    store: Arc<dyn ObservationStore>,
    summarizer: Option<Arc<dyn SummaryGenerator>>,
}

impl WeatherService {
    pub fn new(
        provider: Arc<dyn ForecastProvider>,
        store: Arc<dyn ObservationStore>,
        horizon_days: u32,
    ) -> Self {
        Self {
            resolver: RangeResolver::new(provider.clone(), store.clone(), horizon_days),
            provider,
            store,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn SummaryGenerator>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Validate the request against `today` and resolve it day by day.
    pub async fn resolve_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> WeatherResult<Vec<ResolvedDay>> {
        let location = normalize_location(location)?;
        validate_range(start, end, today, self.resolver.horizon_days())?;
        self.resolver.resolve(location, start, end).await
    }

    pub fn list_all(&self) -> WeatherResult<Vec<WeatherObservation>> {
        self.store.list_all()
    }

    pub fn find_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherObservation>> {
        if start > end {
            return Err(WeatherError::InvalidRange { start, end });
        }
        let location = normalize_location(location)?;
        self.store.find_by_location_and_date_range(location, start, end)
    }

    pub fn export_csv(&self) -> WeatherResult<String> {
        observations_to_csv(&self.store.list_all()?)
    }

    pub fn update_by_id(&self, id: i64, patch: &ObservationPatch) -> WeatherResult<WeatherObservation> {
        patch.validate()?;
        self.store
            .update_fields(id, patch)?
            .ok_or_else(|| WeatherError::RecordNotFound(format!("id {id}")))
    }

    /// Update the record stored for `(location, date)`.
    pub fn update_by_location_and_date(
        &self,
        location: &str,
        date: NaiveDate,
        patch: &ObservationPatch,
    ) -> WeatherResult<WeatherObservation> {
        patch.validate()?;
        let location = normalize_location(location)?;
        let existing = self
            .store
            .find_by_location_and_date(location, date)?
            .ok_or_else(|| WeatherError::RecordNotFound(format!("{location} on {date}")))?;

        self.store
            .update_fields(existing.id, patch)?
            .ok_or_else(|| WeatherError::RecordNotFound(format!("id {}", existing.id)))
    }

    pub fn delete(&self, id: i64) -> WeatherResult<()> {
        if self.store.delete_by_id(id)? {
            Ok(())
        } else {
            Err(WeatherError::RecordNotFound(format!("id {id}")))
        }
    }

    /// Summarize one day. Failures are logged and yield `None`.
    pub async fn summarize_day(&self, input: &SummaryInput) -> Option<WeatherSummary> {
        let summarizer = self.summarizer.as_ref()?;
        match summarizer.summarize(input).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(location = %input.location, date = %input.date, "Summary generation failed: {e}");
                None
            }
        }
    }

    pub async fn search_locations(&self, query: &str) -> WeatherResult<Vec<String>> {
        self.provider.search_locations(query).await
    }
}

/// Locations are stored trimmed, so every lookup trims the same way.
fn normalize_location(location: &str) -> WeatherResult<&str> {
    let location = location.trim();
    if location.is_empty() {
        return Err(WeatherError::validation("location must not be empty"));
    }
    Ok(location)
}
