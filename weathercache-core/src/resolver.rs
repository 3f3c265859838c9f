//! Date-range weather resolution.
//!
//! For every day in an inclusive range the resolver prefers a stored
//! observation, falls back to a single provider forecast fetched once per
//! call, persists what it fetched, and fills the rest with placeholders.
//! Stored days are never refreshed from the provider.

use chrono::{Days, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{WeatherError, WeatherResult};
use crate::model::{DaySource, NewObservation, ResolvedDay};
use crate::provider::ForecastProvider;
use crate::store::ObservationStore;

/// Check a requested range against `[today, today + horizon_days]`.
pub fn validate_range(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    horizon_days: u32,
) -> WeatherResult<()> {
    if start > end {
        return Err(WeatherError::InvalidRange { start, end });
    }

    let last = today
        .checked_add_days(Days::new(u64::from(horizon_days)))
        .unwrap_or(NaiveDate::MAX);

    for date in [start, end] {
        if date < today || date > last {
            return Err(WeatherError::OutOfHorizon { date, today, last });
        }
    }

    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct ResolveStats {
    cached: usize,
    fetched: usize,
    placeholders: usize,
}

pub struct RangeResolver {
    provider: Arc<dyn ForecastProvider>,
    store: Arc<dyn ObservationStore>,
    horizon_days: u32,
}

impl RangeResolver {
    pub fn new(
        provider: Arc<dyn ForecastProvider>,
        store: Arc<dyn ObservationStore>,
        horizon_days: u32,
    ) -> Self {
        Self { provider, store, horizon_days }
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    /// Resolve one row per day in `[start, end]`, ascending.
    ///
    /// The range is expected to have passed [`validate_range`]. The provider
    /// is queried exactly once, for today plus `horizon_days` days.
    pub async fn resolve(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<ResolvedDay>> {
        let payload = self
            .provider
            .fetch_forecast(location, self.horizon_days.saturating_add(1))
            .await?;

        if payload.is_empty() {
            return Err(WeatherError::LocationNotFound(location.to_string()));
        }

        let mut results = Vec::new();
        let mut stats = ResolveStats::default();

        for date in start.iter_days().take_while(|d| *d <= end) {
            if let Some(cached) = self.store.find_by_location_and_date(location, date)? {
                stats.cached += 1;
                results.push(ResolvedDay::from_observation(&cached, DaySource::Cached));
                continue;
            }

            match payload.get(&date) {
                Some(day) => {
                    let stored = self
                        .store
                        .insert(NewObservation::from_forecast(location, date, day))?;
                    stats.fetched += 1;
                    results.push(ResolvedDay::from_observation(&stored, DaySource::Fetched));
                }
                None => {
                    debug!(location, %date, "No forecast data for day");
                    stats.placeholders += 1;
                    results.push(ResolvedDay::placeholder(location, date));
                }
            }
        }

        info!(
            location,
            %start,
            %end,
            cached = stats.cached,
            fetched = stats.fetched,
            placeholders = stats.placeholders,
            "Resolved weather range"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DayForecast, ObservationPatch};
    use crate::store::SqliteObservationStore;
    use crate::testing::MockProvider;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn plus(days: u64) -> NaiveDate {
        today().checked_add_days(Days::new(days)).unwrap()
    }

    fn setup(provider: MockProvider) -> (RangeResolver, Arc<SqliteObservationStore>, MockProvider) {
        let store = Arc::new(SqliteObservationStore::in_memory().unwrap());
        let resolver = RangeResolver::new(Arc::new(provider.clone()), store.clone(), 5);
        (resolver, store, provider)
    }

    #[test]
    fn inverted_range_is_invalid() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let err = validate_range(start, end, start, 5).unwrap_err();
        assert!(matches!(err, WeatherError::InvalidRange { .. }));
    }

    #[test]
    fn horizon_window_is_inclusive() {
        assert!(validate_range(today(), plus(5), today(), 5).is_ok());
        assert!(validate_range(today(), today(), today(), 5).is_ok());

        let err = validate_range(today(), plus(6), today(), 5).unwrap_err();
        assert!(matches!(err, WeatherError::OutOfHorizon { date, .. } if date == plus(6)));

        let yesterday = today().pred_opt().unwrap();
        let err = validate_range(yesterday, today(), today(), 5).unwrap_err();
        assert_eq!(err.kind(), "out_of_horizon");
    }

    #[tokio::test]
    async fn fresh_range_is_fetched_and_persisted() {
        let (resolver, store, provider) = setup(MockProvider::with_days(today(), 5));

        let days = resolver.resolve("London", today(), plus(2)).await.unwrap();

        assert_eq!(days.len(), 3);
        assert_eq!(provider.call_count(), 1);
        for (i, day) in days.iter().enumerate() {
            assert_eq!(day.date, plus(i as u64));
            assert_eq!(day.source, DaySource::Fetched);
            assert_eq!(day.temperature, Some(20.0 + i as f64));
            assert!(day.id.is_some());
        }

        assert_eq!(store.count().unwrap(), 3);
        let stored = store.find_by_location_and_date("London", plus(1)).unwrap().unwrap();
        assert_eq!(stored.temperature, 21.0);
        assert_eq!(stored.humidity, Some(51));
    }

    #[tokio::test]
    async fn day_beyond_payload_is_placeholder_and_not_stored() {
        // provider only knows three days
        let (resolver, store, _) = setup(MockProvider::with_days(today(), 3));

        let days = resolver.resolve("London", today(), plus(3)).await.unwrap();

        assert_eq!(days.len(), 4);
        let last = &days[3];
        assert_eq!(last.date, plus(3));
        assert_eq!(last.source, DaySource::Placeholder);
        assert_eq!(last.temperature, None);
        assert_eq!(last.humidity, None);
        assert_eq!(last.wind_speed, None);
        assert_eq!(last.description.as_deref(), Some("No data"));

        assert_eq!(store.count().unwrap(), 3);
        assert!(store.find_by_location_and_date("London", plus(3)).unwrap().is_none());
    }

    #[tokio::test]
    async fn cached_days_win_over_provider() {
        let mut provider = MockProvider::with_days(today(), 5);
        let (resolver, store, _) = setup(provider.clone());

        resolver.resolve("London", today(), plus(1)).await.unwrap();
        let before = store.find_by_location_and_date("London", today()).unwrap().unwrap();

        // provider revises its forecast; the resolver must ignore it
        provider.payload.insert(
            today(),
            DayForecast {
                temperature: -5.0,
                description: Some("Snow".into()),
                humidity: Some(99),
                wind_speed: Some(80.0),
            },
        );
        let resolver = RangeResolver::new(Arc::new(provider.clone()), store.clone(), 5);

        let days = resolver.resolve("London", today(), plus(2)).await.unwrap();

        assert_eq!(days[0].source, DaySource::Cached);
        assert_eq!(days[0].temperature, Some(before.temperature));
        assert_eq!(days[1].source, DaySource::Cached);
        assert_eq!(days[2].source, DaySource::Fetched);

        let after = store.find_by_location_and_date("London", today()).unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn cached_values_reflect_manual_updates() {
        let (resolver, store, _) = setup(MockProvider::with_days(today(), 5));

        let first = resolver.resolve("Paris", today(), today()).await.unwrap();
        let id = first[0].id.unwrap();
        store
            .update_fields(id, &ObservationPatch { temperature: Some(33.3), ..Default::default() })
            .unwrap();

        let again = resolver.resolve("Paris", today(), today()).await.unwrap();
        assert_eq!(again[0].temperature, Some(33.3));
        assert_eq!(again[0].id, Some(id));
    }

    #[tokio::test]
    async fn provider_called_once_for_long_range() {
        let (resolver, _, provider) = setup(MockProvider::with_days(today(), 6));

        let days = resolver.resolve("Tokyo", today(), plus(5)).await.unwrap();

        assert_eq!(days.len(), 6);
        assert_eq!(provider.call_count(), 1);
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[tokio::test]
    async fn empty_payload_is_location_not_found() {
        let (resolver, store, _) = setup(MockProvider::default());

        let err = resolver.resolve("Atlantis", today(), plus(1)).await.unwrap_err();

        assert!(matches!(err, WeatherError::LocationNotFound(ref loc) if loc == "Atlantis"));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_failure_aborts_without_writes() {
        let (resolver, store, _) = setup(MockProvider::failing());

        let err = resolver.resolve("London", today(), plus(1)).await.unwrap_err();

        assert_eq!(err.kind(), "provider_unavailable");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn requests_today_plus_horizon_days() {
        let (resolver, _, provider) = setup(MockProvider::with_days(today(), 6));

        resolver.resolve("Lima", today(), today()).await.unwrap();

        assert_eq!(provider.last_days(), 6);
    }

    #[tokio::test]
    async fn huge_horizon_does_not_overflow_day_count() {
        let provider = MockProvider::with_days(today(), 3);
        let store = Arc::new(SqliteObservationStore::in_memory().unwrap());
        let resolver = RangeResolver::new(Arc::new(provider.clone()), store, u32::MAX);

        validate_range(today(), today(), today(), u32::MAX).unwrap();
        let days = resolver.resolve("London", today(), today()).await.unwrap();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].source, DaySource::Fetched);
        assert_eq!(provider.last_days(), u32::MAX);
    }

    #[tokio::test]
    async fn provider_is_queried_even_when_fully_cached() {
        let (resolver, _, provider) = setup(MockProvider::with_days(today(), 5));

        resolver.resolve("Lima", today(), plus(1)).await.unwrap();
        resolver.resolve("Lima", today(), plus(1)).await.unwrap();

        assert_eq!(provider.call_count(), 2);
    }
}
