//! Test doubles shared by unit tests across modules.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicUsize, Ordering},
};

use crate::error::{WeatherError, WeatherResult};
use crate::model::DayForecast;
use crate::provider::{ForecastPayload, ForecastProvider};

/// Provider returning a canned payload and counting calls.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    pub payload: ForecastPayload,
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
    pub last_days: Arc<AtomicU32>,
}

impl MockProvider {
    /// `days` consecutive days from `first`, temperatures 20.0, 21.0, ...
    pub fn with_days(first: NaiveDate, days: u64) -> Self {
        let payload = (0..days)
            .map(|i| {
                let date = first.checked_add_days(Days::new(i)).expect("date in range");
                (date, forecast_for(i as f64))
            })
            .collect();
        Self { payload, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `days` argument of the most recent forecast call.
    pub fn last_days(&self) -> u32 {
        self.last_days.load(Ordering::SeqCst)
    }
}

pub fn forecast_for(offset: f64) -> DayForecast {
    DayForecast {
        temperature: 20.0 + offset,
        description: Some("Sunny".to_string()),
        humidity: Some(50 + offset as i64),
        wind_speed: Some(10.0 + offset),
    }
}

#[async_trait]
impl ForecastProvider for MockProvider {
    async fn fetch_forecast(&self, _location: &str, days: u32) -> WeatherResult<ForecastPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_days.store(days, Ordering::SeqCst);
        if self.fail {
            return Err(WeatherError::provider("connection refused"));
        }
        Ok(self.payload.clone())
    }

    async fn search_locations(&self, query: &str) -> WeatherResult<Vec<String>> {
        if self.fail {
            return Err(WeatherError::provider("connection refused"));
        }
        Ok(vec![format!("{query}, Somewhere")])
    }
}
