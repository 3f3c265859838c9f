//! Persistence for weather observations.
//!
//! The `(location, date)` pair is a lookup key, not a uniqueness constraint:
//! two racing resolutions of the same uncached day may both insert. Lookups
//! return the oldest row in that case.

use chrono::NaiveDate;

use crate::error::WeatherResult;
use crate::model::{NewObservation, ObservationPatch, WeatherObservation};

pub mod sqlite;

pub use sqlite::SqliteObservationStore;

/// Storage backend for observations. Performs no field validation.
pub trait ObservationStore: Send + Sync {
    /// Persist a new observation and return it with its assigned id.
    fn insert(&self, observation: NewObservation) -> WeatherResult<WeatherObservation>;

    fn find_by_location_and_date(
        &self,
        location: &str,
        date: NaiveDate,
    ) -> WeatherResult<Option<WeatherObservation>>;

    /// Observations in `[start, end]`, ordered by date then id.
    fn find_by_location_and_date_range(
        &self,
        location: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> WeatherResult<Vec<WeatherObservation>>;

    /// Overwrite only the supplied fields. `None` when `id` does not exist.
    fn update_fields(
        &self,
        id: i64,
        patch: &ObservationPatch,
    ) -> WeatherResult<Option<WeatherObservation>>;

    /// `false` when `id` does not exist.
    fn delete_by_id(&self, id: i64) -> WeatherResult<bool>;

    /// Every stored observation, ordered by id.
    fn list_all(&self) -> WeatherResult<Vec<WeatherObservation>>;
}
