use chrono::NaiveDate;

/// Errors surfaced by the resolver, the record store and the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Start date {start} must not be after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Date {date} is outside the forecast window ({today} .. {last})")]
    OutOfHorizon {
        date: NaiveDate,
        today: NaiveDate,
        last: NaiveDate,
    },

    #[error("Location '{0}' not found or invalid")]
    LocationNotFound(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl WeatherError {
    /// Stable snake-case tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::InvalidRange { .. } => "invalid_range",
            WeatherError::OutOfHorizon { .. } => "out_of_horizon",
            WeatherError::LocationNotFound(_) => "location_not_found",
            WeatherError::ProviderUnavailable(_) => "provider_unavailable",
            WeatherError::RecordNotFound(_) => "record_not_found",
            WeatherError::ValidationFailed(_) => "validation_failed",
            WeatherError::Storage(_) => "storage",
            WeatherError::Export(_) => "export",
        }
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        WeatherError::ProviderUnavailable(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        WeatherError::ValidationFailed(msg.into())
    }
}

impl From<rusqlite::Error> for WeatherError {
    fn from(err: rusqlite::Error) -> Self {
        WeatherError::Storage(err.to_string())
    }
}

impl From<csv::Error> for WeatherError {
    fn from(err: csv::Error) -> Self {
        WeatherError::Export(err.to_string())
    }
}

pub type WeatherResult<T> = Result<T, WeatherError>;
