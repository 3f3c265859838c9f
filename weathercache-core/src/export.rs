use crate::error::{WeatherError, WeatherResult};
use crate::model::WeatherObservation;

pub const CSV_HEADER: [&str; 6] = [
    "Location",
    "Date",
    "Temperature(°C)",
    "Description",
    "Humidity(%)",
    "Wind Speed(kph)",
];

pub const CSV_FILENAME: &str = "weather_data.csv";

/// Serialize observations as CSV: header plus one row each, absent values as empty cells.
pub fn observations_to_csv(observations: &[WeatherObservation]) -> WeatherResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for obs in observations {
        writer.write_record([
            obs.location.clone(),
            obs.date.format("%Y-%m-%d").to_string(),
            decimal(obs.temperature),
            obs.description.clone().unwrap_or_default(),
            obs.humidity.map(|h| h.to_string()).unwrap_or_default(),
            obs.wind_speed.map(decimal).unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| WeatherError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| WeatherError::Export(e.to_string()))
}

/// Whole numbers keep one decimal place (`21.0`), others print in full.
fn decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
