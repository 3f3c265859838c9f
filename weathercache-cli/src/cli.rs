use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use weathercache_core::{
    Config, ObservationPatch, ProviderId, ResolvedDay, SummaryInput, WeatherObservation,
    WeatherService,
};

use crate::{app::build_service, server};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathercache", version, about = "Cached weather lookups over HTTP and the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "weatherapi" or "openweather".
        provider: String,
    },

    /// Run the HTTP API.
    Serve {
        /// Listen address; overrides the configured one.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Resolve weather for a location over an inclusive date range.
    Resolve {
        location: String,
        /// First day, YYYY-MM-DD.
        start: NaiveDate,
        /// Last day, YYYY-MM-DD.
        end: NaiveDate,
    },

    /// List every stored observation.
    List,

    /// Write all observations as CSV.
    Export {
        /// Output file; stdout when absent.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Change fields of a stored observation.
    Update {
        id: i64,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        humidity: Option<i64>,
        #[arg(long)]
        wind_speed: Option<f64>,
    },

    /// Delete a stored observation.
    Delete { id: i64 },

    /// Summarize a stored day with the language model.
    Summary { location: String, date: NaiveDate },

    /// Suggest location names.
    Search { query: String },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider)?,
            Command::Serve { bind } => {
                let config = Config::load_with_env()?;
                let service = build_service(&config)?;
                let bind = bind.unwrap_or_else(|| config.bind_addr().to_string());
                server::serve(service, &bind).await?;
            }
            Command::Resolve { location, start, end } => {
                let service = load_service()?;
                let today = chrono::Local::now().date_naive();
                let days = service.resolve_range(&location, start, end, today).await?;
                print_days(&days);
            }
            Command::List => {
                let service = load_service()?;
                print_observations(&service.list_all()?);
            }
            Command::Export { out } => {
                let csv = load_service()?.export_csv()?;
                match out {
                    Some(path) => {
                        std::fs::write(&path, csv)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Exported to {}", path.display());
                    }
                    None => print!("{csv}"),
                }
            }
            Command::Update { id, temperature, description, humidity, wind_speed } => {
                let patch = ObservationPatch { temperature, description, humidity, wind_speed };
                let updated = load_service()?.update_by_id(id, &patch)?;
                print_observations(&[updated]);
            }
            Command::Delete { id } => {
                load_service()?.delete(id)?;
                println!("Deleted record {id}");
            }
            Command::Summary { location, date } => {
                let service = load_service()?;
                let stored = service.find_range(&location, date, date)?;
                let obs = stored.first().ok_or_else(|| {
                    anyhow::anyhow!(
                        "No stored weather for {location} on {date}.\n\
                         Hint: run `weathercache resolve {location} {date} {date}` first."
                    )
                })?;

                match service.summarize_day(&SummaryInput::from(obs)).await {
                    Some(summary) => {
                        println!("{}", summary.summary);
                        if !summary.clothes.is_empty() {
                            println!("\nWhat to wear: {}", summary.clothes);
                        }
                        if !summary.precautions.is_empty() {
                            println!("Precautions:  {}", summary.precautions);
                        }
                    }
                    None => println!("Summary unavailable."),
                }
            }
            Command::Search { query } => {
                for name in load_service()?.search_locations(&query).await? {
                    println!("{name}");
                }
            }
        }

        Ok(())
    }
}

/// Config file plus environment, wired into a service.
fn load_service() -> anyhow::Result<WeatherService> {
    build_service(&Config::load_with_env()?)
}

/// Prompt for an API key and store it in the config file.
fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if config.default_provider.as_deref() != Some(id.as_str()) {
        let make_default = inquire::Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_days(days: &[ResolvedDay]) {
    println!(
        "{:<12} {:<20} {:>8} {:>6} {:>8}  {:<11} Description",
        "Date", "Location", "Temp°C", "Hum%", "Wind", "Source"
    );
    for d in days {
        println!(
            "{:<12} {:<20} {:>8} {:>6} {:>8}  {:<11} {}",
            d.date.to_string(),
            d.location,
            fmt_opt(d.temperature),
            fmt_opt(d.humidity),
            fmt_opt(d.wind_speed),
            format!("{:?}", d.source).to_lowercase(),
            d.description.as_deref().unwrap_or("-"),
        );
    }
}

fn print_observations(rows: &[WeatherObservation]) {
    println!(
        "{:>5} {:<12} {:<20} {:>8} {:>6} {:>8}  Description",
        "Id", "Date", "Location", "Temp°C", "Hum%", "Wind"
    );
    for o in rows {
        println!(
            "{:>5} {:<12} {:<20} {:>8} {:>6} {:>8}  {}",
            o.id,
            o.date.to_string(),
            o.location,
            o.temperature,
            fmt_opt(o.humidity),
            fmt_opt(o.wind_speed),
            o.description.as_deref().unwrap_or("-"),
        );
    }
}
