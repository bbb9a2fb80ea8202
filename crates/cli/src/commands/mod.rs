mod record;
mod settings;
mod stats;
mod trips;

use crate::cli::{Cli, Command};
use config::Config;
use std::path::PathBuf;
use tracing::{error, warn};
use tracker::geodesy::{format_distance, format_duration, format_speed};
use tracker::persistence::{Database, MemorySettingsStore, SettingsStore, TomlSettingsStore};
use tracker::{PersistenceError, TripSession, TripStats};

/// Resolved configuration shared by all subcommands.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub conffile: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

impl Context {
    pub fn new(cli: &Cli) -> Result<Self, config::Error> {
        let config = match &cli.conffile {
            Some(path) => Config::load(path)?,
            None => Config::new(),
        };
        let database = cli
            .database
            .clone()
            .or_else(|| config.persistence.database_path.clone());

        Ok(Self {
            config,
            conffile: cli.conffile.clone(),
            database,
        })
    }

    pub async fn database(&self) -> Result<Database, PersistenceError> {
        match &self.database {
            Some(path) => Database::open(path).await,
            None => {
                warn!("no database configured, trips will not be kept");
                Database::in_memory().await
            }
        }
    }

    pub fn settings_store(&self) -> Box<dyn SettingsStore> {
        match &self.conffile {
            Some(path) => Box::new(TomlSettingsStore::new(path)),
            None => Box::new(MemorySettingsStore::new(self.config.recording)),
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::new(&cli)?;
    match cli.command {
        Command::Record(args) => record::record(&ctx, args).await,
        Command::Trips(command) => trips::trips(&ctx, command).await,
        Command::Settings(command) => settings::settings(&ctx, command).await,
        Command::Stats(args) => stats::stats(&ctx, args),
    }
}

fn report_advisories(session: &mut TripSession) {
    for advisory in session.take_advisories() {
        if advisory.is_fatal() {
            error!(%advisory, "trip continues without position updates");
        } else {
            warn!(%advisory);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_stats(stats: &TripStats) {
    println!("points:     {}", stats.point_count);
    println!("distance:   {}", format_distance(stats.total_distance_meters));
    println!("duration:   {}", format_duration(stats.duration_seconds as u64));
    println!("avg speed:  {}", format_speed(stats.average_speed_kmh));
    println!("max speed:  {}", format_speed(stats.max_speed_kmh));
    if stats.elevation_gain_meters > 0.0 || stats.elevation_loss_meters > 0.0 {
        println!(
            "elevation:  +{} / -{}",
            format_distance(stats.elevation_gain_meters),
            format_distance(stats.elevation_loss_meters)
        );
    }
}
