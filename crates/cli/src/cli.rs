use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use config::{RecordingConfig, RecordingMode};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// trip-recorder: record GPS trips from the command line
///
/// Replays a file of position fixes through the trip engine, keeps the
/// finished trips in a local database and reports their statistics.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// Recording settings changed with `settings set` are written here.
    #[arg(short, long, global = true)]
    pub conffile: Option<PathBuf>,

    /// SQLite database holding trips and the in-progress session.
    ///
    /// Overrides `persistence.database_path`. Without either, nothing
    /// outlives the process.
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Record a trip by replaying a CSV file of fixes.
    ///
    /// SIGUSR1 toggles pause and SIGINT stops the trip. SIGTERM exits
    /// without finishing it.
    Record(RecordArgs),

    /// List and edit stored trips.
    #[command(subcommand)]
    Trips(TripsCommand),

    /// Show or change the recording settings.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Print statistics for a CSV file of fixes.
    Stats(StatsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RecordArgs {
    /// CSV file with `latitude,longitude,timestamp[,elevation]` rows.
    #[arg(long, value_parser = validate_file)]
    pub replay: PathBuf,

    /// Playback speed multiplier.
    #[arg(long, default_value_t = 1.0, value_parser = validate_speed)]
    pub speed: f64,

    /// Save the finished trip under this name.
    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(long, default_value = "")]
    pub notes: String,

    /// Stop the trip after this many seconds.
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum TripsCommand {
    /// List stored trips, newest first.
    List,

    Rename { id: i64, name: String },

    Notes { id: i64, notes: String },

    /// Mark a trip as favorite.
    Favorite {
        id: i64,

        /// Clear the mark instead.
        #[arg(long)]
        off: bool,
    },
}

#[derive(Debug, Subcommand, Clone)]
pub enum SettingsCommand {
    Show,

    /// Change the recording settings and write them to the config file.
    Set(RecordingArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct RecordingArgs {
    /// `time` or `distance`.
    #[arg(long, value_parser = validate_mode)]
    pub mode: Option<RecordingMode>,

    /// Seconds between recorded points in time mode.
    #[arg(long)]
    pub interval: Option<u64>,

    /// Meters between recorded points in distance mode.
    #[arg(long)]
    pub min_distance: Option<f64>,
}

impl RecordingArgs {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.interval.is_none() && self.min_distance.is_none()
    }

    /// `base` with the given fields replaced.
    pub fn apply(&self, base: RecordingConfig) -> RecordingConfig {
        RecordingConfig {
            mode: self.mode.unwrap_or(base.mode),
            interval: self.interval.map_or(base.interval, Duration::from_secs),
            min_distance_meters: self.min_distance.unwrap_or(base.min_distance_meters),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct StatsArgs {
    #[arg(value_parser = validate_file)]
    pub file: PathBuf,

    /// Apply the recording policy before computing statistics.
    #[arg(long)]
    pub thin: bool,

    #[command(flatten)]
    pub recording: RecordingArgs,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

#[inline(always)]
fn validate_speed(speed: &str) -> Result<f64, String> {
    let speed: f64 = speed
        .parse()
        .map_err(|_| format!("`{speed}` is not a valid speed"))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err("Speed must be a positive number".to_string())
    }
}

#[inline(always)]
fn validate_mode(mode: &str) -> Result<RecordingMode, String> {
    mode.parse().map_err(|err: config::Error| err.to_string())
}
