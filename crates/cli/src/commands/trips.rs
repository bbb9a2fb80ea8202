use crate::cli::TripsCommand;
use crate::commands::Context;
use chrono::Utc;
use tracker::geodesy::{format_distance, format_duration, format_speed};
use tracker::persistence::{SqliteTripStore, TripStore, TripUpdate};
use tracing::info;

pub(super) async fn trips(ctx: &Context, command: TripsCommand) -> anyhow::Result<()> {
    let database = ctx.database().await?;
    let store = SqliteTripStore::new(&database);

    let (id, update) = match command {
        TripsCommand::List => return list(&store).await,
        TripsCommand::Rename { id, name } => (
            id,
            TripUpdate {
                name: Some(name),
                ..TripUpdate::default()
            },
        ),
        TripsCommand::Notes { id, notes } => (
            id,
            TripUpdate {
                notes: Some(notes),
                ..TripUpdate::default()
            },
        ),
        TripsCommand::Favorite { id, off } => (
            id,
            TripUpdate {
                is_favorite: Some(!off),
                ..TripUpdate::default()
            },
        ),
    };

    store.update(id, &update, Utc::now()).await?;
    info!(id, "trip updated");
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn list(store: &SqliteTripStore) -> anyhow::Result<()> {
    let trips = store.list().await?;
    if trips.is_empty() {
        println!("no trips yet");
        return Ok(());
    }

    for trip in trips {
        let marker = if trip.is_favorite { "*" } else { " " };
        println!(
            "{marker} #{:<4} {}  {:<24} {:>9} {:>12} {:>11}",
            trip.id.unwrap_or_default(),
            trip.start_time.format("%Y-%m-%d %H:%M"),
            trip.name,
            format_distance(trip.distance_meters),
            format_duration(trip.duration_seconds as u64),
            format_speed(trip.average_speed_kmh),
        );
        if !trip.notes.is_empty() {
            println!("         {}", trip.notes);
        }
    }
    Ok(())
}
