use crate::cli::RecordArgs;
use crate::commands::{Context, print_stats, report_advisories};
use crate::signals::{SignalEvent, wait_for_signal};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracker::clock::{Clock, SystemClock};
use tracker::geocode::{GeocodeCache, NominatimGeocoder};
use tracker::persistence::{
    NoopSnapshotStore, SnapshotStore, SqliteSnapshotStore, SqliteTripStore, TripRecord, TripStore,
};
use tracker::position::ReplaySource;
use tracker::session::{FinishedTrip, Recovery};
use tracker::{Services, SessionState, TripSession};

#[allow(clippy::print_stdout)]
pub(super) async fn record(ctx: &Context, args: RecordArgs) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let source = ReplaySource::from_path(&args.replay, clock.clone())?.with_speed(args.speed);
    let database = ctx.database().await?;
    let snapshots: Box<dyn SnapshotStore> = if ctx.config.persistence.snapshots {
        Box::new(SqliteSnapshotStore::new(&database))
    } else {
        Box::new(NoopSnapshotStore)
    };

    let mut session = TripSession::new(
        &ctx.config,
        Services {
            source: Box::new(source.clone()),
            snapshots,
            settings: ctx.settings_store(),
            clock: clock.clone(),
        },
    );

    match session.recover().await? {
        Recovery::Fresh => {}
        Recovery::Resumed { state, points } => {
            info!(%state, points, "continuing previous trip");
        }
        Recovery::Interrupted { last_seen, points } => {
            warn!(%last_seen, points, "previous trip was interrupted and has been discarded");
        }
    }
    if session.state() == SessionState::Idle {
        session.load_recording().await?;
        session.start().await?;
    }
    report_advisories(&mut session);

    let (signal_tx, signal_rx) = flume::bounded(8);
    let mut signals = tokio::spawn(async move { wait_for_signal(&signal_tx).await });
    let events = session.events();
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    while source.remaining() > 0 || session.state() == SessionState::Paused {
        tokio::select! {
            Ok(event) = events.recv_async() => {
                session.handle(event).await;
                report_advisories(&mut session);
            }
            signal = signal_rx.recv_async() => match signal {
                Ok(SignalEvent::TogglePause) if session.state() == SessionState::Paused => {
                    session.resume().await?;
                }
                Ok(SignalEvent::TogglePause) => session.pause().await?,
                Ok(SignalEvent::Stop) => break,
                Ok(SignalEvent::Terminate) => {
                    signals.abort();
                    session.mark_interrupted().await?;
                    info!("trip left unfinished");
                    return Ok(());
                }
                Err(_) => {
                    (&mut signals).await??;
                    break;
                }
            },
            _ = &mut deadline => {
                info!("recording time is up");
                break;
            }
        }
    }
    signals.abort();
    while let Ok(event) = events.try_recv() {
        session.handle(event).await;
    }
    debug!(remaining = source.remaining(), "recording loop finished");

    let finished = session.stop().await?;
    report_advisories(&mut session);
    print_stats(&finished.stats);
    if ctx.config.geocode.enabled {
        describe_endpoints(ctx, clock.clone(), &finished).await?;
    }

    match &args.name {
        Some(name) => {
            let record = TripRecord::new(name, &args.notes, &finished, clock.now())?;
            let id = SqliteTripStore::new(&database).insert(&record).await?;
            println!("saved as trip #{id}");
        }
        None => info!("no name given, trip not saved"),
    }
    session.reset()?;
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn describe_endpoints(
    ctx: &Context,
    clock: Arc<dyn Clock>,
    finished: &FinishedTrip,
) -> anyhow::Result<()> {
    let (Some(start), Some(end)) = (&finished.stats.start_point, &finished.stats.end_point) else {
        return Ok(());
    };

    let geocoder = NominatimGeocoder::new(&ctx.config.geocode)?;
    let mut cache = GeocodeCache::from_config(geocoder, clock.clone(), &ctx.config.geocode);
    let from = cache
        .address_or_placeholder(start.latitude, start.longitude)
        .await;
    clock.sleep(ctx.config.geocode.min_interval).await;
    let to = cache.address_or_placeholder(end.latitude, end.longitude).await;

    println!("from:       {from}");
    println!("to:         {to}");
    Ok(())
}
