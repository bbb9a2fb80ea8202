mod common;

use common::{BrokenSnapshotStore, Harness, at, drain, north, t0};
use config::{Config, RecordingConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tracker::clock::Clock;
use tracker::persistence::SettingsStore;
use tracker::session::{Advisory, Recovery};
use tracker::{Error, GeoFix, PositionError, SessionState, TripSession};

/// Move the clock to the fix time and deliver the fix through the open
/// subscription.
async fn feed(h: &Harness, session: &mut TripSession, fix: GeoFix) {
    h.clock.set(fix.timestamp);
    h.source.emit(fix);
    drain(session).await;
}

#[tokio::test]
async fn start_gives_up_after_three_unavailable_fixes() {
    let h = Harness::new();
    let mut session = h.session();

    let err = session.start().await.unwrap_err();

    assert!(matches!(err, Error::Position(PositionError::Unavailable)));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.route().is_empty());
    assert_eq!(h.source.fix_requests(), 3);
    assert_eq!(h.source.watch_requests(), 0);
    // Two backoffs between three attempts.
    assert_eq!(h.clock.now(), at(2));
    assert!(h.snapshots.get().is_none());
}

#[tokio::test]
async fn start_retries_transient_errors() {
    let h = Harness::new();
    h.source.push_error(PositionError::Timeout);
    h.source.push_error(PositionError::Unavailable);
    h.source.push_fix(north(0.0, 0));
    let mut session = h.session();

    session.start().await.unwrap();

    assert_eq!(session.state(), SessionState::Tracking);
    assert_eq!(session.route().len(), 1);
    assert_eq!(h.source.fix_requests(), 3);
    assert!(session.is_watching());
    assert!(h.snapshots.get().is_some());
}

#[tokio::test]
async fn permission_denied_aborts_start_immediately() {
    let h = Harness::new();
    h.source.push_error(PositionError::PermissionDenied);
    h.source.push_fix(north(0.0, 0));
    let mut session = h.session();

    let err = session.start().await.unwrap_err();

    assert!(matches!(err, Error::Position(PositionError::PermissionDenied)));
    assert_eq!(h.source.fix_requests(), 1);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn failed_subscription_leaves_session_idle() {
    let h = Harness::new();
    h.source.push_fix(north(0.0, 0));
    h.source.fail_next_watch(PositionError::Unsupported);
    let mut session = h.session();

    assert!(session.start().await.is_err());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.route().is_empty());
}

#[tokio::test]
async fn time_mode_records_every_interval() {
    let h = Harness::new();
    let mut session = h.started().await;

    for secs in [10, 20, 30, 45, 50] {
        feed(&h, &mut session, north(secs as f64, secs)).await;
    }

    let recorded: Vec<_> = session.route().iter().map(|p| p.timestamp).collect();
    assert_eq!(recorded, vec![at(0), at(20), at(45)]);
    assert_eq!(session.current_fix().map(|f| f.timestamp), Some(at(50)));
}

#[tokio::test]
async fn distance_mode_records_only_after_threshold() {
    let mut config = Config::default();
    config.recording = RecordingConfig::distance(100.0);
    let h = Harness::with_config(config);
    let mut session = h.started().await;

    feed(&h, &mut session, north(150.0, 10)).await;
    feed(&h, &mut session, north(200.0, 20)).await;
    feed(&h, &mut session, north(310.0, 30)).await;

    assert_eq!(session.route().len(), 3);
    let last = session.route().last().unwrap();
    assert_eq!(last.timestamp, at(30));

    let view = session.view();
    assert_eq!(view.borrow().route_len, 3);
    assert_eq!(view.borrow().state, SessionState::Tracking);
}

#[tokio::test]
async fn distance_trip_keeps_every_leg_past_threshold() {
    let mut config = Config::default();
    config.recording = RecordingConfig::distance(100.0);
    let h = Harness::with_config(config);
    let mut session = h.started().await;

    feed(&h, &mut session, north(0.0, 10)).await;
    feed(&h, &mut session, north(150.0, 20)).await;
    feed(&h, &mut session, north(310.0, 30)).await;

    let finished = session.stop().await.unwrap();
    let offsets: Vec<_> = finished.route.iter().map(|p| p.timestamp).collect();
    assert_eq!(offsets, vec![at(0), at(20), at(30)]);
    assert_eq!(finished.route.len(), 3);
    assert_eq!(session.state(), SessionState::Stopped);
}

#[tokio::test]
async fn out_of_order_fix_is_not_recorded() {
    let h = Harness::new();
    let mut session = h.started().await;
    feed(&h, &mut session, north(50.0, 40)).await;

    h.source.emit(north(80.0, 30));
    drain(&mut session).await;

    assert_eq!(session.route().len(), 2);
    assert_eq!(session.route()[1].timestamp, at(40));
}

#[tokio::test]
async fn pause_and_resume_keep_route_and_exclude_paused_time() {
    let h = Harness::new();
    let mut session = h.started().await;
    feed(&h, &mut session, north(100.0, 30)).await;
    let route = session.route().to_vec();

    session.pause().await.unwrap();
    assert_eq!(session.state(), SessionState::Paused);
    assert!(!session.is_watching());

    h.clock.set(at(90));
    assert_eq!(session.elapsed(), Duration::from_secs(30));

    session.resume().await.unwrap();
    assert_eq!(session.state(), SessionState::Tracking);
    assert_eq!(session.route(), route.as_slice());
    assert_eq!(
        session.trip().unwrap().accumulated_pause,
        chrono::TimeDelta::seconds(60)
    );

    h.clock.set(at(100));
    assert_eq!(session.elapsed(), Duration::from_secs(40));

    let finished = session.stop().await.unwrap();
    assert_eq!(finished.active, Duration::from_secs(40));
    assert_eq!(finished.stats.duration_seconds, 40.0);
    assert_eq!(finished.stats.point_count, 2);
}

#[tokio::test]
async fn stopping_while_paused_counts_the_final_pause() {
    let h = Harness::new();
    let mut session = h.started().await;
    h.clock.set(at(10));
    session.pause().await.unwrap();
    h.clock.set(at(70));

    let finished = session.stop().await.unwrap();

    assert_eq!(finished.active, Duration::from_secs(10));
    assert_eq!(finished.ended_at, at(70));
}

#[tokio::test]
async fn stop_reports_every_point_and_clears_snapshot() {
    let h = Harness::new();
    let mut session = h.started().await;
    for secs in [20, 40, 60, 80] {
        feed(&h, &mut session, north(secs as f64 * 5.0, secs)).await;
    }
    assert!(h.snapshots.get().is_some());

    let finished = session.stop().await.unwrap();

    assert_eq!(finished.stats.point_count, 5);
    assert_eq!(finished.route.len(), 5);
    assert!(finished.stats.total_distance_meters > 390.0);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!session.is_watching());
    assert!(h.snapshots.get().is_none());
}

#[tokio::test]
async fn reset_returns_to_idle_once() {
    let h = Harness::new();
    let mut session = h.started().await;
    session.stop().await.unwrap();

    let finished = session.reset().unwrap();
    assert_eq!(finished.route.len(), 1);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.route().is_empty());

    assert!(matches!(
        session.reset(),
        Err(Error::InvalidTransition {
            operation: "reset",
            state: SessionState::Idle
        })
    ));
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let h = Harness::new();
    let mut session = h.session();
    assert!(session.pause().await.is_err());
    assert!(session.resume().await.is_err());
    assert!(session.stop().await.is_err());

    h.source.push_fix(north(0.0, 0));
    session.start().await.unwrap();
    assert!(matches!(
        session.start().await,
        Err(Error::InvalidTransition {
            operation: "start",
            state: SessionState::Tracking
        })
    ));
    assert!(session.resume().await.is_err());
    assert!(session.recover().await.is_err());
}

#[tokio::test]
async fn events_from_cancelled_subscriptions_are_ignored() {
    let h = Harness::new();
    let mut session = h.started().await;
    let stale = h.source.sink();

    session.pause().await.unwrap();
    session.resume().await.unwrap();
    assert_eq!(h.source.watch_requests(), 2);

    h.clock.set(at(100));
    assert!(stale.fix(north(500.0, 100)));
    drain(&mut session).await;
    assert_eq!(session.route().len(), 1);

    h.source.emit(north(500.0, 100));
    drain(&mut session).await;
    assert_eq!(session.route().len(), 2);
}

#[tokio::test]
async fn sensor_errors_become_advisories() {
    let h = Harness::new();
    let mut session = h.started().await;

    h.source.emit_error(PositionError::Timeout);
    drain(&mut session).await;
    session.report_map_error("tile server unreachable");

    let advisories = session.take_advisories();
    assert!(matches!(
        advisories.as_slice(),
        [Advisory::Position(PositionError::Timeout), Advisory::Map(_)]
    ));
    assert!(advisories.iter().all(|a| !a.is_fatal()));
    assert_eq!(session.state(), SessionState::Tracking);
    assert!(session.take_advisories().is_empty());
}

#[tokio::test]
async fn closed_subscription_is_reopened() {
    let h = Harness::new();
    let mut session = h.started().await;
    h.source.fail_next_watch(PositionError::Unavailable);

    h.source.close(PositionError::Unavailable);
    drain(&mut session).await;

    assert_eq!(h.source.watch_requests(), 3);
    assert!(session.is_watching());
    assert!(session.take_advisories().is_empty());

    feed(&h, &mut session, north(10.0, 30)).await;
    assert_eq!(session.route().len(), 2);
}

#[tokio::test]
async fn watch_retries_stop_at_the_ceiling() {
    let h = Harness::new();
    let mut session = h.started().await;
    for _ in 0..5 {
        h.source.fail_next_watch(PositionError::Unavailable);
    }

    h.source.close(PositionError::Timeout);
    drain(&mut session).await;

    assert_eq!(h.source.watch_requests(), 6);
    assert!(!session.is_watching());
    assert_eq!(session.state(), SessionState::Tracking);
    let advisories = session.take_advisories();
    assert!(matches!(
        advisories.as_slice(),
        [Advisory::WatchLost { attempts: 5, .. }]
    ));
    assert!(advisories[0].is_fatal());

    // A pause/resume cycle starts over with a fresh budget.
    session.pause().await.unwrap();
    session.resume().await.unwrap();
    assert!(session.is_watching());
}

#[tokio::test]
async fn snapshot_failures_do_not_roll_back() {
    let h = Harness::new();
    h.source.push_fix(north(0.0, 0));
    let mut session = h.session_with(Box::new(BrokenSnapshotStore));

    session.start().await.unwrap();
    feed(&h, &mut session, north(10.0, 25)).await;

    assert_eq!(session.state(), SessionState::Tracking);
    assert_eq!(session.route().len(), 2);
    let advisories = session.take_advisories();
    assert_eq!(advisories.len(), 2);
    assert!(advisories.iter().all(|a| matches!(a, Advisory::Snapshot(_))));
}

#[tokio::test]
async fn recording_settings_are_locked_during_a_trip() {
    let h = Harness::new();
    let mut session = h.session();

    session
        .set_recording(RecordingConfig::distance(50.0))
        .await
        .unwrap();
    assert_eq!(h.settings.get(), RecordingConfig::distance(50.0));
    assert!(matches!(
        session.set_recording(RecordingConfig::time(Duration::ZERO)).await,
        Err(Error::Config(_))
    ));

    h.source.push_fix(north(0.0, 0));
    session.start().await.unwrap();
    let err = session
        .set_recording(RecordingConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            state: SessionState::Tracking,
            ..
        }
    ));
    assert_eq!(
        session.trip().unwrap().recording,
        RecordingConfig::distance(50.0)
    );
}

#[tokio::test]
async fn load_recording_reads_the_settings_store() {
    let h = Harness::new();
    let mut session = h.session();
    h.settings
        .save(&RecordingConfig::distance(250.0))
        .await
        .unwrap();

    let loaded = *session.load_recording().await.unwrap();

    assert_eq!(loaded, RecordingConfig::distance(250.0));
    assert_eq!(*session.recording(), RecordingConfig::distance(250.0));
}

#[tokio::test]
async fn fresh_snapshot_is_restored_on_recovery() {
    let h = Harness::new();
    let route = {
        let mut session = h.started().await;
        feed(&h, &mut session, north(20.0, 20)).await;
        feed(&h, &mut session, north(40.0, 40)).await;
        session.route().to_vec()
    };

    h.clock.set(at(50));
    let mut session = h.session();
    let recovery = session.recover().await.unwrap();

    assert_eq!(
        recovery,
        Recovery::Resumed {
            state: SessionState::Tracking,
            points: 3
        }
    );
    assert_eq!(session.route(), route.as_slice());
    assert!(session.is_watching());
    assert!(h.snapshots.get().is_some());

    feed(&h, &mut session, north(60.0, 60)).await;
    assert_eq!(session.route().len(), 4);
}

#[tokio::test]
async fn stale_snapshot_is_reported_interrupted() {
    let h = Harness::new();
    {
        let mut session = h.started().await;
        feed(&h, &mut session, north(20.0, 20)).await;
    }

    h.clock.set(at(65));
    let mut session = h.session();
    let recovery = session.recover().await.unwrap();

    assert_eq!(
        recovery,
        Recovery::Interrupted {
            last_seen: at(20),
            points: 2
        }
    );
    assert_eq!(session.state(), SessionState::Idle);
    assert!(h.snapshots.get().is_none());
}

#[tokio::test]
async fn stale_paused_snapshot_is_discarded() {
    let h = Harness::new();
    {
        let mut session = h.started().await;
        h.clock.set(at(5));
        session.pause().await.unwrap();
    }

    h.clock.set(at(50));
    let mut session = h.session();
    let recovery = session.recover().await.unwrap();

    assert!(matches!(recovery, Recovery::Interrupted { points: 1, .. }));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(h.snapshots.get().is_none());
}

#[tokio::test]
async fn fresh_paused_snapshot_restores_paused() {
    let h = Harness::new();
    {
        let mut session = h.started().await;
        h.clock.set(at(15));
        session.pause().await.unwrap();
    }

    h.clock.set(at(35));
    let mut session = h.session();
    let recovery = session.recover().await.unwrap();

    assert_eq!(
        recovery,
        Recovery::Resumed {
            state: SessionState::Paused,
            points: 1
        }
    );
    assert_eq!(session.elapsed(), Duration::from_secs(15));
    assert!(!session.is_watching());

    session.resume().await.unwrap();
    assert_eq!(session.elapsed(), Duration::from_secs(15));
}

#[tokio::test]
async fn exit_flush_marks_tracking_trip_interrupted() {
    let h = Harness::new();
    {
        let mut session = h.started().await;
        session.mark_interrupted().await.unwrap();
    }
    assert!(h.snapshots.get().unwrap().interrupted);

    let mut session = h.session();
    assert!(matches!(
        session.recover().await.unwrap(),
        Recovery::Interrupted { points: 1, .. }
    ));
}

#[tokio::test]
async fn exit_flush_keeps_paused_trip() {
    let h = Harness::new();
    {
        let mut session = h.started().await;
        session.pause().await.unwrap();
        session.mark_interrupted().await.unwrap();
    }
    assert!(!h.snapshots.get().unwrap().interrupted);

    let mut session = h.session();
    assert_eq!(
        session.recover().await.unwrap(),
        Recovery::Resumed {
            state: SessionState::Paused,
            points: 1
        }
    );
}

#[tokio::test]
async fn recovery_without_snapshot_is_fresh() {
    let h = Harness::new();
    let mut session = h.session();
    assert_eq!(session.recover().await.unwrap(), Recovery::Fresh);
    assert_eq!(h.clock.now(), t0());
    assert!(session.mark_interrupted().await.is_err());
}
