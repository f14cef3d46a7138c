//use log::LevelFilter;
//use std::io::Write;

use bytes::Bytes;

use super::audio_sampler::TICK_COUNTER_WRAP;
use super::*;
use crate::mock::mock_analyser::MockAnalyser;
use crate::mock::mock_stream::MockMediaStream;
use crate::mock::mock_track::MockMediaTrack;

fn new_track(id: &str, kind: MediaKind) -> Arc<MockMediaTrack> {
    Arc::new(MockMediaTrack::new(id.to_owned(), kind))
}

fn as_track(track: &Arc<MockMediaTrack>) -> Arc<dyn MediaStreamTrack + Send + Sync> {
    Arc::clone(track) as Arc<dyn MediaStreamTrack + Send + Sync>
}

fn labeled_stream(id: &str, label: &str) -> Arc<MockMediaStream> {
    Arc::new(MockMediaStream::with_source_label(
        id.to_owned(),
        label.to_owned(),
    ))
}

fn as_stream(stream: &Arc<MockMediaStream>) -> Arc<dyn MediaStream + Send + Sync> {
    Arc::clone(stream) as Arc<dyn MediaStream + Send + Sync>
}

/// Builds a manager whose analysers serve a constant snapshot averaging to
/// 100.0, except for tracks named "warming_..." whose analysers never warm
/// up, and funnels every scheduler notification into the returned channel.
fn sampled_manager(
    interval: Duration,
    max_entries: usize,
) -> (StreamManager, mpsc::Receiver<AudioLevelsEvent>) {
    let output = Arc::new(MockMediaStream::new("output".to_owned()));
    let manager = StreamManager::builder()
        .with_sampling_interval(interval)
        .with_max_sampled_entries(max_entries)
        .with_analyser_factory(Box::new(|track| {
            if track.id().starts_with("warming") {
                Box::new(MockAnalyser::new())
            } else {
                Box::new(MockAnalyser::with_magnitudes(Bytes::from_static(&[
                    100, 100, 100, 100,
                ])))
            }
        }))
        .build(Arc::clone(&output) as Arc<dyn MediaStream + Send + Sync>);

    let (events_tx, events_rx) = mpsc::channel(64);
    manager.on_audio_levels(Box::new(move |event| {
        let events_tx = events_tx.clone();
        Box::pin(async move {
            let _ = events_tx.send(event).await;
        })
    }));

    (manager, events_rx)
}

async fn next_event(events_rx: &mut mpsc::Receiver<AudioLevelsEvent>) -> AudioLevelsEvent {
    tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
        .await
        .expect("timed out waiting for an audio levels event")
        .expect("audio levels channel closed")
}

#[tokio::test]
async fn test_sampler_requires_interval() -> Result<()> {
    let output = Arc::new(MockMediaStream::new("output".to_owned()));
    let manager = StreamManager::builder()
        .with_analyser_factory(Box::new(|_| {
            Box::new(MockAnalyser::with_magnitudes(Bytes::from_static(&[
                100, 100, 100, 100,
            ])))
        }))
        .build(Arc::clone(&output) as Arc<dyn MediaStream + Send + Sync>);

    let (events_tx, mut events_rx) = mpsc::channel(8);
    manager.on_audio_levels(Box::new(move |event| {
        let events_tx = events_tx.clone();
        Box::pin(async move {
            let _ = events_tx.send(event).await;
        })
    }));

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    let quiet = tokio::time::timeout(Duration::from_millis(100), events_rx.recv()).await;
    assert!(quiet.is_err(), "scheduler ran without a sampling interval");

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_scope_cadence() -> Result<()> {
    /*env_logger::Builder::new()
    .format(|buf, record| {
        writeln!(
            buf,
            "{}:{} [{}] {} - {}",
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.level(),
            chrono::Local::now().format("%H:%M:%S.%6f"),
            record.args()
        )
    })
    .filter(None, LevelFilter::Trace)
    .init();*/

    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(20), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Built-in Microphone");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    let mut scopes = vec![];
    for _ in 0..4 {
        let event = next_event(&mut events_rx).await;
        assert_eq!(event.amplitudes.len(), 1);
        let record = &event.amplitudes[0];
        assert_eq!(record.direction, TrackDirection::Input);
        assert_eq!(record.source_id, "Built-in Microphone");
        assert_eq!(record.track.id(), "mic_1");
        assert!((record.value - 100.0).abs() < f32::EPSILON);
        scopes.push(event.scope);
    }
    assert_eq!(
        scopes,
        vec![
            SampleScope::All,
            SampleScope::Input,
            SampleScope::Input,
            SampleScope::All
        ]
    );

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_scope_filters_output_entries() -> Result<()> {
    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(20), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    // Registering more audio re-arms the timer, so the first event fires a
    // full period after this call with both entries in place.
    let remote = Arc::new(MockMediaStream::new("remote_3".to_owned()));
    let remote_audio = new_track("remote_audio", MediaKind::Audio);
    manager
        .add_track(
            as_stream(&remote),
            as_track(&remote_audio),
            TrackDirection::Output,
        )
        .await;

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.scope, SampleScope::All);
    assert_eq!(event.amplitudes.len(), 2);
    assert_eq!(event.amplitudes[0].direction, TrackDirection::Input);
    assert_eq!(event.amplitudes[1].direction, TrackDirection::Output);
    assert_eq!(event.amplitudes[1].source_id, "3");

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.scope, SampleScope::Input);
    assert_eq!(event.amplitudes.len(), 1);
    assert_eq!(event.amplitudes[0].direction, TrackDirection::Input);

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_cap_limits_records() -> Result<()> {
    let (manager, mut events_rx) = sampled_manager(Duration::from_millis(20), 1);

    let local = labeled_stream("local_1", "Mic");
    let first = new_track("mic_a", MediaKind::Audio);
    let second = new_track("mic_b", MediaKind::Audio);
    local.add_track(as_track(&first)).await;
    local.add_track(as_track(&second)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.scope, SampleScope::All);
    assert_eq!(
        event.amplitudes.len(),
        1,
        "cap of one admitted more than one record"
    );
    assert_eq!(event.amplitudes[0].track.id(), "mic_a");

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_cap_and_warm_up() -> Result<()> {
    let (manager, mut events_rx) = sampled_manager(Duration::from_millis(20), 1);

    let local = labeled_stream("local_1", "Mic");
    let warming = new_track("warming_mic", MediaKind::Audio);
    let live = new_track("live_mic", MediaKind::Audio);
    local.add_track(as_track(&warming)).await;
    local.add_track(as_track(&live)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    // The cap admits only the first entry. Its analyser never warms up, and
    // the cap does not skip ahead to a later entry in its place.
    for _ in 0..3 {
        let event = next_event(&mut events_rx).await;
        assert!(
            event.amplitudes.is_empty(),
            "cap skipped ahead to a later entry: {:?}",
            event.amplitudes
        );
    }

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_stops_when_registry_empties() -> Result<()> {
    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(20), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    next_event(&mut events_rx).await;

    manager.remove_track(&as_track(&mic)).await;

    // Drain whatever the cancelled loop already had in flight, then expect
    // silence.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while events_rx.try_recv().is_ok() {}
    let quiet = tokio::time::timeout(Duration::from_millis(100), events_rx.recv()).await;
    assert!(quiet.is_err(), "scheduler kept running with an empty registry");

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_tick_survives_rearm() -> Result<()> {
    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(20), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    next_event(&mut events_rx).await;

    manager.remove_track(&as_track(&mic)).await;
    {
        let mut state = manager.internal.state.lock().await;
        state.tick = 500;
    }
    while events_rx.try_recv().is_ok() {}

    manager
        .add_track(as_stream(&local), as_track(&mic), TrackDirection::Input)
        .await;
    next_event(&mut events_rx).await;

    let tick = {
        let state = manager.internal.state.lock().await;
        state.tick
    };
    assert!(tick > 500, "tick counter restarted on rearm, got {tick}");

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_tick_wraps() -> Result<()> {
    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(200), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;
    {
        let mut state = manager.internal.state.lock().await;
        state.tick = TICK_COUNTER_WRAP - 1;
    }

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.scope, SampleScope::All);
    {
        let state = manager.internal.state.lock().await;
        assert_eq!(state.tick, 0, "tick counter failed to wrap");
    }

    manager.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_sampler_stops_on_close() -> Result<()> {
    let (manager, mut events_rx) =
        sampled_manager(Duration::from_millis(20), DEFAULT_MAX_SAMPLED_ENTRIES);

    let local = labeled_stream("local_1", "Mic");
    let mic = new_track("mic_1", MediaKind::Audio);
    local.add_track(as_track(&mic)).await;
    manager
        .add_stream(as_stream(&local), TrackDirection::Input)
        .await;

    next_event(&mut events_rx).await;
    manager.close().await?;

    // close waits for the sampling loop to exit before returning, so no
    // further events can arrive.
    while events_rx.try_recv().is_ok() {}
    let quiet = tokio::time::timeout(Duration::from_millis(100), events_rx.recv()).await;
    assert!(quiet.is_err(), "scheduler outlived close");

    Ok(())
}
