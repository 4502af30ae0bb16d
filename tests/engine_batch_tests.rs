use std::sync::Arc;

use mtcapture::agent::{ScriptedAgent, StreamsDocument};
use mtcapture::core::{ColumnNaming, SparseTable, StreamWindow};
use mtcapture::engine::{densify, CaptureEngine, CaptureSettings, CaptureState};
use mtcapture::extract::TelemetryExtractor;
use mtcapture::{CaptureError, StopSignal};

fn press(first: u64, next: u64, last: u64) -> StreamsDocument {
    StreamsDocument::new(first, next, last).device("press-3", |d| d)
}

fn engine(agent: &Arc<ScriptedAgent>) -> CaptureEngine<ScriptedAgent, TelemetryExtractor> {
    CaptureEngine::new(agent.clone(), TelemetryExtractor::new(), CaptureSettings::default())
}

#[tokio::test]
async fn test_batch_requests_whole_buffer_once() {
    let agent = Arc::new(ScriptedAgent::new());
    agent.push_current(press(1, 50, 49).render());
    agent.push_current(press(1, 60, 59).render());
    agent.push_sample(
        StreamsDocument::new(1, 60, 59)
            .device("press-3", |d| {
                d.sample("Force", "2024-05-01T12:00:00.000Z", "10")
                    .event("Door", "2024-05-01T12:00:01.000Z", Some("OPEN"))
                    .sample("Force", "2099-01-01T00:00:00.000Z", "12")
            })
            .render(),
    );

    let stop = StopSignal::new();
    stop.stop();

    let mut engine = engine(&agent);
    let session = engine
        .run_batch(&stop, |probe| SparseTable::for_devices(ColumnNaming::Bare, &probe.devices))
        .await
        .unwrap();

    assert_eq!(agent.sample_requests(), vec!["sample?from=1&count=59"]);
    assert_eq!(session.window, StreamWindow::new(1, 60));
    assert!(matches!(engine.state(), CaptureState::Completed { .. }));

    let table = densify(session.data);
    assert_eq!(table.len(), 3);

    // history seeds the rows that survive the trim
    let trimmed = table.clone().since(session.session_start);
    assert_eq!(trimmed.len(), 1);
    assert_eq!(trimmed.get(0, "Force"), Some("12"));
    assert_eq!(trimmed.get(0, "Door"), Some("OPEN"));
}

#[tokio::test]
async fn test_batch_waits_for_stop() {
    let agent = Arc::new(ScriptedAgent::new());
    agent.push_current(press(5, 9, 8).render());
    agent.push_current(press(5, 9, 8).render());
    agent.push_sample(press(5, 9, 8).render());

    let stop = StopSignal::new();
    let trigger = stop.clone();
    let stopper = tokio::spawn(async move {
        tokio::task::yield_now().await;
        trigger.stop();
    });

    let mut engine = engine(&agent);
    let session = engine
        .run_batch(&stop, |probe| SparseTable::for_devices(ColumnNaming::Bare, &probe.devices))
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(agent.requests(), vec!["current", "current", "sample?from=5&count=4"]);
    assert!(session.data.is_empty());
}

#[tokio::test]
async fn test_batch_unreachable_at_stop_is_fatal() {
    let agent = Arc::new(ScriptedAgent::new());
    agent.push_current(press(1, 3, 2).render());
    agent.push_current_unreachable();

    let stop = StopSignal::new();
    stop.stop();

    let mut engine = engine(&agent);
    let err = engine
        .run_batch(&stop, |probe| SparseTable::for_devices(ColumnNaming::Bare, &probe.devices))
        .await
        .unwrap_err();

    assert!(matches!(err, CaptureError::Unreachable { .. }));
    assert!(agent.sample_requests().is_empty());
    assert!(engine.state().is_terminal());
}
