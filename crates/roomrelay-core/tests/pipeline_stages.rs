//! End-to-end pipeline with scripted session, lookup and launcher.

mod common;

use common::fakes::{
    check_alive_response, user_info_request, FakeLauncher, FakeLookup, FakeSession, LookupAnswer,
};
use roomrelay_core::detector::{
    DetectionTiming, NavigationError, RequestInspection, ResponseInspection,
};
use roomrelay_core::pipeline::{Pipeline, PipelineOutcome};
use roomrelay_core::relay::RelayTarget;
use roomrelay_core::resolver::ResolveError;
use roomrelay_core::traffic::IdentifierPair;
use std::time::Duration;

fn target() -> RelayTarget {
    RelayTarget::new("rtmps://live.example.com:443/live/", "KEY123")
}

fn timing(observe_ms: u64) -> DetectionTiming {
    DetectionTiming {
        observe: Duration::from_millis(observe_ms),
        page_load_timeout: Duration::from_secs(120),
    }
}

#[tokio::test]
async fn detected_room_is_resolved_and_relayed() {
    let strategy = RequestInspection::new("webcast/user");
    let lookup = FakeLookup::new(LookupAnswer::Found("https://x/y.m3u8".to_string()));
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(1_000),
    };
    let mut session = FakeSession::new(vec![
        user_info_request("7301", "1988"),
        user_info_request("7301", "1988"),
    ]);

    let outcome = pipeline.run(&mut session, "https://live/x", &target()).await;
    let (pair, relay) = match outcome {
        PipelineOutcome::Relaying { pair, relay } => (pair, relay),
        other => panic!("expected Relaying, got {:?}", other),
    };
    assert_eq!(pair, IdentifierPair::new("7301", "1988"));
    assert_eq!(relay.destination(), "rtmps://live.example.com:443/live/KEY123");
    assert!(relay.wait().await.unwrap().success);

    assert_eq!(lookup.calls(), 1);
    assert_eq!(lookup.seen.lock().unwrap()[0], IdentifierPair::new("7301", "1988"));
    assert_eq!(
        launcher.launches.lock().unwrap().as_slice(),
        [(
            "https://x/y.m3u8".to_string(),
            "rtmps://live.example.com:443/live/KEY123".to_string()
        )]
    );
    assert_eq!(session.teardowns, 1);
}

#[tokio::test]
async fn response_variant_runs_end_to_end() {
    let strategy = ResponseInspection::new("webcast/room/check_alive");
    let lookup = FakeLookup::new(LookupAnswer::Found("https://x/live.m3u8".to_string()));
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(1_000),
    };
    let mut session = FakeSession::new(vec![check_alive_response("555", "1988", true)]);

    let outcome = pipeline.run(&mut session, "https://live/x", &target()).await;
    assert!(matches!(outcome, PipelineOutcome::Relaying { .. }));
    assert_eq!(lookup.seen.lock().unwrap()[0], IdentifierPair::new("555", "1988"));
    assert_eq!(launcher.count(), 1);
}

#[tokio::test]
async fn not_found_never_launches_relay() {
    let strategy = RequestInspection::new("webcast/user");
    let lookup = FakeLookup::new(LookupAnswer::NotFound);
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(1_000),
    };
    let mut session = FakeSession::new(vec![user_info_request("7301", "1988")]);

    let outcome = pipeline.run(&mut session, "https://live/x", &target()).await;
    assert!(matches!(outcome, PipelineOutcome::NotFound { .. }));
    assert_eq!(lookup.calls(), 1);
    assert_eq!(launcher.count(), 0);
}

#[tokio::test]
async fn resolve_error_never_launches_relay() {
    let strategy = RequestInspection::new("webcast/user");
    let lookup = FakeLookup::new(LookupAnswer::Http(503));
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(1_000),
    };
    let mut session = FakeSession::new(vec![user_info_request("7301", "1988")]);

    let outcome = pipeline.run(&mut session, "https://live/x", &target()).await;
    assert!(matches!(
        outcome,
        PipelineOutcome::ResolveFailed {
            error: ResolveError::Http(503),
            ..
        }
    ));
    assert_eq!(launcher.count(), 0);
}

#[tokio::test]
async fn incomplete_pair_never_resolves() {
    let strategy = RequestInspection::new("webcast/user");
    let lookup = FakeLookup::new(LookupAnswer::Found("https://x/y.m3u8".to_string()));
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(50),
    };
    let mut session = FakeSession::new(vec![user_info_request("", "1988")]);

    let outcome = pipeline.run(&mut session, "https://live/x", &target()).await;
    assert!(matches!(outcome, PipelineOutcome::NoIdentifier { .. }));
    assert_eq!(lookup.calls(), 0);
    assert_eq!(launcher.count(), 0);
    assert_eq!(session.teardowns, 1);
}

#[tokio::test]
async fn navigation_failure_never_resolves() {
    let strategy = RequestInspection::new("webcast/user");
    let lookup = FakeLookup::new(LookupAnswer::Found("https://x/y.m3u8".to_string()));
    let launcher = FakeLauncher::default();
    let pipeline = Pipeline {
        strategy: &strategy,
        lookup: &lookup,
        launcher: &launcher,
        timing: timing(60_000),
    };
    let mut session = FakeSession::failing_navigation(NavigationError::Browser(
        "Navigating frame was detached".to_string(),
    ));

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(&mut session, "https://live/x", &target()),
    )
    .await
    .expect("no observation wait after navigation failure");
    assert!(matches!(outcome, PipelineOutcome::NavigationFailed(_)));
    assert_eq!(lookup.calls(), 0);
    assert_eq!(launcher.count(), 0);
    assert_eq!(session.teardowns, 1);
}
