// Tests for the capture session lifecycle and pump ordering

use super::*;
use crate::capture::mock::{MockCapture, MockCaptureHandle};
use crate::capture::raw::LinuxRawEvent;
use crate::events::EventKind;
use serial_test::serial;

fn session_with_hub(hub: &EventHub) -> (CaptureSession, MockCaptureHandle) {
    let (backend, handle) = MockCapture::new();
    let session = CaptureSession::new(Box::new(backend), hub.clone(), 64).unwrap();
    (session, handle)
}

fn key(ts: u64, code: u16, value: i32) -> RawEvent {
    RawEvent::Linux(LinuxRawEvent {
        timestamp: ts,
        ev_type: 1,
        code,
        value,
        ..Default::default()
    })
}

#[test]
#[serial]
fn test_new_session_is_idle() {
    let hub = EventHub::default();
    let (session, handle) = session_with_hub(&hub);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_active());
    assert_eq!(handle.live_hooks(), 0);
}

#[test]
#[serial]
fn test_second_session_is_rejected() {
    let hub = EventHub::default();
    let (first, _handle) = session_with_hub(&hub);

    let (backend, _) = MockCapture::new();
    let second = CaptureSession::new(Box::new(backend), hub.clone(), 64);
    assert!(matches!(second, Err(CaptureError::SessionExists)));

    drop(first);
    let (backend, _) = MockCapture::new();
    assert!(CaptureSession::new(Box::new(backend), hub, 64).is_ok());
}

#[test]
#[serial]
fn test_start_twice_installs_one_hook() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);

    assert_eq!(session.start().unwrap(), StartOutcome::Started);
    assert_eq!(session.start().unwrap(), StartOutcome::AlreadyActive);

    assert!(session.is_active());
    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(handle.installs(), 1);
    assert_eq!(handle.live_hooks(), 1);
}

#[test]
#[serial]
fn test_stop_when_idle_is_noop() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);
    assert_eq!(session.stop(), StopOutcome::AlreadyInactive);
    assert_eq!(session.stop(), StopOutcome::AlreadyInactive);
    assert_eq!(handle.live_hooks(), 0);
}

#[test]
#[serial]
fn test_stop_releases_hook_before_returning() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);

    session.start().unwrap();
    assert_eq!(session.stop(), StopOutcome::Stopped);

    assert_eq!(handle.live_hooks(), 0);
    assert!(!session.is_active());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!handle.feed(key(1, 30, 1)));
}

#[test]
#[serial]
fn test_failed_start_returns_to_idle() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);
    handle.fail_next_start(CaptureError::PermissionDenied {
        permission: "accessibility".to_string(),
        hint: "grant it".to_string(),
    });

    let err = session.start().unwrap_err();
    assert_eq!(err.code(), "permissionDenied");
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(handle.live_hooks(), 0);

    // Retry after the user granted access
    assert_eq!(session.start().unwrap(), StartOutcome::Started);
    assert_eq!(handle.live_hooks(), 1);
}

#[test]
#[serial]
fn test_restart_after_stop() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);
    for _ in 0..3 {
        session.start().unwrap();
        session.stop();
    }
    assert_eq!(handle.installs(), 3);
    assert_eq!(handle.live_hooks(), 0);
}

#[test]
#[serial]
fn test_start_reinstalls_after_backend_ends_on_its_own() {
    let hub = EventHub::default();
    let (mut session, handle) = session_with_hub(&hub);
    session.start().unwrap();

    handle.lose_hook();
    assert!(!session.is_active());

    assert_eq!(session.start().unwrap(), StartOutcome::Started);
    assert!(session.is_active());
    assert_eq!(handle.installs(), 2);
    assert_eq!(handle.live_hooks(), 1);
}

#[test]
#[serial]
fn test_all_subscribers_observe_fed_order() {
    let hub = EventHub::new(256);
    let mut subscribers: Vec<_> = (0..3).map(|_| hub.subscribe()).collect();
    let (mut session, handle) = session_with_hub(&hub);
    session.start().unwrap();

    let fed: Vec<u64> = (1..=50).collect();
    for ts in &fed {
        let value = if ts % 2 == 0 { 0 } else { 1 };
        assert!(handle.feed(key(*ts, 30, value)));
    }

    // Stop drains the pump, so everything fed has been published
    session.stop();

    for sub in subscribers.iter_mut() {
        let seen: Vec<u64> = std::iter::from_fn(|| sub.try_recv())
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(seen, fed);
    }
}

#[test]
#[serial]
fn test_pump_publishes_normalized_events() {
    let hub = EventHub::default();
    let mut sub = hub.subscribe();
    let (mut session, handle) = session_with_hub(&hub);
    session.start().unwrap();

    handle.feed(key(10, 16, 1));
    handle.feed(key(11, 16, 0));
    session.stop();

    let first = sub.try_recv().unwrap();
    assert_eq!(first.kind(), EventKind::KeyDown);
    assert_eq!(first.key().unwrap().key, "KeyQ");
    let second = sub.try_recv().unwrap();
    assert_eq!(second.kind(), EventKind::KeyUp);
}
