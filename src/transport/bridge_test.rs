// Tests for the stdio bridge over an in-memory pipe

use super::*;
use crate::capture::mock::{MockCapture, MockCaptureHandle};
use crate::capture::raw::{LinuxRawEvent, RawEvent};
use crate::events::{ExitEventEmitter, ProgressState, SequenceKind};
use crate::exit::{ChannelExitEmitter, SharedScreenGeometry};
use crate::permissions::{PermissionManager, PermissionMap};
use crate::transport::{CaptureServiceHandle, EventHub};
use serde_json::json;
use serial_test::serial;
use std::time::Duration;
use tokio::io::{DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

struct NoPermissionsNeeded;

impl PermissionManager for NoPermissionsNeeded {
    fn check_permissions(&self) -> PermissionMap {
        PermissionMap::new()
    }

    fn request_permissions(&self) -> bool {
        true
    }
}

struct Harness {
    handle: MockCaptureHandle,
    emitter: ChannelExitEmitter,
    host_in: WriteHalf<DuplexStream>,
    host_out: Lines<BufReader<ReadHalf<DuplexStream>>>,
    bridge: JoinHandle<Result<BridgeExit, TransportError>>,
}

impl Harness {
    fn start<F>(shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (backend, handle) = MockCapture::new();
        let hub = EventHub::default();
        let service = CaptureServiceHandle::spawn(Box::new(backend), hub.clone(), 64).unwrap();
        let transport = Arc::new(Transport::new(
            service,
            Arc::new(NoPermissionsNeeded),
            SharedScreenGeometry::new(),
            hub,
        ));
        let (emitter, signal) = ChannelExitEmitter::new();
        let progress = emitter.subscribe_progress();

        let (host, bridge_end) = tokio::io::duplex(64 * 1024);
        let (bridge_read, bridge_write) = tokio::io::split(bridge_end);
        let (host_read, host_in) = tokio::io::split(host);

        let bridge = tokio::spawn(run_bridge(
            transport,
            BufReader::new(bridge_read),
            bridge_write,
            progress,
            signal,
            shutdown,
        ));

        Self {
            handle,
            emitter,
            host_in,
            host_out: BufReader::new(host_read).lines(),
            bridge,
        }
    }

    async fn send(&mut self, line: &str) {
        self.host_in.write_all(line.as_bytes()).await.unwrap();
        self.host_in.write_all(b"\n").await.unwrap();
    }

    async fn next(&mut self) -> Value {
        let line = timeout(Duration::from_secs(5), self.host_out.next_line())
            .await
            .expect("bridge output timed out")
            .unwrap()
            .expect("bridge output closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn finish(self) -> BridgeExit {
        timeout(Duration::from_secs(5), self.bridge)
            .await
            .expect("bridge did not stop")
            .unwrap()
            .unwrap()
    }
}

fn key_down(ts: u64, code: u16) -> RawEvent {
    RawEvent::Linux(LinuxRawEvent {
        timestamp: ts,
        ev_type: 1,
        code,
        value: 1,
        ..Default::default()
    })
}

#[tokio::test]
#[serial]
async fn test_requests_get_responses() {
    let mut harness = Harness::start(std::future::pending());

    harness.send(r#"{"id":1,"method":"startCapture"}"#).await;
    assert_eq!(harness.next().await, json!({"id": 1, "result": true}));

    harness.send(r#"{"id":"two","method":"checkPermissions"}"#).await;
    assert_eq!(harness.next().await, json!({"id": "two", "result": {}}));

    harness.send(r#"{"id":3,"method":"teleport"}"#).await;
    let response = harness.next().await;
    assert_eq!(response["id"], json!(3));
    assert_eq!(response["error"]["code"], json!("notImplemented"));

    harness.send("{not json").await;
    let response = harness.next().await;
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], json!("invalidRequest"));
}

#[tokio::test]
#[serial]
async fn test_events_are_forwarded_in_order() {
    let mut harness = Harness::start(std::future::pending());
    harness.send(r#"{"id":1,"method":"startCapture"}"#).await;
    harness.next().await;

    assert!(harness.handle.feed(key_down(10, 1)));
    assert!(harness.handle.feed(key_down(11, 16)));
    assert!(harness.handle.feed(key_down(12, 106)));

    let keys: Vec<Value> = vec![
        harness.next().await,
        harness.next().await,
        harness.next().await,
    ];
    let names: Vec<&str> = keys
        .iter()
        .map(|k| k["event"]["key"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Escape", "KeyQ", "ArrowRight"]);
    assert_eq!(keys[0]["event"]["type"], json!("keyDown"));
}

#[tokio::test]
#[serial]
async fn test_input_close_stops_capture() {
    let mut harness = Harness::start(std::future::pending());
    harness.send(r#"{"id":1,"method":"startCapture"}"#).await;
    harness.next().await;
    assert_eq!(harness.handle.live_hooks(), 1);

    harness.host_in.shutdown().await.unwrap();
    let handle = harness.handle.clone();
    assert_eq!(harness.finish().await, BridgeExit::InputClosed);
    assert_eq!(handle.live_hooks(), 0);
}

#[tokio::test]
#[serial]
async fn test_exit_request_is_last_line() {
    let mut harness = Harness::start(std::future::pending());
    harness.send(r#"{"id":1,"method":"startCapture"}"#).await;
    harness.next().await;

    harness.emitter.emit_exit_progress(ExitProgress {
        sequence_kind: SequenceKind::Mouse,
        current_step: 4,
        total_steps: 4,
        remaining_time: Duration::ZERO,
        state: ProgressState::Completed,
    });
    let request = ExitRequest {
        sequence: SequenceKind::Mouse,
        timestamp: 500,
    };
    harness.emitter.emit_exit_requested(request);

    let progress = harness.next().await;
    assert_eq!(progress["exitProgress"]["state"], json!("completed"));
    let exit = harness.next().await;
    assert_eq!(
        exit,
        json!({"exitRequested": {"sequence": "mouse", "timestamp": 500}})
    );

    let handle = harness.handle.clone();
    assert_eq!(harness.finish().await, BridgeExit::ExitRequested(request));
    assert_eq!(handle.live_hooks(), 0);
}

#[tokio::test]
#[serial]
async fn test_shutdown_future_ends_bridge() {
    let (trigger, triggered) = oneshot::channel::<()>();
    let mut harness = Harness::start(async move {
        let _ = triggered.await;
    });
    harness.send(r#"{"id":1,"method":"startCapture"}"#).await;
    harness.next().await;

    trigger.send(()).unwrap();
    let handle = harness.handle.clone();
    assert_eq!(harness.finish().await, BridgeExit::Shutdown);
    assert_eq!(handle.live_hooks(), 0);
}
