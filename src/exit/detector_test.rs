use super::*;
use crate::events::MouseButton;
use crate::exit::geometry::{ScreenSize, SharedScreenGeometry};
use std::sync::Mutex;

/// Mock emitter for testing that records all emitted events
#[derive(Default)]
struct MockEmitter {
    progress: Mutex<Vec<ExitProgress>>,
    requests: Mutex<Vec<ExitRequest>>,
}

impl MockEmitter {
    fn requests(&self) -> Vec<ExitRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn progress(&self) -> Vec<ExitProgress> {
        self.progress.lock().unwrap().clone()
    }

    fn last_progress(&self) -> Option<ExitProgress> {
        self.progress.lock().unwrap().last().cloned()
    }
}

impl ExitEventEmitter for MockEmitter {
    fn emit_exit_progress(&self, progress: ExitProgress) {
        self.progress.lock().unwrap().push(progress);
    }

    fn emit_exit_requested(&self, request: ExitRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

const W: f64 = 1920.0;
const H: f64 = 1080.0;

fn detector_with(
    geometry: SharedScreenGeometry,
) -> (ExitSequenceDetector, Arc<MockEmitter>) {
    let emitter = Arc::new(MockEmitter::default());
    let detector = ExitSequenceDetector::new(
        ExitSequenceConfig::default(),
        Arc::new(geometry),
        emitter.clone(),
    );
    (detector, emitter)
}

fn detector() -> (ExitSequenceDetector, Arc<MockEmitter>) {
    let geometry = SharedScreenGeometry::new();
    geometry.set(ScreenSize::new(W, H).unwrap());
    detector_with(geometry)
}

fn press(detector: &mut ExitSequenceDetector, now: Instant, key: &str) {
    detector.handle_event(&CanonicalEvent::key_down(0, key), now);
}

fn release(detector: &mut ExitSequenceDetector, now: Instant, key: &str) {
    detector.handle_event(&CanonicalEvent::key_up(0, key), now);
}

fn click(detector: &mut ExitSequenceDetector, now: Instant, x: f64, y: f64) {
    detector.handle_event(&CanonicalEvent::mouse_down(0, x, y, MouseButton::Left), now);
}

// === Keyboard path ===

#[tokio::test(start_paused = true)]
async fn test_keyboard_sequence_completes_once() {
    let (mut detector, emitter) = detector();
    let start = Instant::now();

    for (i, key) in ["Alt", "Control", "ArrowRight", "Escape", "KeyQ"]
        .iter()
        .enumerate()
    {
        press(&mut detector, start + Duration::from_millis(500 * i as u64), key);
    }

    let requests = emitter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sequence, SequenceKind::Keyboard);

    let last = emitter.last_progress().unwrap();
    assert_eq!(last.state, ProgressState::Completed);
    assert_eq!(last.current_step, 5);
    assert_eq!(last.total_steps, 5);

    // Re-armed
    assert_eq!(detector.keyboard_step(), 0);
    assert!(detector.next_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_keyboard_progress_reports_each_step() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Control");

    let steps: Vec<(usize, ProgressState)> = emitter
        .progress()
        .iter()
        .map(|p| (p.current_step, p.state))
        .collect();
    assert_eq!(
        steps,
        vec![(1, ProgressState::InProgress), (2, ProgressState::InProgress)]
    );
    assert_eq!(
        emitter.last_progress().unwrap().remaining_time,
        DEFAULT_KEYBOARD_TIMEOUT
    );
}

#[tokio::test(start_paused = true)]
async fn test_wrong_key_resets_and_blocks_completion() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();

    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Control");
    press(&mut detector, now, "KeyX");
    assert_eq!(detector.keyboard_step(), 0);
    assert_eq!(emitter.last_progress().unwrap().state, ProgressState::Idle);

    for key in ["ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert!(emitter.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_resets_to_step_zero() {
    let (mut detector, emitter) = detector();
    let start = Instant::now();

    press(&mut detector, start, "Alt");
    let later = start + Duration::from_millis(5_100);
    for key in ["Control", "ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, later, key);
    }

    assert!(emitter.requests().is_empty());
    assert_eq!(detector.keyboard_step(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_without_input() {
    let (mut detector, emitter) = detector();
    let start = Instant::now();
    press(&mut detector, start, "Alt");
    assert_eq!(
        detector.next_deadline(),
        Some(start + DEFAULT_KEYBOARD_TIMEOUT)
    );

    detector.handle_timeouts(start + DEFAULT_KEYBOARD_TIMEOUT);
    assert_eq!(detector.keyboard_step(), 0);
    assert!(detector.next_deadline().is_none());
    let last = emitter.last_progress().unwrap();
    assert_eq!(last.state, ProgressState::Idle);
    assert_eq!(last.sequence_kind, SequenceKind::Keyboard);
}

#[tokio::test(start_paused = true)]
async fn test_sliding_window_allows_slow_but_steady_input() {
    let (mut detector, emitter) = detector();
    let start = Instant::now();
    // 4s between each key: over 5s in total, but never 5s between steps
    for (i, key) in ["Alt", "Control", "ArrowRight", "Escape", "KeyQ"]
        .iter()
        .enumerate()
    {
        let now = start + Duration::from_secs(4 * i as u64);
        detector.handle_timeouts(now);
        press(&mut detector, now, key);
    }
    assert_eq!(emitter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_key_up_events_are_ignored() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    detector.handle_event(&CanonicalEvent::key_up(0, "Alt"), now);
    detector.handle_event(&CanonicalEvent::key_up(0, "KeyZ"), now);
    assert_eq!(detector.keyboard_step(), 1);
    assert_eq!(emitter.progress().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_held_key_auto_repeat_does_not_reset() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Control");
    press(&mut detector, now, "Control");
    for key in ["ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert_eq!(emitter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_key_out_of_place_resets_to_idle() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "Control");
    // An out-of-place Alt does not count as step one of a new attempt
    press(&mut detector, now, "Alt");
    assert_eq!(detector.keyboard_step(), 0);
    assert_eq!(emitter.last_progress().unwrap().state, ProgressState::Idle);

    for key in ["Control", "ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert!(emitter.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deliberate_repress_resets() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    release(&mut detector, now, "Alt");
    press(&mut detector, now, "Alt");
    assert_eq!(detector.keyboard_step(), 0);

    for key in ["Control", "ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert!(emitter.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fresh_attempt_after_reset_completes() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    press(&mut detector, now, "Alt");
    press(&mut detector, now, "KeyX");
    assert_eq!(detector.keyboard_step(), 0);

    for key in ["Alt", "Control", "ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert_eq!(emitter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_configured_sequence_is_canonicalized() {
    let emitter = Arc::new(MockEmitter::default());
    let config = ExitSequenceConfig {
        keyboard_sequence: vec!["ctrl".into(), "Left".into(), "q".into()],
        ..Default::default()
    };
    let mut detector = ExitSequenceDetector::new(
        config,
        Arc::new(SharedScreenGeometry::new()),
        emitter.clone(),
    );
    let now = Instant::now();
    for key in ["Control", "ArrowLeft", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert_eq!(emitter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detector_rearms_for_second_completion() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    for _ in 0..2 {
        for key in ["Alt", "Control", "ArrowRight", "Escape", "KeyQ"] {
            press(&mut detector, now, key);
        }
    }
    assert_eq!(emitter.requests().len(), 2);
}

// === Mouse path ===

#[tokio::test(start_paused = true)]
async fn test_corner_sequence_completes_once() {
    let (mut detector, emitter) = detector();
    let start = Instant::now();
    let corners = [(0.0, 0.0), (W, 0.0), (W, H), (0.0, H)];
    for (i, (x, y)) in corners.iter().enumerate() {
        click(&mut detector, start + Duration::from_secs(2 * i as u64), *x, *y);
    }

    let requests = emitter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sequence, SequenceKind::Mouse);
    assert_eq!(detector.mouse_step(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_corner_clicks_within_radius_match() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    click(&mut detector, now, 20.0, 20.0);
    click(&mut detector, now, W - 30.0, 10.0);
    click(&mut detector, now, W - 1.0, H - 1.0);
    click(&mut detector, now, 40.0, H - 25.0);
    assert_eq!(emitter.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_click_outside_corners_resets() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    click(&mut detector, now, 0.0, 0.0);
    click(&mut detector, now, W, 0.0);
    click(&mut detector, now, W / 2.0, H / 2.0);
    assert_eq!(detector.mouse_step(), 0);

    click(&mut detector, now, W, H);
    click(&mut detector, now, 0.0, H);
    assert!(emitter.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_same_corner_twice_resets() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();
    click(&mut detector, now, 0.0, 0.0);
    click(&mut detector, now, 0.0, 0.0);
    assert_eq!(detector.mouse_step(), 0);

    for (x, y) in [(W, 0.0), (W, H), (0.0, H)] {
        click(&mut detector, now, x, y);
    }
    assert!(emitter.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_right_click_in_corner_resets() {
    let (mut detector, _emitter) = detector();
    let now = Instant::now();
    click(&mut detector, now, 0.0, 0.0);
    detector.handle_event(
        &CanonicalEvent::mouse_down(0, W, 0.0, MouseButton::Right),
        now,
    );
    assert_eq!(detector.mouse_step(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mouse_moves_do_not_reset() {
    let (mut detector, _emitter) = detector();
    let now = Instant::now();
    click(&mut detector, now, 0.0, 0.0);
    detector.handle_event(&CanonicalEvent::mouse_move(0, W / 2.0, H / 2.0), now);
    assert_eq!(detector.mouse_step(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mouse_timeout_is_ten_seconds() {
    let (mut detector, _emitter) = detector();
    let start = Instant::now();
    click(&mut detector, start, 0.0, 0.0);

    detector.handle_timeouts(start + Duration::from_millis(9_999));
    assert_eq!(detector.mouse_step(), 1);
    detector.handle_timeouts(start + DEFAULT_MOUSE_TIMEOUT);
    assert_eq!(detector.mouse_step(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_geometry_fails_closed() {
    let (mut detector, emitter) = detector_with(SharedScreenGeometry::new());
    let now = Instant::now();
    for (x, y) in [(0.0, 0.0), (W, 0.0), (W, H), (0.0, H)] {
        click(&mut detector, now, x, y);
    }
    assert_eq!(detector.mouse_step(), 0);
    assert!(emitter.requests().is_empty());
    assert!(emitter.progress().is_empty());
}

// === Independence ===

#[tokio::test(start_paused = true)]
async fn test_paths_do_not_interfere() {
    let (mut detector, emitter) = detector();
    let now = Instant::now();

    press(&mut detector, now, "Alt");
    click(&mut detector, now, 0.0, 0.0);
    press(&mut detector, now, "Control");
    // A click that resets the mouse path leaves the keyboard path alone
    click(&mut detector, now, W / 2.0, H / 2.0);
    assert_eq!(detector.keyboard_step(), 2);
    assert_eq!(detector.mouse_step(), 0);

    for key in ["ArrowRight", "Escape", "KeyQ"] {
        press(&mut detector, now, key);
    }
    assert_eq!(emitter.requests().len(), 1);
    assert_eq!(emitter.requests()[0].sequence, SequenceKind::Keyboard);
}

#[tokio::test(start_paused = true)]
async fn test_next_deadline_is_earliest_of_both() {
    let (mut detector, _emitter) = detector();
    let start = Instant::now();
    click(&mut detector, start, 0.0, 0.0);
    press(&mut detector, start + Duration::from_secs(1), "Alt");
    // keyboard: 1s + 5s, mouse: 0s + 10s
    assert_eq!(
        detector.next_deadline(),
        Some(start + Duration::from_secs(6))
    );
}
