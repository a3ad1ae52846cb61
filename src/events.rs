// Canonical input events and exit-sequence payloads
// Defines the single event model every platform converges to, the exit
// read-model, and the emission trait used by the exit detector for testability

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Event names as constants for consistency across the wire
pub mod event_names {
    pub const INPUT_EVENT: &str = "event";
    pub const EXIT_PROGRESS: &str = "exitProgress";
    pub const EXIT_REQUESTED: &str = "exitRequested";
}

/// Closed set of canonical event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    KeyDown,
    KeyUp,
    MouseMove,
    MouseDown,
    MouseUp,
    MouseScroll,
}

/// Canonical modifier keys. Closed: platform bits outside this set are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [
        Modifier::Shift,
        Modifier::Control,
        Modifier::Alt,
        Modifier::Meta,
    ];

    fn bit(self) -> u8 {
        match self {
            Modifier::Shift => 0b0001,
            Modifier::Control => 0b0010,
            Modifier::Alt => 0b0100,
            Modifier::Meta => 0b1000,
        }
    }
}

/// Set of held modifiers. Serialized as a list, e.g. `["shift","control"]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = Modifiers::empty();
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

impl Serialize for Modifiers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<Modifier>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

/// Mouse buttons for MouseDown/MouseUp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

/// Key variant fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyData {
    /// Platform key code, kept for diagnostics only
    pub key_code: u32,
    /// Canonical key name (e.g. "ArrowRight", "KeyQ", "Escape")
    pub key: String,
    pub modifiers: Modifiers,
}

/// Pointer position in screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerData {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButtonData {
    pub x: f64,
    pub y: f64,
    pub button: MouseButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollData {
    pub x: f64,
    pub y: f64,
    /// Positive scrolls right
    pub delta_x: f64,
    /// Positive scrolls up
    pub delta_y: f64,
}

/// Variant payload, tagged on the wire by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventData {
    KeyDown(KeyData),
    KeyUp(KeyData),
    MouseMove(PointerData),
    MouseDown(ButtonData),
    MouseUp(ButtonData),
    MouseScroll(ScrollData),
}

/// One normalized input occurrence
///
/// Wire shape: `{type, timestamp, keyCode?, key?, modifiers?, x?, y?, button?, deltaX?, deltaY?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Milliseconds since the process epoch (monotonic)
    pub timestamp: u64,
    #[serde(flatten)]
    pub data: EventData,
}

impl CanonicalEvent {
    pub fn new(timestamp: u64, data: EventData) -> Self {
        Self { timestamp, data }
    }

    pub fn key_down(timestamp: u64, key: &str) -> Self {
        Self::new(
            timestamp,
            EventData::KeyDown(KeyData {
                key_code: 0,
                key: key.to_string(),
                modifiers: Modifiers::empty(),
            }),
        )
    }

    pub fn key_up(timestamp: u64, key: &str) -> Self {
        Self::new(
            timestamp,
            EventData::KeyUp(KeyData {
                key_code: 0,
                key: key.to_string(),
                modifiers: Modifiers::empty(),
            }),
        )
    }

    pub fn mouse_down(timestamp: u64, x: f64, y: f64, button: MouseButton) -> Self {
        Self::new(timestamp, EventData::MouseDown(ButtonData { x, y, button }))
    }

    pub fn mouse_move(timestamp: u64, x: f64, y: f64) -> Self {
        Self::new(timestamp, EventData::MouseMove(PointerData { x, y }))
    }

    pub fn kind(&self) -> EventKind {
        match self.data {
            EventData::KeyDown(_) => EventKind::KeyDown,
            EventData::KeyUp(_) => EventKind::KeyUp,
            EventData::MouseMove(_) => EventKind::MouseMove,
            EventData::MouseDown(_) => EventKind::MouseDown,
            EventData::MouseUp(_) => EventKind::MouseUp,
            EventData::MouseScroll(_) => EventKind::MouseScroll,
        }
    }

    /// Key fields, for either key kind
    pub fn key(&self) -> Option<&KeyData> {
        match &self.data {
            EventData::KeyDown(k) | EventData::KeyUp(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_key_down(&self) -> bool {
        matches!(self.data, EventData::KeyDown(_))
    }

    /// Screen position, for every mouse kind
    pub fn position(&self) -> Option<(f64, f64)> {
        match &self.data {
            EventData::MouseMove(p) => Some((p.x, p.y)),
            EventData::MouseDown(b) | EventData::MouseUp(b) => Some((b.x, b.y)),
            EventData::MouseScroll(s) => Some((s.x, s.y)),
            _ => None,
        }
    }
}

/// Which exit path a progress snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceKind {
    Keyboard,
    Mouse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressState {
    Idle,
    InProgress,
    Completed,
}

/// Immutable snapshot emitted on every exit-sequence transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitProgress {
    pub sequence_kind: SequenceKind,
    pub current_step: usize,
    pub total_steps: usize,
    #[serde(rename = "remainingMs", with = "duration_ms")]
    pub remaining_time: Duration,
    pub state: ProgressState,
}

/// Payload for the exitRequested signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    /// Path that completed
    pub sequence: SequenceKind,
    /// Timestamp of the completing event
    pub timestamp: u64,
}

/// Trait for emitting exit-sequence events
/// Allows mocking in tests while using channels in production
pub trait ExitEventEmitter: Send + Sync {
    fn emit_exit_progress(&self, progress: ExitProgress);
    fn emit_exit_requested(&self, request: ExitRequest);
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
