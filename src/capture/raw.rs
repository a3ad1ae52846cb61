//! Provisional, platform-shaped event records.
//!
//! Native callbacks only copy integers out of the OS notification into one of
//! these records, stamp it and enqueue it. Every table lookup and decoding step
//! happens later in the normalizer, off the callback thread. The records are
//! compiled on every platform so the decoding can be tested anywhere.

/// macOS record copied out of a CGEvent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacRawEvent {
    pub timestamp: u64,
    /// CGEventType as integer
    pub event_type: u32,
    /// CGKeyCode (keyboard and FlagsChanged events)
    pub key_code: u32,
    /// Raw CGEventFlags bits
    pub flags: u64,
    pub x: f64,
    pub y: f64,
    /// kCGMouseEventButtonNumber
    pub button_number: i64,
    /// kCGScrollWheelEventDeltaAxis2
    pub scroll_delta_x: i64,
    /// kCGScrollWheelEventDeltaAxis1
    pub scroll_delta_y: i64,
    /// NSEvent data1 for NSSystemDefined aux-control (media key) events
    pub media_data: Option<i64>,
}

/// Windows record copied out of KBDLLHOOKSTRUCT / MSLLHOOKSTRUCT
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowsRawEvent {
    pub timestamp: u64,
    /// WM_* message identifier (the hook's wParam)
    pub message: u32,
    pub vk_code: u32,
    /// Packed GetAsyncKeyState results, see `WIN_MOD_*`
    pub modifier_state: u8,
    pub x: i32,
    pub y: i32,
    /// MSLLHOOKSTRUCT.mouseData (wheel delta / X button in the high word)
    pub mouse_data: u32,
}

pub const WIN_MOD_SHIFT: u8 = 0b0001;
pub const WIN_MOD_CONTROL: u8 = 0b0010;
pub const WIN_MOD_ALT: u8 = 0b0100;
pub const WIN_MOD_WIN: u8 = 0b1000;

/// Linux record built from an evdev input_event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinuxRawEvent {
    pub timestamp: u64,
    pub ev_type: u16,
    pub code: u16,
    pub value: i32,
    /// Held modifiers tracked by the reader, X11 mask layout (see `X11_*`)
    pub modifier_mask: u32,
    /// Pointer position tracked by the reader
    pub x: f64,
    pub y: f64,
}

pub const X11_SHIFT_MASK: u32 = 1 << 0;
pub const X11_LOCK_MASK: u32 = 1 << 1;
pub const X11_CONTROL_MASK: u32 = 1 << 2;
pub const X11_MOD1_MASK: u32 = 1 << 3;
pub const X11_MOD2_MASK: u32 = 1 << 4;
pub const X11_MOD4_MASK: u32 = 1 << 6;

/// One provisional record per OS notification
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    Mac(MacRawEvent),
    Windows(WindowsRawEvent),
    Linux(LinuxRawEvent),
}

impl RawEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            RawEvent::Mac(e) => e.timestamp,
            RawEvent::Windows(e) => e.timestamp,
            RawEvent::Linux(e) => e.timestamp,
        }
    }
}
