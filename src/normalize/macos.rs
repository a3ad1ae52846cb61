//! macOS decode tables: CGEventType, CGKeyCode, CGEventFlags, NX media keys.

use super::keys::canonicalize;
use super::NormalizeError;
use crate::capture::raw::MacRawEvent;
use crate::events::{
    ButtonData, CanonicalEvent, EventData, KeyData, Modifier, Modifiers, MouseButton, PointerData,
    ScrollData,
};

// CGEventType values
pub const CG_EVENT_LEFT_MOUSE_DOWN: u32 = 1;
pub const CG_EVENT_LEFT_MOUSE_UP: u32 = 2;
pub const CG_EVENT_RIGHT_MOUSE_DOWN: u32 = 3;
pub const CG_EVENT_RIGHT_MOUSE_UP: u32 = 4;
pub const CG_EVENT_MOUSE_MOVED: u32 = 5;
pub const CG_EVENT_LEFT_MOUSE_DRAGGED: u32 = 6;
pub const CG_EVENT_RIGHT_MOUSE_DRAGGED: u32 = 7;
pub const CG_EVENT_KEY_DOWN: u32 = 10;
pub const CG_EVENT_KEY_UP: u32 = 11;
pub const CG_EVENT_FLAGS_CHANGED: u32 = 12;
pub const NX_SYSDEFINED: u32 = 14;
pub const CG_EVENT_SCROLL_WHEEL: u32 = 22;
pub const CG_EVENT_OTHER_MOUSE_DOWN: u32 = 25;
pub const CG_EVENT_OTHER_MOUSE_UP: u32 = 26;
pub const CG_EVENT_OTHER_MOUSE_DRAGGED: u32 = 27;

// Standard modifier flags from CGEvent
pub const CG_EVENT_FLAG_MASK_ALPHA_SHIFT: u64 = 0x00010000;
pub const CG_EVENT_FLAG_MASK_SHIFT: u64 = 0x00020000;
pub const CG_EVENT_FLAG_MASK_CONTROL: u64 = 0x00040000;
pub const CG_EVENT_FLAG_MASK_ALTERNATE: u64 = 0x00080000;
pub const CG_EVENT_FLAG_MASK_COMMAND: u64 = 0x00100000;
pub const CG_EVENT_FLAG_MASK_SECONDARY_FN: u64 = 0x00800000;

// Left/Right device flags (from IOKit NX_DEVICE*KEYMASK constants)
pub const NX_DEVICELCTLKEYMASK: u64 = 0x00000001;
pub const NX_DEVICELSHIFTKEYMASK: u64 = 0x00000002;
pub const NX_DEVICERSHIFTKEYMASK: u64 = 0x00000004;
pub const NX_DEVICELCMDKEYMASK: u64 = 0x00000008;
pub const NX_DEVICERCMDKEYMASK: u64 = 0x00000010;
pub const NX_DEVICELALTKEYMASK: u64 = 0x00000020;
pub const NX_DEVICERALTKEYMASK: u64 = 0x00000040;
pub const NX_DEVICERCTLKEYMASK: u64 = 0x00002000;

/// Media key codes from IOKit/hidsystem/ev_keymap.h (NX_KEYTYPE_*)
pub const NX_KEYTYPE_SOUND_UP: u32 = 0;
pub const NX_KEYTYPE_SOUND_DOWN: u32 = 1;
pub const NX_KEYTYPE_BRIGHTNESS_UP: u32 = 2;
pub const NX_KEYTYPE_BRIGHTNESS_DOWN: u32 = 3;
pub const NX_KEYTYPE_MUTE: u32 = 7;
pub const NX_KEYTYPE_PLAY: u32 = 16;
pub const NX_KEYTYPE_NEXT: u32 = 17;
pub const NX_KEYTYPE_PREVIOUS: u32 = 18;
pub const NX_KEYTYPE_FAST: u32 = 19;
pub const NX_KEYTYPE_REWIND: u32 = 20;
pub const NX_KEYTYPE_ILLUMINATION_UP: u32 = 21;
pub const NX_KEYTYPE_ILLUMINATION_DOWN: u32 = 22;

/// Decode CGEventFlags into the canonical modifier set
pub fn decode_modifiers(flags: u64) -> Modifiers {
    let mut mods = Modifiers::empty();
    if flags & CG_EVENT_FLAG_MASK_SHIFT != 0 {
        mods.insert(Modifier::Shift);
    }
    if flags & CG_EVENT_FLAG_MASK_CONTROL != 0 {
        mods.insert(Modifier::Control);
    }
    if flags & CG_EVENT_FLAG_MASK_ALTERNATE != 0 {
        mods.insert(Modifier::Alt);
    }
    if flags & CG_EVENT_FLAG_MASK_COMMAND != 0 {
        mods.insert(Modifier::Meta);
    }
    mods
}

/// Determine which modifier key changed and whether it is now held.
///
/// FlagsChanged carries no up/down bit, so the device-dependent flag for the
/// specific key is the source of truth. Returns None for key codes that are not
/// modifier keys.
pub fn modifier_key_state(key_code: u32, flags: u64) -> Option<(&'static str, bool)> {
    let state = match key_code {
        56 => ("Shift", flags & NX_DEVICELSHIFTKEYMASK != 0),
        60 => ("Shift", flags & NX_DEVICERSHIFTKEYMASK != 0),
        59 => ("Control", flags & NX_DEVICELCTLKEYMASK != 0),
        62 => ("Control", flags & NX_DEVICERCTLKEYMASK != 0),
        58 => ("Alt", flags & NX_DEVICELALTKEYMASK != 0),
        61 => ("Alt", flags & NX_DEVICERALTKEYMASK != 0),
        55 => ("Command", flags & NX_DEVICELCMDKEYMASK != 0),
        54 => ("Command", flags & NX_DEVICERCMDKEYMASK != 0),
        57 => ("CapsLock", flags & CG_EVENT_FLAG_MASK_ALPHA_SHIFT != 0),
        // Key code 63 is traditional fn, 179 is Globe key on newer Macs
        63 | 179 => ("fn", flags & CG_EVENT_FLAG_MASK_SECONDARY_FN != 0),
        _ => return None,
    };
    Some(state)
}

pub fn media_keycode_to_name(key_code: u32) -> String {
    match key_code {
        NX_KEYTYPE_SOUND_UP => "VolumeUp".to_string(),
        NX_KEYTYPE_SOUND_DOWN => "VolumeDown".to_string(),
        NX_KEYTYPE_MUTE => "Mute".to_string(),
        NX_KEYTYPE_BRIGHTNESS_UP => "BrightnessUp".to_string(),
        NX_KEYTYPE_BRIGHTNESS_DOWN => "BrightnessDown".to_string(),
        NX_KEYTYPE_PLAY => "PlayPause".to_string(),
        NX_KEYTYPE_NEXT => "NextTrack".to_string(),
        NX_KEYTYPE_PREVIOUS => "PreviousTrack".to_string(),
        NX_KEYTYPE_FAST => "FastForward".to_string(),
        NX_KEYTYPE_REWIND => "Rewind".to_string(),
        NX_KEYTYPE_ILLUMINATION_UP => "KeyboardBrightnessUp".to_string(),
        NX_KEYTYPE_ILLUMINATION_DOWN => "KeyboardBrightnessDown".to_string(),
        _ => format!("MediaKey({})", key_code),
    }
}

/// Platform key name for a CGKeyCode (ANSI layout)
pub fn keycode_to_name(key_code: u32) -> String {
    let name = match key_code {
        0 => "A",
        1 => "S",
        2 => "D",
        3 => "F",
        4 => "H",
        5 => "G",
        6 => "Z",
        7 => "X",
        8 => "C",
        9 => "V",
        11 => "B",
        12 => "Q",
        13 => "W",
        14 => "E",
        15 => "R",
        16 => "Y",
        17 => "T",
        31 => "O",
        32 => "U",
        34 => "I",
        35 => "P",
        37 => "L",
        38 => "J",
        40 => "K",
        45 => "N",
        46 => "M",

        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",

        30 => "]",
        33 => "[",
        39 => "'",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        47 => ".",
        50 => "`",

        36 => "Enter",
        48 => "Tab",
        49 => "Space",
        51 => "Backspace",
        53 => "Escape",

        54 | 55 => "Command",
        56 | 60 => "Shift",
        57 => "CapsLock",
        58 | 61 => "Alt",
        59 | 62 => "Control",
        63 | 179 => "fn",

        122 => "F1",
        120 => "F2",
        99 => "F3",
        118 => "F4",
        96 => "F5",
        97 => "F6",
        98 => "F7",
        100 => "F8",
        101 => "F9",
        109 => "F10",
        103 => "F11",
        111 => "F12",
        105 => "F13",
        107 => "F14",
        113 => "F15",
        106 => "F16",
        64 => "F17",
        79 => "F18",
        80 => "F19",

        123 => "Left",
        124 => "Right",
        125 => "Down",
        126 => "Up",
        115 => "Home",
        116 => "PageUp",
        117 => "Delete", // Forward Delete
        119 => "End",
        121 => "PageDown",

        65 => "Numpad.",
        67 => "Numpad*",
        69 => "Numpad+",
        71 => "NumpadClear",
        75 => "Numpad/",
        76 => "NumpadEnter",
        78 => "Numpad-",
        81 => "Numpad=",
        82 => "Numpad0",
        83 => "Numpad1",
        84 => "Numpad2",
        85 => "Numpad3",
        86 => "Numpad4",
        87 => "Numpad5",
        88 => "Numpad6",
        89 => "Numpad7",
        91 => "Numpad8",
        92 => "Numpad9",

        10 => "Section", // ISO keyboards
        52 => "International",
        102 => "Help",
        110 => "ContextMenu",

        _ => return format!("Key({})", key_code),
    };
    name.to_string()
}

fn key_data(key_code: u32, name: &str, flags: u64) -> KeyData {
    KeyData {
        key_code,
        key: canonicalize(name),
        modifiers: decode_modifiers(flags),
    }
}

fn unrecognized(raw: &MacRawEvent, detail: &str) -> NormalizeError {
    NormalizeError::UnrecognizedEventShape {
        platform: "macos",
        detail: format!("{} (event_type={}, key_code={})", detail, raw.event_type, raw.key_code),
    }
}

pub fn normalize(raw: &MacRawEvent) -> Result<CanonicalEvent, NormalizeError> {
    let button_at = |button| ButtonData {
        x: raw.x,
        y: raw.y,
        button,
    };

    let data = match raw.event_type {
        CG_EVENT_KEY_DOWN => {
            EventData::KeyDown(key_data(raw.key_code, &keycode_to_name(raw.key_code), raw.flags))
        }
        CG_EVENT_KEY_UP => {
            EventData::KeyUp(key_data(raw.key_code, &keycode_to_name(raw.key_code), raw.flags))
        }
        CG_EVENT_FLAGS_CHANGED => {
            let (name, pressed) = modifier_key_state(raw.key_code, raw.flags)
                .ok_or_else(|| unrecognized(raw, "flags changed for non-modifier key"))?;
            let data = key_data(raw.key_code, name, raw.flags);
            if pressed {
                EventData::KeyDown(data)
            } else {
                EventData::KeyUp(data)
            }
        }
        NX_SYSDEFINED => {
            let data1 = raw
                .media_data
                .ok_or_else(|| unrecognized(raw, "system-defined event without media data"))?;
            // data1: upper 16 bits = key code, lower 16 bits = flags
            let key_code = ((data1 as u64 & 0xFFFF_0000) >> 16) as u32;
            let key_flags = (data1 as u64 & 0x0000_FFFF) as u32;
            let data = key_data(key_code, &media_keycode_to_name(key_code), raw.flags);
            // 0xA = pressed, 0xB = released
            match (key_flags & 0xFF00) >> 8 {
                0x0A => EventData::KeyDown(data),
                0x0B => EventData::KeyUp(data),
                _ => return Err(unrecognized(raw, "media key with unknown state")),
            }
        }
        CG_EVENT_LEFT_MOUSE_DOWN => EventData::MouseDown(button_at(MouseButton::Left)),
        CG_EVENT_LEFT_MOUSE_UP => EventData::MouseUp(button_at(MouseButton::Left)),
        CG_EVENT_RIGHT_MOUSE_DOWN => EventData::MouseDown(button_at(MouseButton::Right)),
        CG_EVENT_RIGHT_MOUSE_UP => EventData::MouseUp(button_at(MouseButton::Right)),
        CG_EVENT_OTHER_MOUSE_DOWN | CG_EVENT_OTHER_MOUSE_UP => {
            let button = if raw.button_number == 2 {
                MouseButton::Middle
            } else {
                MouseButton::Other
            };
            if raw.event_type == CG_EVENT_OTHER_MOUSE_DOWN {
                EventData::MouseDown(button_at(button))
            } else {
                EventData::MouseUp(button_at(button))
            }
        }
        CG_EVENT_MOUSE_MOVED
        | CG_EVENT_LEFT_MOUSE_DRAGGED
        | CG_EVENT_RIGHT_MOUSE_DRAGGED
        | CG_EVENT_OTHER_MOUSE_DRAGGED => EventData::MouseMove(PointerData { x: raw.x, y: raw.y }),
        CG_EVENT_SCROLL_WHEEL => EventData::MouseScroll(ScrollData {
            x: raw.x,
            y: raw.y,
            // Axis 2 is positive towards the left
            delta_x: -(raw.scroll_delta_x as f64),
            delta_y: raw.scroll_delta_y as f64,
        }),
        _ => return Err(unrecognized(raw, "unknown event type")),
    };

    Ok(CanonicalEvent::new(raw.timestamp, data))
}
