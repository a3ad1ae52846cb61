//! Linux decode tables: evdev event types and codes, X11-style modifier mask.

use super::keys::canonicalize;
use super::NormalizeError;
use crate::capture::raw::{
    LinuxRawEvent, X11_CONTROL_MASK, X11_MOD1_MASK, X11_MOD4_MASK, X11_SHIFT_MASK,
};
use crate::events::{
    ButtonData, CanonicalEvent, EventData, KeyData, Modifier, Modifiers, MouseButton, PointerData,
    ScrollData,
};

pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;

pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_WHEEL: u16 = 0x08;

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
/// Last side/extra button code forwarded by the reader (BTN_TASK)
pub const BTN_TASK: u16 = 0x117;

// EV_KEY values
const KEY_RELEASED: i32 = 0;
const KEY_PRESSED: i32 = 1;
const KEY_REPEAT: i32 = 2;

pub fn decode_modifiers(mask: u32) -> Modifiers {
    let mut mods = Modifiers::empty();
    if mask & X11_SHIFT_MASK != 0 {
        mods.insert(Modifier::Shift);
    }
    if mask & X11_CONTROL_MASK != 0 {
        mods.insert(Modifier::Control);
    }
    if mask & X11_MOD1_MASK != 0 {
        mods.insert(Modifier::Alt);
    }
    if mask & X11_MOD4_MASK != 0 {
        mods.insert(Modifier::Meta);
    }
    mods
}

/// Platform key name for an evdev key code (US layout)
pub fn keycode_to_name(code: u16) -> String {
    let name = match code {
        1 => "Escape",
        2 => "1",
        3 => "2",
        4 => "3",
        5 => "4",
        6 => "5",
        7 => "6",
        8 => "7",
        9 => "8",
        10 => "9",
        11 => "0",
        12 => "-",
        13 => "=",
        14 => "Backspace",
        15 => "Tab",
        16 => "q",
        17 => "w",
        18 => "e",
        19 => "r",
        20 => "t",
        21 => "y",
        22 => "u",
        23 => "i",
        24 => "o",
        25 => "p",
        26 => "[",
        27 => "]",
        28 => "Return",
        29 | 97 => "Control",
        30 => "a",
        31 => "s",
        32 => "d",
        33 => "f",
        34 => "g",
        35 => "h",
        36 => "j",
        37 => "k",
        38 => "l",
        39 => ";",
        40 => "'",
        41 => "`",
        42 | 54 => "Shift",
        43 => "\\",
        44 => "z",
        45 => "x",
        46 => "c",
        47 => "v",
        48 => "b",
        49 => "n",
        50 => "m",
        51 => ",",
        52 => ".",
        53 => "/",
        55 => "Numpad*",
        56 | 100 => "Alt",
        57 => "Space",
        58 => "CapsLock",
        59 => "F1",
        60 => "F2",
        61 => "F3",
        62 => "F4",
        63 => "F5",
        64 => "F6",
        65 => "F7",
        66 => "F8",
        67 => "F9",
        68 => "F10",
        87 => "F11",
        88 => "F12",
        96 => "NumpadEnter",
        102 => "Home",
        103 => "Up",
        104 => "PageUp",
        105 => "Left",
        106 => "Right",
        107 => "End",
        108 => "Down",
        109 => "PageDown",
        110 => "Insert",
        111 => "Delete",
        113 => "Mute",
        114 => "VolumeDown",
        115 => "VolumeUp",
        125 | 126 => "Super",
        127 => "ContextMenu",
        163 => "NextTrack",
        164 => "PlayPause",
        165 => "PreviousTrack",
        224 => "BrightnessDown",
        225 => "BrightnessUp",
        _ => return format!("Key{}", code),
    };
    name.to_string()
}

fn button_for(code: u16) -> Option<MouseButton> {
    match code {
        BTN_LEFT => Some(MouseButton::Left),
        BTN_RIGHT => Some(MouseButton::Right),
        BTN_MIDDLE => Some(MouseButton::Middle),
        c if c > BTN_MIDDLE && c <= BTN_TASK => Some(MouseButton::Other),
        _ => None,
    }
}

fn unrecognized(raw: &LinuxRawEvent, detail: &str) -> NormalizeError {
    NormalizeError::UnrecognizedEventShape {
        platform: "linux",
        detail: format!(
            "{} (type={}, code={}, value={})",
            detail, raw.ev_type, raw.code, raw.value
        ),
    }
}

pub fn normalize(raw: &LinuxRawEvent) -> Result<CanonicalEvent, NormalizeError> {
    let (x, y) = (raw.x, raw.y);

    let data = match raw.ev_type {
        EV_KEY => {
            // Auto-repeat is reported as another press, never as release+press
            let pressed = match raw.value {
                KEY_PRESSED | KEY_REPEAT => true,
                KEY_RELEASED => false,
                _ => return Err(unrecognized(raw, "key event with unknown value")),
            };
            if let Some(button) = button_for(raw.code) {
                let data = ButtonData { x, y, button };
                if pressed {
                    EventData::MouseDown(data)
                } else {
                    EventData::MouseUp(data)
                }
            } else if raw.code < 0x100 {
                let data = KeyData {
                    key_code: raw.code as u32,
                    key: canonicalize(&keycode_to_name(raw.code)),
                    modifiers: decode_modifiers(raw.modifier_mask),
                };
                if pressed {
                    EventData::KeyDown(data)
                } else {
                    EventData::KeyUp(data)
                }
            } else {
                return Err(unrecognized(raw, "key code outside keyboard and button ranges"));
            }
        }
        EV_REL => match raw.code {
            REL_X | REL_Y => EventData::MouseMove(PointerData { x, y }),
            REL_WHEEL => EventData::MouseScroll(ScrollData {
                x,
                y,
                delta_x: 0.0,
                delta_y: raw.value as f64,
            }),
            REL_HWHEEL => EventData::MouseScroll(ScrollData {
                x,
                y,
                delta_x: raw.value as f64,
                delta_y: 0.0,
            }),
            _ => return Err(unrecognized(raw, "unknown relative axis")),
        },
        _ => return Err(unrecognized(raw, "unknown event type")),
    };

    Ok(CanonicalEvent::new(raw.timestamp, data))
}
