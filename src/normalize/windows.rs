//! Windows decode tables: WM_* hook messages, virtual-key codes, packed modifiers.

use super::keys::canonicalize;
use super::NormalizeError;
use crate::capture::raw::{
    WindowsRawEvent, WIN_MOD_ALT, WIN_MOD_CONTROL, WIN_MOD_SHIFT, WIN_MOD_WIN,
};
use crate::events::{
    ButtonData, CanonicalEvent, EventData, KeyData, Modifier, Modifiers, MouseButton, PointerData,
    ScrollData,
};

pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONDOWN: u32 = 0x0204;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_MBUTTONDOWN: u32 = 0x0207;
pub const WM_MBUTTONUP: u32 = 0x0208;
pub const WM_MOUSEWHEEL: u32 = 0x020A;
pub const WM_XBUTTONDOWN: u32 = 0x020B;
pub const WM_XBUTTONUP: u32 = 0x020C;
pub const WM_MOUSEHWHEEL: u32 = 0x020E;

pub const WHEEL_DELTA: f64 = 120.0;

pub fn decode_modifiers(state: u8) -> Modifiers {
    let mut mods = Modifiers::empty();
    if state & WIN_MOD_SHIFT != 0 {
        mods.insert(Modifier::Shift);
    }
    if state & WIN_MOD_CONTROL != 0 {
        mods.insert(Modifier::Control);
    }
    if state & WIN_MOD_ALT != 0 {
        mods.insert(Modifier::Alt);
    }
    if state & WIN_MOD_WIN != 0 {
        mods.insert(Modifier::Meta);
    }
    mods
}

/// Platform key name for a virtual-key code
pub fn vk_to_name(vk: u32) -> String {
    match vk {
        0x30..=0x39 => char::from(vk as u8).to_string(),
        // Letters are reported lowercase
        0x41..=0x5A => char::from(vk as u8 + 32).to_string(),
        0x70..=0x87 => format!("F{}", vk - 0x6F),
        _ => {
            let name = match vk {
                0x08 => "Backspace",
                0x09 => "Tab",
                0x0D => "Return",
                0x14 => "CapsLock",
                0x1B => "Escape",
                0x20 => "Space",
                0x21 => "PageUp",
                0x22 => "PageDown",
                0x23 => "End",
                0x24 => "Home",
                0x25 => "Left",
                0x26 => "Up",
                0x27 => "Right",
                0x28 => "Down",
                0x2D => "Insert",
                0x2E => "Delete",
                0x10 | 0xA0 | 0xA1 => "Shift",
                0x11 | 0xA2 | 0xA3 => "Control",
                0x12 | 0xA4 | 0xA5 => "Alt",
                0x5B | 0x5C => "Meta",
                0x5D => "ContextMenu",
                _ => return format!("Key{}", vk),
            };
            name.to_string()
        }
    }
}

fn unrecognized(raw: &WindowsRawEvent, detail: &str) -> NormalizeError {
    NormalizeError::UnrecognizedEventShape {
        platform: "windows",
        detail: format!("{} (message=0x{:04X})", detail, raw.message),
    }
}

/// Signed high word of mouseData
fn wheel_steps(mouse_data: u32) -> f64 {
    ((mouse_data >> 16) as u16 as i16) as f64 / WHEEL_DELTA
}

pub fn normalize(raw: &WindowsRawEvent) -> Result<CanonicalEvent, NormalizeError> {
    let (x, y) = (raw.x as f64, raw.y as f64);
    let key = || KeyData {
        key_code: raw.vk_code,
        key: canonicalize(&vk_to_name(raw.vk_code)),
        modifiers: decode_modifiers(raw.modifier_state),
    };
    let button_at = |button| ButtonData { x, y, button };

    let data = match raw.message {
        WM_KEYDOWN | WM_SYSKEYDOWN => EventData::KeyDown(key()),
        WM_KEYUP | WM_SYSKEYUP => EventData::KeyUp(key()),
        WM_MOUSEMOVE => EventData::MouseMove(PointerData { x, y }),
        WM_LBUTTONDOWN => EventData::MouseDown(button_at(MouseButton::Left)),
        WM_LBUTTONUP => EventData::MouseUp(button_at(MouseButton::Left)),
        WM_RBUTTONDOWN => EventData::MouseDown(button_at(MouseButton::Right)),
        WM_RBUTTONUP => EventData::MouseUp(button_at(MouseButton::Right)),
        WM_MBUTTONDOWN => EventData::MouseDown(button_at(MouseButton::Middle)),
        WM_MBUTTONUP => EventData::MouseUp(button_at(MouseButton::Middle)),
        WM_XBUTTONDOWN => EventData::MouseDown(button_at(MouseButton::Other)),
        WM_XBUTTONUP => EventData::MouseUp(button_at(MouseButton::Other)),
        WM_MOUSEWHEEL => EventData::MouseScroll(ScrollData {
            x,
            y,
            delta_x: 0.0,
            delta_y: wheel_steps(raw.mouse_data),
        }),
        WM_MOUSEHWHEEL => EventData::MouseScroll(ScrollData {
            x,
            y,
            delta_x: wheel_steps(raw.mouse_data),
            delta_y: 0.0,
        }),
        _ => return Err(unrecognized(raw, "unknown hook message")),
    };

    Ok(CanonicalEvent::new(raw.timestamp, data))
}
