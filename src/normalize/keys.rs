//! Key-name canonicalization.
//!
//! Every backend reports keys in its own spelling ("Left" from AppKit tables,
//! "q" from X11/Win32 style tables, "Command" vs "Super" vs "Meta"). Consumers
//! match on one vocabulary only, so the few spellings that differ are mapped
//! here. Everything not in the table passes through unchanged.

/// Canonical names for the special keys that have per-platform spellings.
/// Lookup is ASCII case-insensitive on the left column.
const ALIASES: &[(&str, &str)] = &[
    ("left", "ArrowLeft"),
    ("leftarrow", "ArrowLeft"),
    ("arrowleft", "ArrowLeft"),
    ("right", "ArrowRight"),
    ("rightarrow", "ArrowRight"),
    ("arrowright", "ArrowRight"),
    ("up", "ArrowUp"),
    ("uparrow", "ArrowUp"),
    ("arrowup", "ArrowUp"),
    ("down", "ArrowDown"),
    ("downarrow", "ArrowDown"),
    ("arrowdown", "ArrowDown"),
    ("esc", "Escape"),
    ("escape", "Escape"),
    ("return", "Enter"),
    ("enter", "Enter"),
    ("tab", "Tab"),
    ("space", "Space"),
    (" ", "Space"),
    ("backspace", "Backspace"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("prior", "PageUp"),
    ("pagedown", "PageDown"),
    ("next", "PageDown"),
    ("capslock", "CapsLock"),
    ("shift", "Shift"),
    ("ctrl", "Control"),
    ("control", "Control"),
    ("alt", "Alt"),
    ("option", "Alt"),
    ("menu", "Alt"),
    ("meta", "Meta"),
    ("command", "Meta"),
    ("cmd", "Meta"),
    ("super", "Meta"),
    ("win", "Meta"),
    ("windows", "Meta"),
    ("fn", "Fn"),
    ("function", "Fn"),
];

/// Map a platform key name to the canonical vocabulary.
///
/// Idempotent: `canonicalize(&canonicalize(k)) == canonicalize(k)`.
pub fn canonicalize(name: &str) -> String {
    if let Some((_, canonical)) = ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
    {
        return (*canonical).to_string();
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return format!("Key{}", c.to_ascii_uppercase());
        }
        if c.is_ascii_digit() {
            return format!("Digit{}", c);
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_spellings_converge() {
        for name in ["Left", "LEFT", "LeftArrow", "ArrowLeft", "left"] {
            assert_eq!(canonicalize(name), "ArrowLeft", "input {:?}", name);
        }
        assert_eq!(canonicalize("Right"), "ArrowRight");
        assert_eq!(canonicalize("Up"), "ArrowUp");
        assert_eq!(canonicalize("Down"), "ArrowDown");
    }

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(canonicalize("q"), "KeyQ");
        assert_eq!(canonicalize("Q"), "KeyQ");
        assert_eq!(canonicalize("KeyQ"), "KeyQ");
        assert_eq!(canonicalize("7"), "Digit7");
    }

    #[test]
    fn test_modifier_spellings() {
        assert_eq!(canonicalize("Command"), "Meta");
        assert_eq!(canonicalize("Super"), "Meta");
        assert_eq!(canonicalize("Ctrl"), "Control");
        assert_eq!(canonicalize("Option"), "Alt");
        assert_eq!(canonicalize("fn"), "Fn");
    }

    #[test]
    fn test_unknown_names_pass_through() {
        assert_eq!(canonicalize("F5"), "F5");
        assert_eq!(canonicalize("VolumeUp"), "VolumeUp");
        assert_eq!(canonicalize("Key(255)"), "Key(255)");
        assert_eq!(canonicalize("["), "[");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_canonical_names_map_to_themselves() {
        for (_, canonical) in ALIASES {
            assert_eq!(canonicalize(canonical), *canonical);
        }
    }
}
