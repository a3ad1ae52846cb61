// Accessibility permission handling for macOS
// A default (suppressing) CGEventTap requires Accessibility permission

use crate::capture::CaptureError;

// FFI bindings for Accessibility permission checking
#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;

    /// With kAXTrustedCheckOptionPrompt set, shows the system dialog that adds
    /// the app to the Accessibility list
    fn AXIsProcessTrustedWithOptions(options: *const std::ffi::c_void) -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFDictionaryCreate(
        allocator: *const std::ffi::c_void,
        keys: *const *const std::ffi::c_void,
        values: *const *const std::ffi::c_void,
        num_values: isize,
        key_callbacks: *const std::ffi::c_void,
        value_callbacks: *const std::ffi::c_void,
    ) -> *const std::ffi::c_void;

    fn CFRelease(cf: *const std::ffi::c_void);

    static kCFTypeDictionaryKeyCallBacks: std::ffi::c_void;
    static kCFTypeDictionaryValueCallBacks: std::ffi::c_void;
    static kCFBooleanTrue: *const std::ffi::c_void;
    static kAXTrustedCheckOptionPrompt: *const std::ffi::c_void;
}

/// Environment variable that forces the prompt in debug builds
pub const FORCE_PROMPT_ENV: &str = "KEYBOARD_PLAYGROUND_ACCESSIBILITY_PROMPT";

pub fn check_accessibility_permission() -> bool {
    // SAFETY: AXIsProcessTrusted only reads the trust state
    unsafe { AXIsProcessTrusted() }
}

/// Check, showing the system prompt if not yet trusted. Does not wait for the user.
pub fn check_accessibility_permission_with_prompt() -> bool {
    unsafe {
        let keys = [kAXTrustedCheckOptionPrompt];
        let values = [kCFBooleanTrue];

        let options = CFDictionaryCreate(
            std::ptr::null(),
            keys.as_ptr(),
            values.as_ptr(),
            1,
            &kCFTypeDictionaryKeyCallBacks,
            &kCFTypeDictionaryValueCallBacks,
        );

        let result = AXIsProcessTrustedWithOptions(options);

        if !options.is_null() {
            CFRelease(options);
        }

        result
    }
}

/// Gate for starting the tap.
///
/// Debug builds check silently so dev and test runs do not pop dialogs, unless
/// `KEYBOARD_PLAYGROUND_ACCESSIBILITY_PROMPT` is set. Release builds prompt.
pub fn ensure_accessibility() -> Result<(), CaptureError> {
    let trusted = if cfg!(debug_assertions) && std::env::var(FORCE_PROMPT_ENV).is_err() {
        check_accessibility_permission()
    } else {
        check_accessibility_permission_with_prompt()
    };
    crate::info!("Accessibility permission check: {}", trusted);

    if trusted {
        Ok(())
    } else {
        Err(super::permission_denied(super::ACCESSIBILITY))
    }
}
