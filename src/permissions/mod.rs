// Permission handling
// Absence of a permission is a normal boolean outcome, not an error. Callers
// check before starting capture and re-poll after a request, since the OS
// dialogs never block.

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;

use crate::capture::CaptureError;
use std::collections::BTreeMap;

/// Permission name to granted flag. The key set is platform-defined.
pub type PermissionMap = BTreeMap<String, bool>;

pub const ACCESSIBILITY: &str = "accessibility";
pub const INPUT_GROUP: &str = "inputGroup";

/// Query and request the authorization native capture needs
pub trait PermissionManager: Send + Sync {
    fn check_permissions(&self) -> PermissionMap;

    /// Trigger the OS request flow where one exists. Returns immediately with
    /// whether the permission is granted right now.
    fn request_permissions(&self) -> bool;
}

/// True when every listed permission is granted (an empty map means none needed)
pub fn all_granted(map: &PermissionMap) -> bool {
    map.values().all(|granted| *granted)
}

/// How to grant a named permission, shown to the user
pub fn hint_for(permission: &str) -> &'static str {
    match permission {
        ACCESSIBILITY => "Grant access in System Settings > Privacy & Security > Accessibility, then start capture again.",
        INPUT_GROUP => "Add your user to the 'input' group (sudo usermod -aG input $USER), then log out and back in.",
        _ => "Grant the permission in your system settings, then start capture again.",
    }
}

/// Typed error for a missing permission
pub fn permission_denied(permission: &str) -> CaptureError {
    CaptureError::PermissionDenied {
        permission: permission.to_string(),
        hint: hint_for(permission).to_string(),
    }
}

/// Permissions of the running platform
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePermissions;

impl PermissionManager for NativePermissions {
    fn check_permissions(&self) -> PermissionMap {
        #[allow(unused_mut)]
        let mut map = PermissionMap::new();
        #[cfg(target_os = "macos")]
        map.insert(
            ACCESSIBILITY.to_string(),
            macos::check_accessibility_permission(),
        );
        #[cfg(target_os = "linux")]
        map.insert(INPUT_GROUP.to_string(), linux::check_input_access());
        // Low-level hooks on Windows need no grant
        map
    }

    fn request_permissions(&self) -> bool {
        #[cfg(target_os = "macos")]
        {
            macos::check_accessibility_permission_with_prompt()
        }
        #[cfg(target_os = "linux")]
        {
            // Group membership cannot be requested from a running process
            let granted = linux::check_input_access();
            if !granted {
                crate::warn!("{}", hint_for(INPUT_GROUP));
            }
            granted
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            true
        }
    }
}
