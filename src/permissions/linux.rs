// Input device access on Linux
// Grabbing evdev devices needs read access to /dev/input/event*, normally
// granted through membership of the `input` group.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub const INPUT_DIR: &str = "/dev/input";

/// Paths of all evdev event nodes in `dir`, sorted
pub fn event_device_paths(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .collect();
    paths.sort();
    paths
}

fn is_readable(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK) == 0 }
}

/// True when at least one event node in `dir` can be opened for reading
pub fn has_readable_device(dir: &Path) -> bool {
    event_device_paths(dir).iter().any(|p| is_readable(p))
}

pub fn check_input_access() -> bool {
    has_readable_device(Path::new(INPUT_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_only_event_nodes_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["event3", "event10", "mouse0", "js0", "by-id"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let names: Vec<String> = event_device_paths(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["event10", "event3"]);
    }

    #[test]
    fn test_readable_device_detected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_readable_device(dir.path()));
        File::create(dir.path().join("event0")).unwrap();
        assert!(has_readable_device(dir.path()));
    }

    #[test]
    fn test_missing_directory_means_no_access() {
        assert!(!has_readable_device(Path::new("/nonexistent/input")));
    }
}
