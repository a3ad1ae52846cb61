// Screen geometry for corner hit-testing
// The detector never guesses a resolution: an unknown or invalid size makes
// every corner test fail.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Validated screen dimensions in the same space as pointer coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenSize {
    width: f64,
    height: f64,
}

impl ScreenSize {
    /// Returns None for zero, negative or non-finite dimensions
    pub fn new(width: f64, height: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(width) && valid(height) {
            Some(Self { width, height })
        } else {
            None
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

impl<'de> Deserialize<'de> for ScreenSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            width: f64,
            height: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        ScreenSize::new(raw.width, raw.height).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid screen size {}x{}",
                raw.width, raw.height
            ))
        })
    }
}

/// Screen corners, in the order the mouse exit path visits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const CLOCKWISE: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    pub fn point(self, size: ScreenSize) -> (f64, f64) {
        match self {
            Corner::TopLeft => (0.0, 0.0),
            Corner::TopRight => (size.width, 0.0),
            Corner::BottomRight => (size.width, size.height),
            Corner::BottomLeft => (0.0, size.height),
        }
    }

    /// Whether (x, y) lies within `radius` pixels of this corner
    pub fn contains(self, size: ScreenSize, x: f64, y: f64, radius: f64) -> bool {
        let (cx, cy) = self.point(size);
        let (dx, dy) = (x - cx, y - cy);
        (dx * dx + dy * dy).sqrt() <= radius
    }
}

/// Source of the current screen size
pub trait ScreenGeometryProvider: Send + Sync {
    /// None means unknown
    fn screen_size(&self) -> Option<ScreenSize>;
}

/// Geometry reported by the host window, with an optional native fallback
#[derive(Clone, Default)]
pub struct SharedScreenGeometry {
    reported: Arc<RwLock<Option<ScreenSize>>>,
    fallback: Option<Arc<dyn ScreenGeometryProvider>>,
}

impl SharedScreenGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `fallback` until the host reports a size
    pub fn with_fallback(fallback: Arc<dyn ScreenGeometryProvider>) -> Self {
        Self {
            reported: Arc::new(RwLock::new(None)),
            fallback: Some(fallback),
        }
    }

    pub fn set(&self, size: ScreenSize) {
        crate::debug!("Screen size reported: {}x{}", size.width, size.height);
        *self.reported.write() = Some(size);
    }

    pub fn clear(&self) {
        *self.reported.write() = None;
    }
}

impl ScreenGeometryProvider for SharedScreenGeometry {
    fn screen_size(&self) -> Option<ScreenSize> {
        let reported = *self.reported.read();
        reported.or_else(|| self.fallback.as_ref().and_then(|f| f.screen_size()))
    }
}

/// Main display size queried from the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeScreenGeometry;

impl ScreenGeometryProvider for NativeScreenGeometry {
    #[cfg(target_os = "macos")]
    fn screen_size(&self) -> Option<ScreenSize> {
        let bounds = core_graphics::display::CGDisplay::main().bounds();
        ScreenSize::new(bounds.size.width, bounds.size.height)
    }

    #[cfg(target_os = "windows")]
    fn screen_size(&self) -> Option<ScreenSize> {
        use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        ScreenSize::new(width as f64, height as f64)
    }

    // evdev has no notion of a screen; the host has to report it
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    fn screen_size(&self) -> Option<ScreenSize> {
        None
    }
}
