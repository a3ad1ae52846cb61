// CGEventTap-based input capture for macOS
//
// One active tap at the HID location swallows keyboard, media key and mouse
// events for the whole session. The callback copies fields into a MacRawEvent
// and returns null; decoding happens later in the normalizer.
//
// CGEventTap requires Accessibility permission (System Settings > Privacy & Security > Accessibility)

use super::raw::{MacRawEvent, RawEvent};
use super::{deliver, CaptureError, NativeCapture, RawEventSink, SLOW_CALLBACK_THRESHOLD};
use crate::normalize::macos as mac;
use crate::permissions::macos::ensure_accessibility;
#[allow(deprecated)]
use cocoa::appkit::NSEvent;
#[allow(deprecated)]
use cocoa::base::nil;
use core_foundation::base::TCFType;
use core_foundation::mach_port::{CFMachPort, CFMachPortRef};
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopStop};
use core_graphics::event::{
    CGEvent, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventTapProxy,
    CGEventType, EventField,
};
use foreign_types::ForeignType;
use parking_lot::Mutex;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// CGEventMask type for raw FFI
type CGEventMask = u64;

/// How long `start` waits for the tap thread to report
const READY_TIMEOUT: Duration = Duration::from_secs(2);

// Delivered to the callback when the system turns the tap off
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

const NX_SUBTYPE_AUX_CONTROL_BUTTONS: i16 = 8;

/// Internal callback type for raw FFI
type CGEventTapCallBackInternal = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: CGEventType,
    event: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: CGEventTapLocation,
        place: CGEventTapPlacement,
        options: CGEventTapOptions,
        events_of_interest: CGEventMask,
        callback: CGEventTapCallBackInternal,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// Everything the callback touches. Owned by the tap thread.
struct TapContext {
    sink: RawEventSink,
    /// Set once the tap exists, so the callback can re-enable it
    tap: AtomicPtr<c_void>,
}

/// Handle to the CGEventTap capture thread
pub struct CGEventTapCapture {
    running: Arc<AtomicBool>,
    /// Run loop of the tap thread, for stopping
    run_loop: Arc<Mutex<Option<CFRunLoop>>>,
    thread: Option<JoinHandle<()>>,
}

impl CGEventTapCapture {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            run_loop: Arc::new(Mutex::new(None)),
            thread: None,
        }
    }

    fn stop_run_loop(&self) {
        if let Some(run_loop) = self.run_loop.lock().as_ref() {
            unsafe {
                CFRunLoopStop(run_loop.as_concrete_TypeRef());
            }
        }
    }
}

impl Default for CGEventTapCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeCapture for CGEventTapCapture {
    fn start(&mut self, sink: RawEventSink) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }
        ensure_accessibility()?;

        let (ready_tx, ready_rx) = mpsc::channel();
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let run_loop = self.run_loop.clone();

        let thread = thread::Builder::new()
            .name("cgeventtap".to_string())
            .spawn(move || run_tap_loop(running, run_loop, sink, ready_tx))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::HookInstallFailed(format!("Failed to spawn tap thread: {}", e))
            })?;

        let ready = ready_rx.recv_timeout(READY_TIMEOUT).unwrap_or_else(|_| {
            Err(CaptureError::HookInstallFailed(
                "Event tap did not start in time".to_string(),
            ))
        });

        match ready {
            Ok(()) => {
                self.thread = Some(thread);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.stop_run_loop();
                let _ = thread.join();
                *self.run_loop.lock() = None;
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop_run_loop();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                crate::error!("CGEventTap thread panicked");
            }
        }
        *self.run_loop.lock() = None;
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CGEventTapCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn event_mask() -> CGEventMask {
    [
        mac::CG_EVENT_LEFT_MOUSE_DOWN,
        mac::CG_EVENT_LEFT_MOUSE_UP,
        mac::CG_EVENT_RIGHT_MOUSE_DOWN,
        mac::CG_EVENT_RIGHT_MOUSE_UP,
        mac::CG_EVENT_MOUSE_MOVED,
        mac::CG_EVENT_LEFT_MOUSE_DRAGGED,
        mac::CG_EVENT_RIGHT_MOUSE_DRAGGED,
        mac::CG_EVENT_KEY_DOWN,
        mac::CG_EVENT_KEY_UP,
        mac::CG_EVENT_FLAGS_CHANGED,
        mac::NX_SYSDEFINED,
        mac::CG_EVENT_SCROLL_WHEEL,
        mac::CG_EVENT_OTHER_MOUSE_DOWN,
        mac::CG_EVENT_OTHER_MOUSE_UP,
        mac::CG_EVENT_OTHER_MOUSE_DRAGGED,
    ]
    .iter()
    .fold(0, |mask, event_type| mask | (1 << *event_type as u64))
}

/// Body of the tap thread: create the tap, report readiness, run until stopped
fn run_tap_loop(
    running: Arc<AtomicBool>,
    shared_run_loop: Arc<Mutex<Option<CFRunLoop>>>,
    sink: RawEventSink,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) {
    let context = Box::into_raw(Box::new(TapContext {
        sink,
        tap: AtomicPtr::new(std::ptr::null_mut()),
    }));

    // Default options make the tap active, so returning null swallows the event
    let tap_ref = unsafe {
        CGEventTapCreate(
            CGEventTapLocation::HID,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            event_mask(),
            tap_callback,
            context as *mut c_void,
        )
    };

    if tap_ref.is_null() {
        unsafe {
            drop(Box::from_raw(context));
        }
        let _ = ready.send(Err(CaptureError::HookInstallFailed(
            "CGEventTapCreate returned null".to_string(),
        )));
        return;
    }

    let mach_port = unsafe { CFMachPort::wrap_under_create_rule(tap_ref) };
    unsafe {
        (*context)
            .tap
            .store(mach_port.as_concrete_TypeRef() as *mut c_void, Ordering::SeqCst);
    }

    let run_loop_source = match mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            unsafe {
                drop(Box::from_raw(context));
            }
            let _ = ready.send(Err(CaptureError::HookInstallFailed(
                "Failed to create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    *shared_run_loop.lock() = Some(run_loop.clone());
    run_loop.add_source(&run_loop_source, unsafe { kCFRunLoopDefaultMode });
    unsafe {
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), true);
    }

    crate::info!("CGEventTap input capture started");
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopDefaultMode },
            Duration::from_secs(1),
            false,
        );
    }

    unsafe {
        CGEventTapEnable(mach_port.as_concrete_TypeRef(), false);
    }
    run_loop.remove_source(&run_loop_source, unsafe { kCFRunLoopDefaultMode });

    // Drops the sink, which ends the pump once the queue drains
    unsafe {
        drop(Box::from_raw(context));
    }
    crate::info!("CGEventTap input capture stopped");
}

/// Tap callback. Returns null for every delivered event so nothing reaches
/// other applications.
unsafe extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: CGEventType,
    event_ref: *mut c_void,
    user_info: *mut c_void,
) -> *mut c_void {
    let context = &*(user_info as *const TapContext);
    let event_type_raw = event_type as u32;

    if event_type_raw == TAP_DISABLED_BY_TIMEOUT || event_type_raw == TAP_DISABLED_BY_USER_INPUT {
        crate::warn!("CGEventTap disabled by the system (0x{:x}), re-enabling", event_type_raw);
        let tap = context.tap.load(Ordering::SeqCst);
        if !tap.is_null() {
            CGEventTapEnable(tap as CFMachPortRef, true);
        }
        return event_ref;
    }

    // The event stays owned by the system
    let event = ManuallyDrop::new(CGEvent::from_ptr(event_ref as *mut _));
    let started = Instant::now();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        if let Some(raw) = copy_event(event_type_raw, &event) {
            deliver(&context.sink, RawEvent::Mac(raw));
        }
    }));
    if let Err(e) = result {
        crate::error!("CGEventTap callback panicked: {:?}", e);
    }

    let elapsed = started.elapsed();
    if elapsed > SLOW_CALLBACK_THRESHOLD {
        crate::warn!("Slow CGEventTap callback: {:?}", elapsed);
    }

    std::ptr::null_mut()
}

/// Copy the fields the normalizer needs. None for events with nothing to report.
fn copy_event(event_type: u32, event: &CGEvent) -> Option<MacRawEvent> {
    let flags = event.get_flags().bits();
    let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u32;
    let location = event.location();
    let mut raw = MacRawEvent {
        timestamp: crate::timebase::now_ms(),
        event_type,
        key_code,
        flags,
        x: location.x,
        y: location.y,
        ..Default::default()
    };

    match event_type {
        mac::CG_EVENT_FLAGS_CHANGED => {
            // Lock and other non-modifier flag changes are swallowed silently
            mac::modifier_key_state(key_code, flags)?;
        }
        mac::NX_SYSDEFINED => raw.media_data = Some(media_data(event)?),
        mac::CG_EVENT_OTHER_MOUSE_DOWN | mac::CG_EVENT_OTHER_MOUSE_UP => {
            raw.button_number = event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER);
        }
        mac::CG_EVENT_SCROLL_WHEEL => {
            raw.scroll_delta_y =
                event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS_1);
            raw.scroll_delta_x =
                event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS_2);
        }
        _ => {}
    }
    Some(raw)
}

/// data1 of an aux-control (media key) system event
fn media_data(event: &CGEvent) -> Option<i64> {
    let cg_event_ptr = event.as_ptr() as *mut c_void;

    #[allow(deprecated)]
    unsafe {
        let ns_event: cocoa::base::id = NSEvent::eventWithCGEvent_(nil, cg_event_ptr);
        if ns_event == nil {
            return None;
        }
        if NSEvent::subtype(ns_event) as i16 != NX_SUBTYPE_AUX_CONTROL_BUTTONS {
            return None;
        }
        let data1 = NSEvent::data1(ns_event) as i64;
        // Only key-down (0xA) and key-up (0xB) states are reported
        match (data1 as u64 & 0xFF00) >> 8 {
            0x0A | 0x0B => Some(data1),
            _ => None,
        }
    }
}
