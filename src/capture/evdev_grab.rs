// evdev capture for Linux
//
// Every keyboard, mouse, touchpad and touchscreen under /dev/input is opened
// and grabbed with EVIOCGRAB, so its events reach nobody else while capture is
// active. One reader thread polls all grabbed devices and rescans the directory
// for devices plugged in later. evdev reports relative motion and no modifier
// state, so the reader tracks both and stamps them onto each record. Absolute
// axes are swallowed without being forwarded.

use super::raw::{
    LinuxRawEvent, RawEvent, X11_CONTROL_MASK, X11_MOD1_MASK, X11_MOD4_MASK, X11_SHIFT_MASK,
};
use super::{deliver, CaptureError, NativeCapture, RawEventSink, SLOW_CALLBACK_THRESHOLD};
use crate::exit::geometry::{ScreenGeometryProvider, ScreenSize};
use crate::normalize::linux::{BTN_LEFT, BTN_TASK, EV_KEY, EV_REL, REL_HWHEEL, REL_WHEEL, REL_X, REL_Y};
use crate::permissions::linux::{event_device_paths, INPUT_DIR};
use crate::permissions::{permission_denied, INPUT_GROUP};
use evdev::{AbsoluteAxisType, AttributeSetRef, Device, Key, RelativeAxisType};
use std::collections::HashSet;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll timeout; bounds how long `stop` waits for the reader
const POLL_TIMEOUT_MS: i32 = 100;

/// How often the reader looks for newly attached devices
const RESCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Modifier key codes and the X11 mask bit each one holds
const MODIFIER_KEYS: [(u16, u32); 8] = [
    (42, X11_SHIFT_MASK),   // KEY_LEFTSHIFT
    (54, X11_SHIFT_MASK),   // KEY_RIGHTSHIFT
    (29, X11_CONTROL_MASK), // KEY_LEFTCTRL
    (97, X11_CONTROL_MASK), // KEY_RIGHTCTRL
    (56, X11_MOD1_MASK),    // KEY_LEFTALT
    (100, X11_MOD1_MASK),   // KEY_RIGHTALT
    (125, X11_MOD4_MASK),   // KEY_LEFTMETA
    (126, X11_MOD4_MASK),   // KEY_RIGHTMETA
];

/// Modifier and pointer state reconstructed from the event stream
#[derive(Debug, Default)]
pub(crate) struct InputTracker {
    /// One bit per entry of MODIFIER_KEYS
    held: u8,
    x: f64,
    y: f64,
    /// Set once the pointer has been placed at the screen centre
    placed: bool,
}

impl InputTracker {
    pub(crate) fn modifier_mask(&self) -> u32 {
        MODIFIER_KEYS
            .iter()
            .enumerate()
            .filter(|(i, _)| self.held & (1 << i) != 0)
            .fold(0, |mask, (_, (_, bit))| mask | bit)
    }

    /// Start from the screen centre as soon as the screen size is known
    fn place(&mut self, size: Option<ScreenSize>) {
        if self.placed {
            return;
        }
        if let Some(size) = size {
            self.x = size.width() / 2.0;
            self.y = size.height() / 2.0;
            self.placed = true;
        }
    }

    fn move_by(&mut self, dx: f64, dy: f64, size: Option<ScreenSize>) {
        self.x += dx;
        self.y += dy;
        match size {
            Some(size) => {
                self.x = self.x.clamp(0.0, size.width() - 1.0);
                self.y = self.y.clamp(0.0, size.height() - 1.0);
            }
            None => {
                self.x = self.x.max(0.0);
                self.y = self.y.max(0.0);
            }
        }
    }

    /// Update state from one evdev event and build the record to forward.
    /// None for sync reports and codes the normalizer has no mapping for.
    pub(crate) fn translate(
        &mut self,
        timestamp: u64,
        ev_type: u16,
        code: u16,
        value: i32,
        size: Option<ScreenSize>,
    ) -> Option<LinuxRawEvent> {
        self.place(size);
        match ev_type {
            EV_KEY => {
                let is_button = (BTN_LEFT..=BTN_TASK).contains(&code);
                if code >= 0x100 && !is_button {
                    return None;
                }
                if !(0..=2).contains(&value) {
                    return None;
                }
                if let Some(index) = MODIFIER_KEYS.iter().position(|(key, _)| *key == code) {
                    if value == 0 {
                        self.held &= !(1 << index);
                    } else {
                        self.held |= 1 << index;
                    }
                }
            }
            EV_REL => match code {
                REL_X => self.move_by(value as f64, 0.0, size),
                REL_Y => self.move_by(0.0, value as f64, size),
                REL_WHEEL | REL_HWHEEL => {}
                _ => return None,
            },
            _ => return None,
        }

        Some(LinuxRawEvent {
            timestamp,
            ev_type,
            code,
            value,
            modifier_mask: self.modifier_mask(),
            x: self.x,
            y: self.y,
        })
    }
}

/// Whether a device with these capabilities carries user input to swallow:
/// keyboards, relative pointers, and absolute pointers (touchpads,
/// touchscreens, tablets) that report touches or clicks.
pub(crate) fn is_user_input(
    keys: Option<&AttributeSetRef<Key>>,
    relative: Option<&AttributeSetRef<RelativeAxisType>>,
    absolute: Option<&AttributeSetRef<AbsoluteAxisType>>,
) -> bool {
    let has_key = |key: Key| keys.is_some_and(|keys| keys.contains(key));

    let keyboard = has_key(Key::KEY_A) || has_key(Key::KEY_ENTER);
    let clicks = has_key(Key::BTN_LEFT);
    let touches = has_key(Key::BTN_TOUCH);
    let relative_pointer = relative.is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
    let absolute_pointer = absolute.is_some_and(|axes| {
        axes.contains(AbsoluteAxisType::ABS_X) || axes.contains(AbsoluteAxisType::ABS_MT_POSITION_X)
    });

    keyboard || (relative_pointer && clicks) || (absolute_pointer && (clicks || touches))
}

fn should_grab(device: &Device) -> bool {
    is_user_input(
        device.supported_keys(),
        device.supported_relative_axes(),
        device.supported_absolute_axes(),
    )
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd is owned by `device` and open for the duration of both calls
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// A grabbed device and the node it was opened from
struct GrabbedDevice {
    path: PathBuf,
    device: Device,
}

enum OpenOutcome {
    Grabbed(GrabbedDevice),
    Denied,
    Skipped,
}

/// Open one event node and grab it if it carries user input
fn open_and_grab(path: &Path) -> OpenOutcome {
    let mut device = match Device::open(path) {
        Ok(device) => device,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return OpenOutcome::Denied,
        Err(e) => {
            crate::debug!("Skipping {}: {}", path.display(), e);
            return OpenOutcome::Skipped;
        }
    };
    if !should_grab(&device) {
        return OpenOutcome::Skipped;
    }
    if let Err(e) = set_nonblocking(&device) {
        crate::warn!("Failed to make {} non-blocking: {}", path.display(), e);
        return OpenOutcome::Skipped;
    }
    if let Err(e) = device.grab() {
        crate::warn!("Failed to grab {}: {}", path.display(), e);
        return OpenOutcome::Skipped;
    }
    crate::info!(
        "Grabbed {} ({})",
        path.display(),
        device.name().unwrap_or("unnamed")
    );
    OpenOutcome::Grabbed(GrabbedDevice {
        path: path.to_path_buf(),
        device,
    })
}

/// Open and grab every input device in `dir`
fn grab_devices(dir: &Path) -> Result<Vec<GrabbedDevice>, CaptureError> {
    let mut devices = Vec::new();
    let mut denied = 0;

    for path in event_device_paths(dir) {
        match open_and_grab(&path) {
            OpenOutcome::Grabbed(grabbed) => devices.push(grabbed),
            OpenOutcome::Denied => denied += 1,
            OpenOutcome::Skipped => {}
        }
    }

    if devices.is_empty() {
        if denied > 0 {
            return Err(permission_denied(INPUT_GROUP));
        }
        return Err(CaptureError::HookInstallFailed(
            "No keyboard or mouse devices could be grabbed".to_string(),
        ));
    }
    Ok(devices)
}

/// Grab nodes in `dir` that appeared since the last scan.
///
/// Nodes that were not grabbed are remembered in `ignored` until they
/// disappear, so a replugged device gets another chance.
fn grab_new_devices(dir: &Path, devices: &mut Vec<GrabbedDevice>, ignored: &mut HashSet<PathBuf>) {
    let paths = event_device_paths(dir);
    ignored.retain(|path| paths.contains(path));

    for path in paths {
        if ignored.contains(&path) || devices.iter().any(|d| d.path == path) {
            continue;
        }
        match open_and_grab(&path) {
            OpenOutcome::Grabbed(grabbed) => devices.push(grabbed),
            OpenOutcome::Denied | OpenOutcome::Skipped => {
                ignored.insert(path);
            }
        }
    }
}

/// Handle to the evdev reader thread
pub struct EvdevGrabCapture {
    geometry: Arc<dyn ScreenGeometryProvider>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EvdevGrabCapture {
    pub fn new(geometry: Arc<dyn ScreenGeometryProvider>) -> Self {
        Self {
            geometry,
            running: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl NativeCapture for EvdevGrabCapture {
    fn start(&mut self, sink: RawEventSink) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }
        // A reader that ended on its own has already released its devices
        self.stop();
        let dir = PathBuf::from(INPUT_DIR);
        let devices = grab_devices(&dir)?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let geometry = self.geometry.clone();

        let thread = thread::Builder::new()
            .name("evdev-reader".to_string())
            .spawn(move || read_loop(devices, dir, running, sink, geometry))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::HookInstallFailed(format!("Failed to spawn reader thread: {}", e))
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                crate::error!("evdev reader thread panicked");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EvdevGrabCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll all grabbed devices until `running` clears or the pump goes away,
/// then release them. `running` is clear whenever this returns.
fn read_loop(
    mut devices: Vec<GrabbedDevice>,
    dir: PathBuf,
    running: Arc<AtomicBool>,
    sink: RawEventSink,
    geometry: Arc<dyn ScreenGeometryProvider>,
) {
    crate::info!("evdev input capture started on {} devices", devices.len());
    let mut tracker = InputTracker::default();
    let mut ignored = HashSet::new();
    let mut last_scan = Instant::now();

    while running.load(Ordering::SeqCst) {
        if sink.is_closed() {
            crate::warn!("Raw event queue closed, releasing input devices");
            break;
        }
        if last_scan.elapsed() >= RESCAN_INTERVAL {
            grab_new_devices(&dir, &mut devices, &mut ignored);
            last_scan = Instant::now();
        }

        let mut fds: Vec<libc::pollfd> = devices
            .iter()
            .map(|d| libc::pollfd {
                fd: d.device.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        // SAFETY: fds is a valid, exclusively borrowed array of fds.len() entries
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TIMEOUT_MS) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                crate::error!("poll on input devices failed: {}", err);
                break;
            }
            continue;
        }
        if ready == 0 {
            continue;
        }

        let mut lost = Vec::new();
        for (index, pollfd) in fds.iter().enumerate() {
            if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                lost.push(index);
                continue;
            }
            if pollfd.revents & libc::POLLIN == 0 {
                continue;
            }

            let started = Instant::now();
            match devices[index].device.fetch_events() {
                Ok(events) => {
                    let size = geometry.screen_size();
                    for event in events {
                        if let Some(raw) = tracker.translate(
                            crate::timebase::now_ms(),
                            event.event_type().0,
                            event.code(),
                            event.value(),
                            size,
                        ) {
                            deliver(&sink, RawEvent::Linux(raw));
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    crate::warn!("Input device read failed: {}", e);
                    lost.push(index);
                }
            }
            let elapsed = started.elapsed();
            if elapsed > SLOW_CALLBACK_THRESHOLD {
                crate::warn!("Slow evdev read: {:?}", elapsed);
            }
        }

        for index in lost.into_iter().rev() {
            let lost = devices.remove(index);
            crate::warn!("Input device {} went away", lost.path.display());
        }
    }

    running.store(false, Ordering::SeqCst);
    for grabbed in devices.iter_mut() {
        if let Err(e) = grabbed.device.ungrab() {
            crate::warn!("Failed to ungrab {}: {}", grabbed.path.display(), e);
        }
    }
    // `sink` drops here, which ends the pump once the queue drains
    crate::info!("evdev input capture stopped");
}
