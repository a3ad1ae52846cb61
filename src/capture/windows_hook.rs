// Low-level keyboard and mouse hooks for Windows
//
// WH_KEYBOARD_LL and WH_MOUSE_LL are installed on a dedicated thread that runs
// a message loop; the hook procedures are called on that thread. Returning a
// non-zero LRESULT without calling the next hook swallows the event. Events are
// only swallowed while a sink is installed.

use super::raw::{
    RawEvent, WindowsRawEvent, WIN_MOD_ALT, WIN_MOD_CONTROL, WIN_MOD_SHIFT, WIN_MOD_WIN,
};
use super::{deliver, CaptureError, NativeCapture, RawEventSink, SLOW_CALLBACK_THRESHOLD};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG,
    MSLLHOOKSTRUCT, PM_NOREMOVE, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_QUIT,
};

/// Sink used by the hook procedures, which receive no user data pointer.
/// Only the hook thread locks it while hooks are live; `try_lock` keeps the
/// procedures from ever waiting.
static SINK: Mutex<Option<RawEventSink>> = parking_lot::const_mutex(None);

/// Handle to the hook thread
pub struct WindowsHookCapture {
    /// Id of the hook thread, target of WM_QUIT
    thread_id: Option<u32>,
    thread: Option<JoinHandle<()>>,
}

impl WindowsHookCapture {
    pub fn new() -> Self {
        Self {
            thread_id: None,
            thread: None,
        }
    }
}

impl Default for WindowsHookCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeCapture for WindowsHookCapture {
    fn start(&mut self, sink: RawEventSink) -> Result<(), CaptureError> {
        if self.is_active() {
            return Ok(());
        }
        *SINK.lock() = Some(sink);

        let (ready_tx, ready_rx) = mpsc::channel();
        let thread = match thread::Builder::new()
            .name("windows-hook".to_string())
            .spawn(move || run_hook_thread(ready_tx))
        {
            Ok(thread) => thread,
            Err(e) => {
                SINK.lock().take();
                return Err(CaptureError::HookInstallFailed(format!(
                    "Failed to spawn hook thread: {}",
                    e
                )));
            }
        };

        // The thread always reports once both installs have returned, so the
        // wait is unbounded and the thread is never left running untracked
        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.thread_id = Some(thread_id);
                self.thread = Some(thread);
                crate::info!("Windows input hooks installed");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                SINK.lock().take();
                Err(e)
            }
            Err(_) => {
                // Sender dropped without a report: the thread panicked
                let _ = thread.join();
                SINK.lock().take();
                Err(CaptureError::HookInstallFailed(
                    "Hook thread exited before reporting".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        let Some(thread_id) = self.thread_id.take() else {
            return;
        };

        unsafe {
            if let Err(e) = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
                crate::error!("Failed to post WM_QUIT to hook thread: {}", e);
            }
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                crate::error!("Windows hook thread panicked");
            }
        }

        // Drops the sink, which ends the pump once the queue drains
        SINK.lock().take();
        crate::info!("Windows input hooks removed");
    }

    fn is_active(&self) -> bool {
        self.thread_id.is_some()
    }
}

impl Drop for WindowsHookCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the hook thread: install both hooks, pump messages until WM_QUIT
fn run_hook_thread(ready: mpsc::Sender<Result<u32, CaptureError>>) {
    unsafe {
        let mut msg = MSG::default();
        // Make sure the thread has a message queue before WM_QUIT can be posted
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
        let thread_id = GetCurrentThreadId();

        let keyboard = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(CaptureError::HookInstallFailed(format!(
                    "WH_KEYBOARD_LL: {}",
                    e
                ))));
                return;
            }
        };
        let mouse = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), None, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = UnhookWindowsHookEx(keyboard);
                let _ = ready.send(Err(CaptureError::HookInstallFailed(format!(
                    "WH_MOUSE_LL: {}",
                    e
                ))));
                return;
            }
        };

        let _ = ready.send(Ok(thread_id));

        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if let Err(e) = UnhookWindowsHookEx(mouse) {
            crate::error!("Failed to remove mouse hook: {}", e);
        }
        if let Err(e) = UnhookWindowsHookEx(keyboard) {
            crate::error!("Failed to remove keyboard hook: {}", e);
        }
    }
}

fn key_held(vk: VIRTUAL_KEY) -> bool {
    unsafe { GetAsyncKeyState(vk.0 as i32) < 0 }
}

/// Pack the held modifiers in `WIN_MOD_*` layout
fn modifier_state() -> u8 {
    let mut state = 0;
    if key_held(VK_SHIFT) {
        state |= WIN_MOD_SHIFT;
    }
    if key_held(VK_CONTROL) {
        state |= WIN_MOD_CONTROL;
    }
    if key_held(VK_MENU) {
        state |= WIN_MOD_ALT;
    }
    if key_held(VK_LWIN) || key_held(VK_RWIN) {
        state |= WIN_MOD_WIN;
    }
    state
}

/// Hand one record to the sink. Returns false when no sink is installed, in
/// which case the event must be passed on rather than swallowed.
fn forward(raw: WindowsRawEvent, started: Instant) -> bool {
    let installed = match SINK.try_lock() {
        Some(sink) => match sink.as_ref() {
            Some(sink) => {
                deliver(sink, RawEvent::Windows(raw));
                true
            }
            None => false,
        },
        // Only start and stop take the lock, and both hold a live sink
        None => true,
    };
    let elapsed = started.elapsed();
    if elapsed > SLOW_CALLBACK_THRESHOLD {
        crate::warn!("Slow input hook callback: {:?}", elapsed);
    }
    installed
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }
    let started = Instant::now();
    let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
    let raw = WindowsRawEvent {
        timestamp: crate::timebase::now_ms(),
        message: wparam.0 as u32,
        vk_code: info.vkCode,
        modifier_state: modifier_state(),
        ..Default::default()
    };
    if !forward(raw, started) {
        return CallNextHookEx(None, code, wparam, lparam);
    }
    LRESULT(1)
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }
    let started = Instant::now();
    let info = &*(lparam.0 as *const MSLLHOOKSTRUCT);
    let raw = WindowsRawEvent {
        timestamp: crate::timebase::now_ms(),
        message: wparam.0 as u32,
        x: info.pt.x,
        y: info.pt.y,
        mouse_data: info.mouseData,
        ..Default::default()
    };
    if !forward(raw, started) {
        return CallNextHookEx(None, code, wparam, lparam);
    }
    LRESULT(1)
}
