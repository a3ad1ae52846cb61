// Shutdown coordination module
// Provides a global flag and a watch channel so the bridge can stop capture and
// release the OS hook before the process exits

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tokio::sync::watch;

/// Global shutdown flag - set to true when the process is shutting down
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

/// Wakes async waiters when shutdown is signaled
static SHUTDOWN_TX: OnceLock<watch::Sender<bool>> = OnceLock::new();

fn shutdown_sender() -> &'static watch::Sender<bool> {
    SHUTDOWN_TX.get_or_init(|| watch::channel(false).0)
}

/// Signal that the process is shutting down
pub fn signal_shutdown() {
    SHUTTING_DOWN.store(true, Ordering::SeqCst);
    shutdown_sender().send_replace(true);
    crate::info!("Shutdown signaled");
}

/// Returns true after signal_shutdown() has been called
pub fn is_shutting_down() -> bool {
    SHUTTING_DOWN.load(Ordering::SeqCst)
}

/// Resolves once shutdown has been signaled
pub async fn wait_for_shutdown() {
    let mut receiver = shutdown_sender().subscribe();
    // The sender is static, so the channel can never close
    let _ = receiver.wait_for(|down| *down).await;
}

/// Install the Ctrl+C handler.
///
/// The first Ctrl+C asks the bridge to stop capture and exit. A second one
/// exits immediately, in case the graceful path is stuck.
pub fn install_signal_handler() {
    if let Err(e) = ctrlc::set_handler(|| {
        if is_shutting_down() {
            eprintln!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
        signal_shutdown();
    }) {
        crate::warn!("Failed to set Ctrl+C handler: {}", e);
    }
}
