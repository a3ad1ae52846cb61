// Kid-safe input sandbox: OS-level input capture, normalization and exit detection

// Enable coverage attribute on nightly for explicit exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod capture;
pub mod events;
pub mod exit;
pub mod logging;
pub mod normalize;
pub mod permissions;
pub mod shutdown;
pub mod timebase;
pub mod transport;
pub mod util;

use exit::{ChannelExitEmitter, ExitSequenceDetector, NativeScreenGeometry, SharedScreenGeometry};
use permissions::NativePermissions;
use std::sync::Arc;
use std::time::Duration;
use transport::bridge::{run_stdio_bridge, BridgeExit};
use transport::{CaptureServiceHandle, EventHub, Transport};
use util::Settings;

// Re-export log macros for use throughout the crate
pub use log::{debug, error, info, trace, warn};

/// How long runtime shutdown waits for a blocked stdin read
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Errors that end the process before or while serving the host
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to build async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Capture(#[from] capture::CaptureError),
    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}

/// Application entry point: serve the host over stdio until it closes the
/// pipe, an exit sequence completes or the process is interrupted.
#[cfg_attr(coverage_nightly, coverage(off))]
pub fn run() {
    let (settings, settings_error) = match Settings::load() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    if let Err(e) = logging::init(settings.log_level()) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    if let Some(e) = settings_error {
        warn!("Using default settings: {}", e);
    }
    timebase::init();
    info!("Starting keyboard-playground...");

    match serve_blocking(&settings) {
        Ok(reason) => info!("Exiting: {:?}", reason),
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn serve_blocking(settings: &Settings) -> Result<BridgeExit, AppError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(settings));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Wire capture, the exit detector and the stdio bridge together
#[cfg_attr(coverage_nightly, coverage(off))]
async fn serve(settings: &Settings) -> Result<BridgeExit, AppError> {
    let hub = EventHub::new(settings.transport.event_buffer_capacity);
    let geometry = SharedScreenGeometry::with_fallback(Arc::new(NativeScreenGeometry));

    let backend = capture::create_native_capture(Arc::new(geometry.clone()));
    let service = CaptureServiceHandle::spawn(
        backend,
        hub.clone(),
        settings.transport.raw_buffer_capacity,
    )?;

    let (emitter, exit_signal) = ChannelExitEmitter::new();
    let progress = emitter.subscribe_progress();
    let detector = ExitSequenceDetector::new(
        settings.exit_config(),
        Arc::new(geometry.clone()),
        Arc::new(emitter),
    );
    let detector_task = exit::spawn_exit_detector(detector, hub.subscribe());

    let transport = Arc::new(Transport::new(
        service,
        Arc::new(NativePermissions),
        geometry,
        hub,
    ));
    shutdown::install_signal_handler();

    let result = run_stdio_bridge(transport, progress, exit_signal).await;
    detector_task.abort();
    Ok(result?)
}
