// Exit sequence detection
// The only way out of the sandbox: a deliberate key sequence or a clockwise
// tour of the screen corners, each within a sliding timeout.

pub mod detector;
pub mod emitter;
pub mod geometry;
pub mod runner;
pub mod sequence;

pub use detector::{ExitSequenceConfig, ExitSequenceDetector};
pub use emitter::{ChannelExitEmitter, ExitSignal};
pub use geometry::{
    NativeScreenGeometry, ScreenGeometryProvider, ScreenSize, SharedScreenGeometry,
};
pub use runner::spawn_exit_detector;
