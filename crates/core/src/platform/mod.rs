pub mod desktop;
pub mod stub;

use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

use crate::logger;
use crate::types::{Key, Point};

/// Captures the primary screen on demand.
pub trait ScreenCapture {
    fn capture(&mut self) -> Result<RgbImage>;
}

/// Simulated mouse and keyboard input.
pub trait InputDriver {
    fn click(&mut self, at: Point) -> Result<()>;
    /// Press `keys` in order, release in reverse.
    fn key_combo(&mut self, keys: &[Key]) -> Result<()>;
    fn tap(&mut self, key: Key, times: usize) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
}

/// Factory for capture and input devices. Devices are created on the
/// thread that uses them, so they need not be `Send` themselves.
pub trait Platform: Send + Sync {
    fn name(&self) -> &str;
    fn screen(&self) -> Result<Box<dyn ScreenCapture>>;
    fn input(&self) -> Result<Box<dyn InputDriver>>;
}

/// Create the platform: real desktop devices, or the logging stub.
pub fn create_platform(force_stub: bool, input_pause_ms: u64) -> Arc<dyn Platform> {
    if force_stub {
        logger::info("using stub platform: no screen capture or input");
        return Arc::new(stub::StubPlatform);
    }
    Arc::new(desktop::DesktopPlatform::new(input_pause_ms))
}
