use std::time::Duration;

use anyhow::{Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use image::{DynamicImage, RgbImage};

use crate::sleep;
use crate::types::{Key, Point};
use super::{InputDriver, Platform, ScreenCapture};

/// Primary monitor via xcap, input via enigo.
pub struct DesktopPlatform {
    pause: Duration,
}

impl DesktopPlatform {
    pub fn new(input_pause_ms: u64) -> Self {
        Self { pause: Duration::from_millis(input_pause_ms) }
    }
}

impl Platform for DesktopPlatform {
    fn name(&self) -> &str {
        "desktop"
    }

    fn screen(&self) -> Result<Box<dyn ScreenCapture>> {
        Ok(Box::new(XcapScreen))
    }

    fn input(&self) -> Result<Box<dyn InputDriver>> {
        let enigo = Enigo::new(&Settings::default()).context("failed to connect input simulator")?;
        Ok(Box::new(EnigoInput { enigo, pause: self.pause }))
    }
}

struct XcapScreen;

impl ScreenCapture for XcapScreen {
    fn capture(&mut self) -> Result<RgbImage> {
        // Monitors are re-enumerated each time so a display change is picked up.
        let monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;
        let monitor = monitors.first().context("no monitors found")?;
        let image = monitor.capture_image().context("screen capture failed")?;
        Ok(DynamicImage::ImageRgba8(image).to_rgb8())
    }
}

struct EnigoInput {
    enigo: Enigo,
    /// Pause after every input event
    pause: Duration,
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Alt => enigo::Key::Alt,
        Key::Shift => enigo::Key::Shift,
        Key::Backspace => enigo::Key::Backspace,
    }
}

impl InputDriver for EnigoInput {
    fn click(&mut self, at: Point) -> Result<()> {
        self.enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .with_context(|| format!("move mouse to {}", at))?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .with_context(|| format!("click at {}", at))?;
        sleep::sleep(self.pause);
        Ok(())
    }

    fn key_combo(&mut self, keys: &[Key]) -> Result<()> {
        for key in keys {
            self.enigo.key(enigo_key(*key), Direction::Press).context("key press")?;
        }
        for key in keys.iter().rev() {
            self.enigo.key(enigo_key(*key), Direction::Release).context("key release")?;
        }
        sleep::sleep(self.pause);
        Ok(())
    }

    fn tap(&mut self, key: Key, times: usize) -> Result<()> {
        for _ in 0..times {
            self.enigo.key(enigo_key(key), Direction::Click).context("key tap")?;
        }
        sleep::sleep(self.pause);
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.enigo.text(text).context("type text")?;
        sleep::sleep(self.pause);
        Ok(())
    }
}
