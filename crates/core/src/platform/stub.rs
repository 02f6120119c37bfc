use anyhow::Result;
use image::{Rgb, RgbImage};

use crate::logger;
use crate::types::{Key, Point};
use super::{InputDriver, Platform, ScreenCapture};

/// No display, no input: blank frames and logged actions.
pub struct StubPlatform;

impl Platform for StubPlatform {
    fn name(&self) -> &str {
        "stub"
    }

    fn screen(&self) -> Result<Box<dyn ScreenCapture>> {
        Ok(Box::new(StubScreen))
    }

    fn input(&self) -> Result<Box<dyn InputDriver>> {
        Ok(Box::new(StubInput))
    }
}

struct StubScreen;

impl ScreenCapture for StubScreen {
    fn capture(&mut self) -> Result<RgbImage> {
        Ok(RgbImage::from_pixel(1920, 1080, Rgb([32, 32, 32])))
    }
}

struct StubInput;

impl InputDriver for StubInput {
    fn click(&mut self, at: Point) -> Result<()> {
        logger::info(&format!("stub: click{}", at));
        Ok(())
    }

    fn key_combo(&mut self, keys: &[Key]) -> Result<()> {
        logger::info(&format!("stub: key_combo({:?})", keys));
        Ok(())
    }

    fn tap(&mut self, key: Key, times: usize) -> Result<()> {
        logger::info(&format!("stub: tap({:?} x{})", key, times));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        logger::info(&format!("stub: type_text(\"{}\")", text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_frame_is_screen_sized_and_flat() {
        let mut screen = StubPlatform.screen().unwrap();
        let frame = screen.capture().unwrap();
        assert_eq!(frame.dimensions(), (1920, 1080));
        assert!(frame.pixels().all(|p| *p == Rgb([32, 32, 32])));
    }

    #[test]
    fn stub_input_accepts_everything() {
        let mut input = StubPlatform.input().unwrap();
        input.click(Point::new(1, 2)).unwrap();
        input.key_combo(&[Key::Alt, Key::Shift]).unwrap();
        input.tap(Key::Backspace, 4).unwrap();
        input.type_text("keep").unwrap();
    }
}
