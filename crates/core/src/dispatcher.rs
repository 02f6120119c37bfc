use anyhow::{Context, Result};
use image::RgbImage;

use crate::logger;
use crate::matcher;
use crate::platform::{InputDriver, ScreenCapture};
use crate::press_log::ButtonLog;
use crate::sleep::{self, Timings};
use crate::templates::TemplateSet;
use crate::types::{ActionOutcome, Key, Match, Point};

/// How the primary button is pressed once target and button are on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressStrategy {
    /// Click the button once.
    DirectClick,
    /// Focus the field, force ASCII input with Alt+Shift, type `text`,
    /// erase it, type `fallback`, click again. Best effort: the first entry
    /// is never checked before being overwritten.
    TextEntry { text: String, fallback: String },
}

impl PressStrategy {
    pub fn press(&self, input: &mut dyn InputDriver, at: Point, timings: &Timings) -> Result<()> {
        match self {
            PressStrategy::DirectClick => {
                logger::info(&format!("clicking button at {}", at));
                input.click(at)
            }
            PressStrategy::TextEntry { text, fallback } => {
                logger::info(&format!("entering \"{}\" at {}", text, at));
                input.click(at)?;
                sleep::sleep(timings.focus_delay);

                input.key_combo(&[Key::Alt, Key::Shift])?;
                sleep::sleep(timings.key_delay);

                input.type_text(text)?;
                sleep::sleep(timings.key_delay);

                input.tap(Key::Backspace, text.chars().count())?;
                input.type_text(fallback)?;
                sleep::sleep(timings.key_delay);

                input.click(at)
            }
        }
    }
}

/// Decides and performs at most one action per scan cycle.
pub struct Dispatcher<'a> {
    pub templates: &'a TemplateSet,
    pub threshold: f64,
    pub strategy: &'a PressStrategy,
    pub timings: &'a Timings,
    pub button_log: &'a ButtonLog,
}

impl Dispatcher<'_> {
    /// Run one cycle. Errors are logged and count as `NoAction`.
    pub fn process_cycle(
        &self,
        screen: &mut dyn ScreenCapture,
        input: &mut dyn InputDriver,
    ) -> ActionOutcome {
        match self.try_cycle(screen, input) {
            Ok(outcome) => outcome,
            Err(e) => {
                logger::error(&format!("scan cycle failed: {:#}", e));
                ActionOutcome::NoAction
            }
        }
    }

    fn try_cycle(
        &self,
        screen: &mut dyn ScreenCapture,
        input: &mut dyn InputDriver,
    ) -> Result<ActionOutcome> {
        // One frame serves every check in this cycle.
        let frame = screen.capture().context("screen capture failed")?;

        if let Some(stop) = &self.templates.stop {
            if self.find(&frame, stop).is_some() {
                logger::info("stop image found");
                return Ok(ActionOutcome::Stopped);
            }
        }

        if let Some(approved) = &self.templates.approved {
            if let Some(m) = self.find(&frame, approved) {
                logger::info(&format!("approved image found, clicking {}", m.center()));
                input.click(m.center()).context("approve click failed")?;
                sleep::sleep(self.timings.settle);
                return Ok(ActionOutcome::Acted);
            }
        }

        if self.find(&frame, &self.templates.target).is_none() {
            return Ok(ActionOutcome::NoAction);
        }
        let Some(button) = self.find(&frame, &self.templates.button) else {
            return Ok(ActionOutcome::NoAction);
        };

        let at = button.center();
        self.strategy
            .press(input, at, self.timings)
            .context("button press failed")?;
        input.click(at).context("confirmation click failed")?;
        self.button_log.record();
        sleep::sleep(self.timings.settle);
        Ok(ActionOutcome::Acted)
    }

    fn find(&self, frame: &RgbImage, template: &RgbImage) -> Option<Match> {
        matcher::locate(frame, template, self.threshold)
    }
}
