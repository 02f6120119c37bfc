#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use image::{imageops, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use btnsprite_core::notifier::Notifier;
use btnsprite_core::platform::{InputDriver, Platform, ScreenCapture};
use btnsprite_core::scan_loop::LoopHandle;
use btnsprite_core::settings::LoopConfig;
use btnsprite_core::dispatcher::PressStrategy;
use btnsprite_core::sleep::Timings;
use btnsprite_core::types::{Key, Point, Slot};

pub const W: u32 = 16;
pub const H: u32 = 12;
pub const TARGET_AT: (u32, u32) = (10, 10);
pub const BUTTON_AT: (u32, u32) = (100, 80);
pub const APPROVED_AT: (u32, u32) = (60, 40);
pub const STOP_AT: (u32, u32) = (130, 10);

pub fn noise(w: u32, h: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(w, h, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

/// Synthetic screen: a noise background containing the four patterns.
pub struct Scene {
    pub full: RgbImage,
}

impl Scene {
    pub fn new() -> Self {
        Self { full: noise(160, 120, 42) }
    }

    pub fn pattern(&self, at: (u32, u32)) -> RgbImage {
        imageops::crop_imm(&self.full, at.0, at.1, W, H).to_image()
    }

    /// Write keep.png, btn.png and the chosen optional slots into `dir`.
    pub fn write_templates(&self, dir: &Path, approved: bool, stop: bool) {
        self.pattern(TARGET_AT).save(dir.join(Slot::Target.file_name())).unwrap();
        self.pattern(BUTTON_AT).save(dir.join(Slot::Button.file_name())).unwrap();
        if approved {
            self.pattern(APPROVED_AT).save(dir.join(Slot::Approved.file_name())).unwrap();
        }
        if stop {
            self.pattern(STOP_AT).save(dir.join(Slot::Stop.file_name())).unwrap();
        }
    }

    /// The scene with the listed patterns replaced by unrelated noise.
    pub fn without(&self, hidden: &[(u32, u32)]) -> RgbImage {
        let mut frame = self.full.clone();
        for (i, at) in hidden.iter().enumerate() {
            imageops::replace(&mut frame, &noise(W, H, 1000 + i as u64), at.0 as i64, at.1 as i64);
        }
        frame
    }

    /// A frame containing none of the patterns.
    pub fn empty(&self) -> RgbImage {
        self.without(&[TARGET_AT, BUTTON_AT, APPROVED_AT, STOP_AT])
    }
}

pub fn center(at: (u32, u32)) -> Point {
    Point::new((at.0 + W / 2) as i32, (at.1 + H / 2) as i32)
}

pub fn config(dir: &Path) -> LoopConfig {
    LoopConfig {
        images_dir: dir.to_path_buf(),
        button_log: dir.join("button_press.log"),
        confidence_threshold: 0.8,
        strategy: PressStrategy::DirectClick,
        timings: Timings::instant(),
    }
}

pub fn press_log_lines(dir: &Path) -> usize {
    std::fs::read_to_string(dir.join("button_press.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// What the fake screen does once its frame queue is empty.
#[derive(Clone)]
pub enum WhenEmpty {
    /// Keep returning this frame.
    Repeat(RgbImage),
    /// Request a stop with this reason and fail the capture.
    Stop(String),
    Panic,
}

#[derive(Clone)]
pub struct ScriptedScreen {
    pub frames: Arc<Mutex<VecDeque<RgbImage>>>,
    pub when_empty: WhenEmpty,
    pub captures: Arc<Mutex<usize>>,
    /// Run flag observed at each capture
    pub seen_running: Arc<Mutex<Vec<bool>>>,
    pub handle: Arc<Mutex<Option<LoopHandle>>>,
    pub delay: Duration,
}

impl ScriptedScreen {
    pub fn new(frames: Vec<RgbImage>, when_empty: WhenEmpty) -> Self {
        Self {
            frames: Arc::new(Mutex::new(frames.into())),
            when_empty,
            captures: Arc::new(Mutex::new(0)),
            seen_running: Arc::new(Mutex::new(Vec::new())),
            handle: Arc::new(Mutex::new(None)),
            delay: Duration::ZERO,
        }
    }

    pub fn attach(&self, handle: LoopHandle) {
        *self.handle.lock().unwrap() = Some(handle);
    }

    pub fn captures(&self) -> usize {
        *self.captures.lock().unwrap()
    }
}

impl ScreenCapture for ScriptedScreen {
    fn capture(&mut self) -> Result<RgbImage> {
        *self.captures.lock().unwrap() += 1;
        if let Some(h) = self.handle.lock().unwrap().as_ref() {
            self.seen_running.lock().unwrap().push(h.is_running());
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if let Some(frame) = self.frames.lock().unwrap().pop_front() {
            return Ok(frame);
        }
        match &self.when_empty {
            WhenEmpty::Repeat(frame) => Ok(frame.clone()),
            WhenEmpty::Stop(reason) => {
                if let Some(h) = self.handle.lock().unwrap().as_ref() {
                    h.request_stop(reason);
                }
                bail!("script exhausted")
            }
            WhenEmpty::Panic => panic!("capture backend crashed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Click(Point),
    Combo(Vec<Key>),
    Tap(Key, usize),
    Type(String),
}

#[derive(Clone, Default)]
pub struct RecordingInput {
    pub ops: Arc<Mutex<Vec<Op>>>,
    /// Stop the loop with this reason on the first click
    pub stop_on_click: Option<(LoopHandle, String)>,
}

impl RecordingInput {
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> usize {
        self.ops().iter().filter(|op| matches!(op, Op::Click(_))).count()
    }
}

impl InputDriver for RecordingInput {
    fn click(&mut self, at: Point) -> Result<()> {
        self.ops.lock().unwrap().push(Op::Click(at));
        if let Some((handle, reason)) = &self.stop_on_click {
            handle.request_stop(reason);
        }
        Ok(())
    }

    fn key_combo(&mut self, keys: &[Key]) -> Result<()> {
        self.ops.lock().unwrap().push(Op::Combo(keys.to_vec()));
        Ok(())
    }

    fn tap(&mut self, key: Key, times: usize) -> Result<()> {
        self.ops.lock().unwrap().push(Op::Tap(key, times));
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.ops.lock().unwrap().push(Op::Type(text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    pub reasons: Mutex<Vec<String>>,
    pub deliver: bool,
}

impl CountingNotifier {
    pub fn delivering() -> Arc<Self> {
        Arc::new(Self { reasons: Mutex::new(Vec::new()), deliver: true })
    }

    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }
}

impl Notifier for CountingNotifier {
    fn send_message(&self, message: &str) -> bool {
        self.reasons.lock().unwrap().push(format!("message: {}", message));
        self.deliver
    }

    fn notify(&self, reason: &str) -> bool {
        self.reasons.lock().unwrap().push(reason.to_string());
        self.deliver
    }
}

/// Hands out clones of one scripted screen and one recording input.
pub struct FakePlatform {
    pub screen: ScriptedScreen,
    pub input: RecordingInput,
    /// Make `input()` fail, as when no input backend is available
    pub input_unavailable: bool,
}

impl Platform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    fn screen(&self) -> Result<Box<dyn ScreenCapture>> {
        Ok(Box::new(self.screen.clone()))
    }

    fn input(&self) -> Result<Box<dyn InputDriver>> {
        if self.input_unavailable {
            bail!("no input backend");
        }
        Ok(Box::new(self.input.clone()))
    }
}
