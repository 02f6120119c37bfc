//! The scan-match-act loop.
//!
//! A `ScanLoop` runs on its own thread. The presentation keeps a
//! `LoopHandle` to observe the state and request a stop; the run flag is the
//! only state both sides write. A stop request only clears the flag: the
//! loop notices at the next cycle boundary, finishes, and then delivers the
//! stop notification from its own thread, exactly once.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dispatcher::Dispatcher;
use crate::logger;
use crate::notifier::Notifier;
use crate::platform::{InputDriver, ScreenCapture};
use crate::press_log::ButtonLog;
use crate::settings::LoopConfig;
use crate::sleep;
use crate::templates::{TemplateError, TemplateSet};
use crate::types::{ActionOutcome, LoopEvent, LoopState};

pub const STOP_IMAGE_REASON: &str = "stop image detected";
pub const UNEXPECTED_ERROR_REASON: &str = "unexpected error";

struct Shared {
    running: AtomicBool,
    state: Mutex<LoopState>,
    /// Reason of the one stop request that cleared `running`
    reason: Mutex<Option<String>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cloneable view of a loop for other threads.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LoopState {
        *lock(&self.shared.state)
    }

    /// Ask the loop to stop after its current cycle. Only the first request
    /// counts; it returns true. A loop asked to stop before it started skips
    /// its cycles altogether.
    pub fn request_stop(&self, reason: &str) -> bool {
        // Held across the flag flip so the loop never sees a cleared flag
        // without its reason.
        let mut slot = lock(&self.shared.reason);
        let was_running = self
            .shared
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !was_running && (slot.is_some() || *lock(&self.shared.state) != LoopState::Idle) {
            return false;
        }
        *slot = Some(reason.to_string());
        drop(slot);
        logger::info(&format!("scan loop stopping: {}", reason));
        true
    }
}

/// One scan loop instance. Single use: once stopped, build a new one.
pub struct ScanLoop {
    config: LoopConfig,
    notifier: Arc<dyn Notifier>,
    events: Option<Sender<LoopEvent>>,
    shared: Arc<Shared>,
    cycles: u64,
}

impl ScanLoop {
    pub fn new(config: LoopConfig, notifier: Arc<dyn Notifier>, events: Option<Sender<LoopEvent>>) -> Self {
        Self {
            config,
            notifier,
            events,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(LoopState::Idle),
                reason: Mutex::new(None),
            }),
            cycles: 0,
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle { shared: Arc::clone(&self.shared) }
    }

    /// Number of scan cycles executed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    fn set_state(&self, state: LoopState) {
        *lock(&self.shared.state) = state;
        self.emit(LoopEvent::State(state));
    }

    fn status(&self, text: impl Into<String>) {
        self.emit(LoopEvent::Status(text.into()));
    }

    /// Mark a loop that never got to run as `Failed`. Returns false when the
    /// loop already left `Idle`.
    pub fn fail(&self, reason: &str) -> bool {
        {
            let mut state = lock(&self.shared.state);
            if *state != LoopState::Idle {
                return false;
            }
            *state = LoopState::Failed;
        }
        logger::error(&format!("scan loop failed: {}", reason));
        self.status(format!("failed: {}", reason));
        self.emit(LoopEvent::State(LoopState::Failed));
        true
    }

    /// Load the reference images and run cycles until stopped. Blocks.
    ///
    /// Returns the configuration error when the images cannot be loaded; the
    /// loop is then `Failed` and no cycle runs. Calling this on a loop that
    /// already left `Idle` does nothing.
    pub fn run(
        &mut self,
        screen: &mut dyn ScreenCapture,
        input: &mut dyn InputDriver,
    ) -> Result<(), TemplateError> {
        if self.handle().state() != LoopState::Idle {
            logger::warn("scan loop already used; create a new one to run again");
            return Ok(());
        }

        let templates = match TemplateSet::load(&self.config.images_dir) {
            Ok(t) => t,
            Err(e) => {
                logger::error(&format!("failed to load templates: {}", e));
                self.status(format!("failed: {}", e));
                self.set_state(LoopState::Failed);
                return Err(e);
            }
        };
        self.emit(LoopEvent::Templates(templates.describe(&self.config.images_dir)));
        for (slot, img) in [("approved", &templates.approved), ("stop", &templates.stop)] {
            if img.is_none() {
                logger::info(&format!("{} image not present, feature disabled", slot));
            }
        }

        {
            let pending = lock(&self.shared.reason);
            if let Some(reason) = pending.as_deref() {
                logger::info(&format!("scan loop cancelled before start: {}", reason));
                self.status(format!("stopped: {}", reason));
                self.set_state(LoopState::Stopped);
                return Ok(());
            }
            self.shared.running.store(true, Ordering::Release);
            self.set_state(LoopState::Running);
        }
        self.status("running");
        logger::info("scan loop started");

        let button_log = ButtonLog::new(self.config.button_log.clone());

        let handle = self.handle();
        while handle.is_running() {
            self.cycles += 1;
            let dispatcher = Dispatcher {
                templates: &templates,
                threshold: self.config.confidence_threshold,
                strategy: &self.config.strategy,
                timings: &self.config.timings,
                button_log: &button_log,
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                dispatcher.process_cycle(&mut *screen, &mut *input)
            }));
            match outcome {
                Ok(ActionOutcome::Stopped) => {
                    self.status(STOP_IMAGE_REASON);
                    handle.request_stop(STOP_IMAGE_REASON);
                }
                Ok(ActionOutcome::Acted) => {
                    logger::info("action completed");
                    self.status(format!("scan #{}: action performed", self.cycles));
                }
                Ok(ActionOutcome::NoAction) => {
                    self.status(format!("scan #{}: nothing to do", self.cycles));
                }
                Err(payload) => {
                    logger::error(&format!("unexpected error in scan cycle: {}", logger::panic_message(&*payload)));
                    handle.request_stop(UNEXPECTED_ERROR_REASON);
                }
            }

            sleep::sleep_while(self.config.timings.scan_interval, &self.shared.running);
        }

        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        let reason = lock(&self.shared.reason)
            .take()
            .unwrap_or_else(|| UNEXPECTED_ERROR_REASON.to_string());
        self.set_state(LoopState::Stopped);
        self.status(format!("stopped: {}", reason));
        logger::info(&format!("scan loop stopped after {} cycle(s): {}", self.cycles, reason));

        if self.notifier.notify(&reason) {
            logger::info(&format!("stop notification sent: {}", reason));
        } else {
            logger::warn("stop notification not delivered");
        }
    }
}
