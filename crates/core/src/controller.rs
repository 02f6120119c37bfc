use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::logger;
use crate::notifier::Notifier;
use crate::platform::{InputDriver, Platform, ScreenCapture};
use crate::scan_loop::{LoopHandle, ScanLoop};
use crate::settings::LoopConfig;
use crate::types::{LoopEvent, LoopState};

pub const JOIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MANUAL_STOP_REASON: &str = "manual stop";
pub const SHUTDOWN_REASON: &str = "application closed";

/// Result of a bounded join on the loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// There was no loop thread.
    NotRunning,
    Joined,
    /// Still finishing its current cycle; it will exit by itself.
    StillRunning,
}

/// Owns the scan loop thread on behalf of the presentation.
pub struct Controller {
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    events: Option<Sender<LoopEvent>>,
    /// Most recent loop, kept after its thread exits
    handle: Option<LoopHandle>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(platform: Arc<dyn Platform>, notifier: Arc<dyn Notifier>, events: Option<Sender<LoopEvent>>) -> Self {
        Self { platform, notifier, events, handle: None, thread: None }
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Whether a loop thread is still alive.
    pub fn is_active(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn state(&self) -> LoopState {
        self.handle.as_ref().map_or(LoopState::Idle, |h| h.state())
    }

    /// Spawn a fresh loop. Returns false (and does nothing) while a loop is alive.
    pub fn start(&mut self, config: LoopConfig) -> bool {
        if self.is_active() {
            logger::warn("scan loop already running");
            return false;
        }
        self.reap();

        let mut scan = ScanLoop::new(config, Arc::clone(&self.notifier), self.events.clone());
        let handle = scan.handle();
        let platform = Arc::clone(&self.platform);

        let spawned = thread::Builder::new()
            .name("scan-loop".into())
            .spawn(move || match open_devices(platform.as_ref()) {
                Ok((mut screen, mut input)) => {
                    scan.run(screen.as_mut(), input.as_mut()).ok();
                }
                Err(e) => {
                    scan.fail(&format!("cannot open {} devices: {:#}", platform.name(), e));
                }
            });

        match spawned {
            Ok(thread) => {
                self.handle = Some(handle);
                self.thread = Some(thread);
                true
            }
            Err(e) => {
                logger::error(&format!("failed to spawn scan loop thread: {}", e));
                false
            }
        }
    }

    /// Request a stop and wait up to `JOIN_TIMEOUT` for the thread.
    pub fn stop(&mut self, reason: &str) -> JoinOutcome {
        if let Some(handle) = &self.handle {
            handle.request_stop(reason);
        }
        self.join_timeout(JOIN_TIMEOUT)
    }

    /// Wait up to `timeout` for the loop thread to exit.
    pub fn join_timeout(&mut self, timeout: Duration) -> JoinOutcome {
        let Some(worker) = &self.thread else {
            return JoinOutcome::NotRunning;
        };
        let deadline = Instant::now() + timeout;
        while !worker.is_finished() {
            if Instant::now() >= deadline {
                logger::warn("scan loop still finishing its current cycle; it will stop on its own");
                return JoinOutcome::StillRunning;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.reap();
        JoinOutcome::Joined
    }

    /// Stop for good and block until the loop thread has exited. The loop is
    /// never interrupted mid-action.
    pub fn shutdown(&mut self) {
        if self.stop(SHUTDOWN_REASON) == JoinOutcome::StillRunning {
            if let Some(worker) = self.thread.take() {
                logger::info("waiting for scan loop to finish");
                if worker.join().is_err() {
                    logger::error("scan loop thread panicked");
                }
            }
        }
    }

    /// Join a finished thread, reporting a panic that escaped the loop.
    fn reap(&mut self) {
        if self.thread.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(worker) = self.thread.take() {
                if worker.join().is_err() {
                    logger::error("scan loop thread panicked");
                }
            }
        }
    }
}

fn open_devices(platform: &dyn Platform) -> anyhow::Result<(Box<dyn ScreenCapture>, Box<dyn InputDriver>)> {
    Ok((platform.screen()?, platform.input()?))
}
