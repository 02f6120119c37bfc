use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use btnsprite_core::controller::{Controller, JoinOutcome, MANUAL_STOP_REASON};
use btnsprite_core::logger;
use btnsprite_core::settings::Settings;
use btnsprite_core::templates::TemplateSet;
use btnsprite_core::types::{LoopEvent, LoopState, SlotInfo};

use crate::confirm::{ConfirmDialog, MessagePrompt};

/// Overlay capturing keyboard input.
pub enum Modal {
    ConfirmQuit(ConfirmDialog),
    Compose(MessagePrompt),
}

pub struct App {
    pub controller: Controller,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub loop_state: LoopState,
    pub status: String,
    pub slots: Vec<SlotInfo>,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub event_rx: mpsc::Receiver<LoopEvent>,
    pub modal: Option<Modal>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        controller: Controller,
        settings: Settings,
        settings_path: PathBuf,
        log_rx: mpsc::Receiver<String>,
        event_rx: mpsc::Receiver<LoopEvent>,
    ) -> Self {
        let slots = TemplateSet::survey(&settings.images_dir);
        Self {
            controller,
            settings,
            settings_path,
            loop_state: LoopState::Idle,
            status: "ready".into(),
            slots,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            event_rx,
            modal: None,
            should_quit: false,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
            // Keep the view still while scrolled back.
            if self.log_scroll > 0 {
                self.log_scroll += 1;
            }
        }
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                LoopEvent::State(state) => self.loop_state = state,
                LoopEvent::Status(text) => self.status = text,
                LoopEvent::Templates(slots) => self.slots = slots,
            }
        }
    }

    /// Whether a loop thread is alive, including one that is finishing.
    pub fn is_running(&self) -> bool {
        self.controller.is_active()
    }

    pub fn start_stop(&mut self) {
        if self.is_running() {
            self.status = "stopping...".into();
            if self.controller.stop(MANUAL_STOP_REASON) == JoinOutcome::StillRunning {
                self.status = "stopping after the current cycle".into();
            }
            return;
        }

        self.slots = TemplateSet::survey(&self.settings.images_dir);
        if self.controller.start(self.settings.loop_config()) {
            self.status = "starting".into();
        }
    }

    /// Flip direct-click mode and persist it. Ignored while a loop runs.
    pub fn toggle_direct_click(&mut self) {
        if self.is_running() {
            self.status = "stop the loop before changing the click mode".into();
            return;
        }
        self.settings.direct_click_mode = !self.settings.direct_click_mode;
        let mode = if self.settings.direct_click_mode { "direct click" } else { "text entry" };
        logger::info(&format!("click mode: {}", mode));
        if let Err(e) = self.settings.save(&self.settings_path) {
            logger::error(&format!("failed to save settings: {:#}", e));
        }
    }

    pub fn open_compose(&mut self) {
        self.modal = Some(Modal::Compose(MessagePrompt::new()));
    }

    /// Send the composed message off the UI thread; the notifier logs the result.
    pub fn send_message(&mut self, text: String) {
        self.modal = None;
        if text.trim().is_empty() {
            return;
        }
        self.status = "sending message...".into();
        let notifier = self.controller.notifier();
        let spawned = thread::Builder::new()
            .name("notify".into())
            .spawn(move || {
                if notifier.send_message(&text) {
                    logger::info("message sent");
                }
            });
        if let Err(e) = spawned {
            logger::error(&format!("failed to spawn notifier thread: {}", e));
        }
    }

    /// Quit, asking first while a loop is running.
    pub fn request_quit(&mut self) {
        if self.is_running() {
            self.modal = Some(Modal::ConfirmQuit(ConfirmDialog::new(
                "The scan loop is running. Stop it and quit?",
            )));
        } else {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.modal = None;
        self.should_quit = true;
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }
}
