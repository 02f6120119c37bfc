use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use crossterm::{
    execute,
    event::{EnableMouseCapture, DisableMouseCapture},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use btnsprite_core::controller::Controller;
use btnsprite_core::logger::{self, ChannelSink, ConsoleSink};
use btnsprite_core::notifier;
use btnsprite_core::platform::create_platform;
use btnsprite_core::settings::Settings;
use btnsprite_core::templates::TemplateSet;
use btnsprite_core::types::LoopEvent;

fn main() -> Result<()> {
    let force_stub = std::env::args().any(|a| a == "--stub");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let logs_dir = cwd.join("logs");
    let settings_path = cwd.join("settings.json");

    // Console output until the terminal UI takes over
    let file_log = logger::init(&logs_dir);
    logger::add_sink("console", Box::new(ConsoleSink));
    if let Err(e) = file_log {
        logger::warn(&format!("file logging disabled ({}): {}", logs_dir.display(), e));
    }

    let settings = Settings::load(&settings_path);
    for info in TemplateSet::survey(&settings.images_dir) {
        if info.size.is_none() && info.slot.is_required() {
            logger::warn(&format!("required image missing: {}", info.path.display()));
        }
    }

    let notifier = notifier::from_env();
    let platform = create_platform(force_stub, settings.input_pause_ms);
    logger::info(&format!("platform: {}", platform.name()));

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let (event_tx, event_rx) = mpsc::channel::<LoopEvent>();
    let controller = Controller::new(platform, notifier, Some(event_tx));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    logger::remove_sink("console");
    logger::add_sink("tui", Box::new(ChannelSink::new(log_tx)));
    install_panic_hook();
    logger::info("btnsprite started");

    let mut app = btnsprite_tui::App::new(controller, settings, settings_path, log_rx, event_rx);
    let result = btnsprite_tui::event::run(&mut terminal, &mut app);

    // Back to the default hook
    drop(panic::take_hook());
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    // Back on the plain terminal while the loop winds down
    logger::remove_sink("tui");
    logger::add_sink("console", Box::new(ConsoleSink));
    app.controller.shutdown();
    logger::info("btnsprite exited");

    result
}

/// Panics go to the log while the panel owns the terminal. A panic on the UI
/// thread also gives the terminal back before the default report is printed.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        logger::log_panic(info.payload(), info.location());
        if thread::current().name() == Some("main") {
            disable_raw_mode().ok();
            execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture).ok();
            default_hook(info);
        }
    }));
}
