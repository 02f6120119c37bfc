use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::Modal;
use crate::App;
use crate::ui;

pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        app.drain_events();

        terminal.draw(|f| ui::draw(f, app))?;

        // 100ms poll keeps loop updates flowing while idle
        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_log_up(3),
                    MouseEventKind::ScrollDown => app.scroll_log_down(3),
                    _ => {}
                },
                _ => {}
            }
        }
    }
}

pub fn handle_key(app: &mut App, key: KeyEvent) {
    match app.modal.as_mut() {
        Some(Modal::ConfirmQuit(dialog)) => match key.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => dialog.toggle(),
            KeyCode::Char('y') | KeyCode::Char('Y') => app.quit(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.close_modal(),
            KeyCode::Enter => {
                if dialog.selected {
                    app.quit();
                } else {
                    app.close_modal();
                }
            }
            _ => {}
        },
        Some(Modal::Compose(prompt)) => match key.code {
            KeyCode::Char(c) => prompt.push(c),
            KeyCode::Backspace => prompt.pop(),
            KeyCode::Esc => app.close_modal(),
            KeyCode::Enter => {
                let text = std::mem::take(&mut prompt.text);
                app.send_message(text);
            }
            _ => {}
        },
        None => match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => app.request_quit(),
            KeyCode::Char('s') | KeyCode::Char('S') => app.start_stop(),
            KeyCode::Char('d') | KeyCode::Char('D') => app.toggle_direct_click(),
            KeyCode::Char('n') | KeyCode::Char('N') => app.open_compose(),
            KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
            KeyCode::PageUp => app.scroll_log_up(10),
            KeyCode::PageDown => app.scroll_log_down(10),
            _ => {}
        },
    }
}
