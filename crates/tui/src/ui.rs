use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use btnsprite_core::logger;
use btnsprite_core::types::LoopState;

use crate::app::Modal;
use crate::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
        .split(chunks[0]);

    draw_banner(f, app, left[0]);
    draw_panel(f, app, left[1]);

    let status = Paragraph::new(Line::from(vec![
        Span::styled(" status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(&app.status, Style::default().fg(Color::White)),
    ]));
    f.render_widget(status, left[2]);

    if app.log_visible && chunks.len() > 1 {
        draw_logs(f, app, chunks[1]);
    }

    match &app.modal {
        Some(Modal::ConfirmQuit(dialog)) => dialog.render(f),
        Some(Modal::Compose(prompt)) => prompt.render(f),
        None => {}
    }
}

fn draw_banner(f: &mut Frame, app: &App, area: Rect) {
    let (label, bg) = if app.is_running() {
        match app.loop_state {
            LoopState::Running => ("RUNNING (Press S to stop)", Color::Green),
            LoopState::Stopped | LoopState::Failed => ("STOPPING...", Color::Yellow),
            LoopState::Idle => ("STARTING...", Color::Yellow),
        }
    } else {
        match app.loop_state {
            LoopState::Failed => ("FAILED (Press S to retry)", Color::Red),
            _ => ("STOPPED (Press S to start)", Color::Red),
        }
    };

    let width = area.width as usize;
    let pad_total = width.saturating_sub(label.len());
    let pad_left = pad_total / 2;
    let centered = format!("{}{}{}", " ".repeat(pad_left), label, " ".repeat(pad_total - pad_left));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered,
        Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, area);
}

fn key_hint<'a>(key: &'a str, text: &'a str) -> Vec<Span<'a>> {
    vec![
        Span::styled(key, Style::default().fg(Color::Yellow)),
        Span::raw(text),
    ]
}

fn draw_panel(f: &mut Frame, app: &App, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let s = &app.settings;

    let mut hints = vec![Span::raw(" ")];
    hints.extend(key_hint("d", " click mode, "));
    hints.extend(key_hint("n", " message, "));
    hints.extend(key_hint("l", " logs, "));
    hints.extend(key_hint("q", " quit"));

    let mode = if s.direct_click_mode {
        "direct click".to_string()
    } else {
        format!("text entry (\"{}\" then \"{}\")", s.input_text, s.fallback_text)
    };

    let mut lines = vec![
        Line::from(hints),
        Line::from(""),
        Line::from(vec![Span::styled("  click mode  ", label), Span::styled(mode, value)]),
        Line::from(vec![
            Span::styled("  threshold   ", label),
            Span::styled(format!("{:.2}", s.confidence_threshold), value),
        ]),
        Line::from(vec![
            Span::styled("  interval    ", label),
            Span::styled(format!("{}s", s.scan_interval_secs), value),
        ]),
        Line::from(vec![
            Span::styled("  images      ", label),
            Span::styled(s.images_dir.display().to_string(), value),
        ]),
        Line::from(""),
    ];

    for info in &app.slots {
        let (mark, color, detail) = match info.size {
            Some((w, h)) => ("[●]", Color::Green, format!("{}x{}", w, h)),
            None if info.slot.is_required() => ("[!]", Color::Red, "missing (required)".to_string()),
            None => ("[ ]", Color::DarkGray, "absent, disabled".to_string()),
        };
        lines.push(Line::from(vec![
            Span::raw("  "),
            Span::styled(mark, Style::default().fg(color)),
            Span::raw(" "),
            Span::styled(
                format!("{:<9}", info.slot.label()),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("{:<13}", info.slot.file_name()), Style::default().fg(Color::Yellow)),
            Span::styled(detail, Style::default().fg(color)),
        ]));
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(panel, area);
}

fn draw_logs(f: &mut Frame, app: &App, area: Rect) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let total = app.log_messages.len();
    let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
    let start = total.saturating_sub(visible_height + scroll);
    let end = total.saturating_sub(scroll);
    let lines: Vec<Line> = app.log_messages[start..end]
        .iter()
        .map(|m| log_line(m))
        .collect();

    let panel = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Logs ")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

/// Color one formatted log line for the log pane.
fn log_line(raw: &str) -> Line<'_> {
    let Some((ts, level, msg)) = logger::parse_line(raw) else {
        return Line::from(raw);
    };

    let mut spans = vec![
        Span::styled(ts, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    // Only warnings and errors get a tag.
    let msg_color = match level {
        "ERROR" => {
            spans.push(Span::styled("error ", Style::default().fg(Color::Red)));
            Color::LightRed
        }
        "WARNING" => {
            spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow)));
            Color::White
        }
        _ => Color::White,
    };
    spans.push(Span::styled(msg, Style::default().fg(msg_color)));
    Line::from(spans)
}
