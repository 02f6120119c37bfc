use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Yes/No dialog, defaulting to No.
pub struct ConfirmDialog {
    pub message: String,
    pub selected: bool, // true = Yes
}

impl ConfirmDialog {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), selected: false }
    }

    pub fn toggle(&mut self) {
        self.selected = !self.selected;
    }

    pub fn render(&self, f: &mut Frame) {
        let width = (self.message.chars().count() as u16 + 6).max(40);
        let area = centered_rect(width, 7, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Confirm ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1), // message
                Constraint::Length(1),
                Constraint::Length(1), // buttons
            ])
            .split(inner);

        let msg = Paragraph::new(Line::from(Span::styled(
            &self.message,
            Style::default().fg(Color::White),
        )))
        .alignment(Alignment::Center);
        f.render_widget(msg, chunks[1]);

        let yes_style = if self.selected {
            Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let no_style = if !self.selected {
            Style::default().fg(Color::Black).bg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let buttons = Line::from(vec![
            Span::styled("  [Yes]  ", yes_style),
            Span::raw("   "),
            Span::styled("  [No]  ", no_style),
        ]);
        f.render_widget(Paragraph::new(buttons).alignment(Alignment::Center), chunks[3]);
    }
}

/// Single-line text input for a free-form notifier message.
#[derive(Default)]
pub struct MessagePrompt {
    pub text: String,
}

impl MessagePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop(&mut self) {
        self.text.pop();
    }

    pub fn render(&self, f: &mut Frame) {
        let area = centered_rect(60, 6, f.area());
        f.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Send message ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1), // input
                Constraint::Length(1),
                Constraint::Length(1), // hint
            ])
            .split(inner);

        let input = Paragraph::new(Line::from(vec![
            Span::styled(" > ", Style::default().fg(Color::Yellow)),
            Span::styled(&self.text, Style::default().fg(Color::White)),
            Span::styled("_", Style::default().fg(Color::DarkGray)),
        ]));
        f.render_widget(input, chunks[1]);

        let hint = Paragraph::new(Line::from(vec![
            Span::styled("enter", Style::default().fg(Color::Yellow)),
            Span::raw(" send, "),
            Span::styled("esc", Style::default().fg(Color::Yellow)),
            Span::raw(" cancel"),
        ]))
        .alignment(Alignment::Center);
        f.render_widget(hint, chunks[3]);
    }
}

/// Return a centered `Rect` of `width` columns and `height` rows inside `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
