use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, trace};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::client::controller::{ClientEvent, Controller, SubmitOutcome};
use crate::client::status::{connection_label, connection_style, spinner_frame};
use crate::telemetry::PerfGuard;
use crate::terminal::error::CliError;
use crate::transcript::{Role, Transcript};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PAGE_LINES: usize = 10;

type Tui = Terminal<CrosstermBackend<Stdout>>;

struct ScreenGuard {
    tui: Tui,
}

impl ScreenGuard {
    fn enter() -> Result<Self, CliError> {
        enable_raw_mode().map_err(terminal_error)?;
        let mut stdout = io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen, EnableBracketedPaste) {
            let _ = disable_raw_mode();
            return Err(terminal_error(err));
        }
        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(tui) => Ok(Self { tui }),
            Err(err) => {
                restore_screen(&mut io::stdout());
                Err(terminal_error(err))
            }
        }
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        let _ = self.tui.show_cursor();
        restore_screen(self.tui.backend_mut());
    }
}

fn restore_screen<W: io::Write>(out: &mut W) {
    let _ = disable_raw_mode();
    let _ = execute!(out, DisableBracketedPaste, LeaveAlternateScreen);
}

fn terminal_error(err: io::Error) -> CliError {
    CliError::Terminal(err.to_string())
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    None,
    Submit,
    Quit,
}

struct InputLine {
    buffer: String,
}

impl InputLine {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

pub fn run(
    mut controller: Controller,
    mut events: UnboundedReceiver<ClientEvent>,
) -> Result<(), CliError> {
    let mut screen = ScreenGuard::enter()?;
    let mut input = InputLine::new();
    let mut tick: usize = 0;
    debug!(target: "dockhand::tui", "ui loop started");

    let result = (|| -> Result<(), CliError> {
        loop {
            controller.drain(&mut events);
            {
                let _guard = PerfGuard::new("tui_render");
                screen
                    .tui
                    .draw(|frame| render(frame, &mut controller, &input, tick))
                    .map_err(terminal_error)?;
            }
            tick = tick.wrapping_add(1);

            if !event::poll(POLL_INTERVAL).map_err(terminal_error)? {
                continue;
            }
            match event::read().map_err(terminal_error)? {
                Event::Key(key) => match handle_key(key, &mut controller, &mut input) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Submit => submit(&mut controller, &mut input),
                    KeyAction::None => {}
                },
                Event::Paste(data) => {
                    if controller.input_enabled() {
                        input.buffer.push_str(&paste_text(&data));
                    }
                }
                _ => {}
            }
        }
    })();

    controller.shutdown();
    debug!(target: "dockhand::tui", "ui loop stopped");
    result
}

// Pasted line breaks become spaces; the input is a single line.
fn paste_text(data: &str) -> String {
    data.chars()
        .map(|ch| if matches!(ch, '\n' | '\r') { ' ' } else { ch })
        .filter(|ch| !ch.is_control())
        .collect()
}

fn submit(controller: &mut Controller, input: &mut InputLine) {
    let text = input.take();
    match controller.submit(&text) {
        Ok(SubmitOutcome::Sent) => {}
        Ok(SubmitOutcome::Ignored) => {}
        Err(err) => {
            // Input is disabled while locked, so this only fires on a race with a reply.
            debug!(target: "dockhand::tui", error = %err, "submit refused");
            input.buffer = text;
        }
    }
}

fn handle_key(key: KeyEvent, controller: &mut Controller, input: &mut InputLine) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::None;
    }
    trace!(target: "dockhand::tui", ?key, "key event");
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => KeyAction::Quit,
        (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            KeyAction::Quit
        }
        (KeyCode::PageUp, _) => {
            controller.transcript_mut().scroll_up(PAGE_LINES);
            KeyAction::None
        }
        (KeyCode::PageDown, _) => {
            controller.transcript_mut().scroll_down(PAGE_LINES);
            KeyAction::None
        }
        _ if !controller.input_enabled() => KeyAction::None,
        (KeyCode::Enter, _) => KeyAction::Submit,
        (KeyCode::Backspace, _) => {
            input.buffer.pop();
            KeyAction::None
        }
        (KeyCode::Char(ch), modifiers)
            if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            input.buffer.push(ch);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn render(frame: &mut Frame, controller: &mut Controller, input: &InputLine, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_transcript(frame, chunks[0], controller.transcript_mut());
    render_input(frame, chunks[1], controller, input);
    render_status(frame, chunks[2], controller, tick);
}

fn render_transcript(frame: &mut Frame, area: Rect, transcript: &mut Transcript) {
    let block = Block::default().borders(Borders::ALL).title(" dockhand ");
    let inner = block.inner(area);
    let lines = transcript_lines(transcript, inner.width as usize);
    let height = inner.height as usize;

    let max_scroll = lines.len().saturating_sub(height);
    if transcript.scroll_from_bottom() > max_scroll {
        let excess = transcript.scroll_from_bottom() - max_scroll;
        transcript.scroll_down(excess);
    }
    let (start, end) = visible_window(lines.len(), height, transcript.scroll_from_bottom());
    let visible: Vec<Line<'static>> = lines[start..end].to_vec();
    frame.render_widget(Paragraph::new(visible).block(block), area);
}

fn render_input(frame: &mut Frame, area: Rect, controller: &Controller, input: &InputLine) {
    let enabled = controller.input_enabled();
    let border_style = if enabled {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);

    let content = if input.buffer.is_empty() {
        Line::from(Span::styled(
            controller.placeholder(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        Line::from(input.buffer.clone())
    };
    frame.render_widget(Paragraph::new(content).block(block), area);

    if enabled && inner.width > 0 {
        let typed = UnicodeWidthStr::width(input.buffer.as_str()) as u16;
        let x = inner.x + typed.min(inner.width.saturating_sub(1));
        frame.set_cursor_position((x, inner.y));
    }
}

fn render_status(frame: &mut Frame, area: Rect, controller: &Controller, tick: usize) {
    let status = controller.connection_status();
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(connection_label(status), connection_style(status)),
        Span::raw("  "),
        Span::raw(controller.session().phase().to_string()),
    ];
    if controller.is_busy() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} waiting for reply", spinner_frame(tick)),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(Span::styled(
        "  esc quit  pgup/pgdn scroll",
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn role_label(role: Role) -> (&'static str, Style) {
    match role {
        Role::User => ("you", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Role::Bot => (
            "assistant",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Role::System => (
            "system",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
    }
}

fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for entry in transcript.entries() {
        let role = entry.message().role();
        let (label, label_style) = role_label(role);
        let body_style = if role == Role::System {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(label, label_style)));
        let layout = entry.layout();
        for text in &layout.lead {
            for piece in wrap(text, width) {
                lines.push(Line::from(Span::styled(piece, body_style)));
            }
        }
        if let Some(items) = &layout.details {
            lines.push(Line::from(Span::styled(
                "Processing Details:",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for item in items {
                for (index, piece) in wrap(item, width.saturating_sub(2).max(1))
                    .into_iter()
                    .enumerate()
                {
                    let bullet = if index == 0 { "• " } else { "  " };
                    lines.push(Line::from(vec![
                        Span::styled(bullet, Style::default().fg(Color::DarkGray)),
                        Span::raw(piece),
                    ]));
                }
            }
        }
    }
    lines
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    if UnicodeWidthStr::width(text) <= width {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = start;
        let mut used = 0;
        while end < chars.len() {
            let cols = UnicodeWidthChar::width(chars[end]).unwrap_or(0);
            // Always take one char so a glyph wider than the pane still makes progress.
            if used + cols > width && end > start {
                break;
            }
            used += cols;
            end += 1;
        }
        if end < chars.len() {
            if let Some(space) = chars[start..end].iter().rposition(|ch| *ch == ' ') {
                if space > 0 {
                    end = start + space;
                }
            }
        }
        out.push(chars[start..end].iter().collect());
        start = end;
        while start < chars.len() && chars[start] == ' ' {
            start += 1;
        }
    }
    out
}

fn visible_window(total: usize, height: usize, from_bottom: usize) -> (usize, usize) {
    let end = total.saturating_sub(from_bottom);
    let start = end.saturating_sub(height);
    (start, end)
}
