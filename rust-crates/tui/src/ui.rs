use crate::client::AppSnapshot;
use chrono::Utc;
use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use haiku_core::{Countdown, count_syllables};
use itertools::Itertools;
use ratatui::{prelude::*, widgets::*};
use std::io::stdout;
use unicode_width::UnicodeWidthStr;

pub enum UserEvent {
    Quit,
    Redraw,
    Refresh,
    Submit(String),
    Vote,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Today,
    Voting,
    Profile,
    Winners,
}

impl View {
    fn title(self) -> &'static str {
        match self {
            View::Today => "Today",
            View::Voting => "Voting",
            View::Profile => "Profile",
            View::Winners => "Winners",
        }
    }

    fn all() -> [View; 4] {
        [View::Today, View::Voting, View::Profile, View::Winners]
    }

    fn next(self) -> View {
        match self {
            View::Today => View::Voting,
            View::Voting => View::Profile,
            View::Profile => View::Winners,
            View::Winners => View::Today,
        }
    }

    fn prev(self) -> View {
        match self {
            View::Today => View::Winners,
            View::Voting => View::Today,
            View::Profile => View::Voting,
            View::Winners => View::Profile,
        }
    }
}

#[derive(Debug)]
pub struct UiState {
    view: View,
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            view: View::Today,
            mode: Mode::Normal,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    SubmitModal(SubmitState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct SubmitState {
    input: String,
}

pub type InputEvents = EventStream;

pub fn input_event_stream() -> InputEvents {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEvents) -> Result<Event> {
    match events.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(err)) => Err(err.into()),
        None => Err(eyre!("input event stream ended")),
    }
}

/// Turns a raw terminal event into a semantic event, updating modal state
/// along the way. `None` means nothing to do, not even a redraw.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    match &mut state.mode {
        Mode::SubmitModal(ss) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let text = ss.input.trim().to_string();
                state.mode = Mode::Normal;
                Some(UserEvent::Submit(text))
            }
            KeyCode::Backspace => {
                ss.input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                ss.input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Enter | KeyCode::Char('y') => Some(UserEvent::Quit),
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('1') => {
                state.view = View::Today;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('2') => {
                state.view = View::Voting;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('3') => {
                state.view = View::Profile;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('4') => {
                state.view = View::Winners;
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Tab => {
                state.view = state.view.next();
                Some(UserEvent::Redraw)
            }
            KeyCode::Left => {
                state.view = state.view.prev();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('s') | KeyCode::Enter => {
                state.mode = Mode::SubmitModal(SubmitState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('v') => Some(UserEvent::Vote),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            _ => None,
        },
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen
    )?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header with tabs and countdown
            Constraint::Min(10),   // active view
            Constraint::Length(5), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], state, snap);
    match state.view {
        View::Today => draw_today(f, chunks[1], snap),
        View::Voting => draw_voting(f, chunks[1], snap),
        View::Profile => draw_profile(f, chunks[1], snap),
        View::Winners => draw_winners(f, chunks[1], snap),
    }
    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3]);
    draw_modals(f, state, snap);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let countdown = Countdown::until(snap.closes_at, Utc::now());
    let tabs = View::all()
        .iter()
        .map(|v| {
            if *v == state.view {
                format!("[{}]", v.title())
            } else {
                format!(" {} ", v.title())
            }
        })
        .join(" ");
    let wallet = match &snap.wallet {
        Some(address) => address.short(),
        None => "no wallet".to_string(),
    };
    let text = format!(
        "{tabs}   Day {}   Closes in {countdown}   {wallet}",
        snap.day_id
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Daily Haiku"));
    f.render_widget(widget, area);
}

fn progress_dots(submitted: u8) -> String {
    (1..=3u8)
        .map(|n| if n <= submitted { "●" } else { "○" })
        .join(" ")
}

/// Pads a line so the syllable badges line up in one column.
fn aligned_line(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(UnicodeWidthStr::width(text));
    format!("{text}{}", " ".repeat(pad))
}

fn haiku_lines(snap_day: &haiku_core::DaySnapshot) -> Vec<Line<'static>> {
    let widest = snap_day
        .lines
        .iter()
        .map(|l| UnicodeWidthStr::width(l.text.as_str()))
        .max()
        .unwrap_or(0);
    snap_day
        .lines
        .iter()
        .map(|line| {
            Line::from(vec![
                Span::raw(format!("  {}", aligned_line(&line.text, widest))),
                Span::styled(
                    format!("  ({} syllables)", line.syllables),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("  {}", line.author.short()),
                    Style::default().fg(Color::Cyan),
                ),
            ])
        })
        .collect()
}

fn draw_today(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(format!(
        "  {}   {} vote{}",
        progress_dots(snap.today.submitted_count),
        snap.today.vote_count,
        if snap.today.vote_count == 1 { "" } else { "s" }
    )));
    lines.push(Line::from(""));
    lines.extend(haiku_lines(&snap.today));
    match snap.next_slot {
        Some(slot) => {
            lines.push(Line::from(Span::styled(
                format!(
                    "  waiting for the {} ({} syllables)...",
                    slot.label(),
                    slot.required_syllables()
                ),
                Style::default().fg(Color::DarkGray),
            )));
            lines.push(Line::from(""));
            if snap.submitted_today {
                lines.push(Line::from(Span::styled(
                    "  You already added your line today. Come back tomorrow!",
                    Style::default().fg(Color::Green),
                )));
            } else {
                lines.push(Line::from("  Press s to submit this line"));
            }
        }
        None => {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "  Today's haiku is complete",
                Style::default().fg(Color::Green),
            )));
        }
    }
    if let Some(attempt) = &snap.submit
        && let Some(message) = &attempt.message
    {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {message}"),
            Style::default().fg(Color::Yellow),
        )));
    }
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Today's Haiku"),
    );
    f.render_widget(widget, area);
}

fn draw_voting(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    match &snap.yesterday {
        Some(day) if !day.lines.is_empty() => {
            lines.extend(haiku_lines(day));
            lines.push(Line::from(""));
            lines.push(Line::from(format!(
                "  {} vote{}",
                day.vote_count,
                if day.vote_count == 1 { "" } else { "s" }
            )));
            if day.winner_declared {
                lines.push(Line::from(Span::styled(
                    if day.is_winning {
                        "  This haiku won its day!"
                    } else {
                        "  Winners for this day have been declared"
                    },
                    Style::default().fg(Color::Magenta),
                )));
            }
            lines.push(Line::from(""));
            if snap.voted_yesterday {
                lines.push(Line::from(Span::styled(
                    "  You voted on this haiku",
                    Style::default().fg(Color::Green),
                )));
            } else {
                lines.push(Line::from("  Press v to vote for yesterday's haiku"));
            }
        }
        Some(_) => {
            lines.push(Line::from("  Yesterday's haiku never got started"));
        }
        None => {
            lines.push(Line::from("  No haiku yet, this is the first day"));
        }
    }
    if let Some(attempt) = &snap.vote
        && let Some(message) = &attempt.message
    {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {message}"),
            Style::default().fg(Color::Yellow),
        )));
    }
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Yesterday's Haiku"),
    );
    f.render_widget(widget, area);
}

fn draw_profile(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    match &snap.wallet {
        Some(address) => {
            lines.push(Line::from(format!("  Address: {address}")));
            lines.push(Line::from(format!(
                "  Streak: {} day{}",
                snap.streak,
                if snap.streak == 1 { "" } else { "s" }
            )));
            lines.push(Line::from(format!(
                "  Submitted today: {}",
                if snap.submitted_today { "yes" } else { "not yet" }
            )));
            lines.push(Line::from(format!(
                "  Voted yesterday: {}",
                if snap.voted_yesterday { "yes" } else { "no" }
            )));
        }
        None => {
            lines.push(Line::from(
                "  No wallet connected. Restart with --wallet <name> to play.",
            ));
        }
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Profile"));
    f.render_widget(widget, area);
}

fn draw_winners(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    if snap.winners.is_empty() {
        lines.push(Line::from("  No winners declared in the past week"));
    }
    for day in &snap.winners {
        let authors = day.winners.iter().map(|w| w.short()).join(", ");
        lines.push(Line::from(format!("  Day {}: {}", day.day_id, authors)));
    }
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Recent Winners"),
    );
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "1-4/←/→ switch view | s submit line | v vote | r refresh | q quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::Normal => {}
        Mode::SubmitModal(ss) => draw_submit_modal(f, ss, snap),
        Mode::QuitModal => {
            let area = centered_rect(30, 20, f.area());
            f.render_widget(Clear, area);
            let widget = Paragraph::new("Quit? (y/n)")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Confirm"));
            f.render_widget(widget, area);
        }
    }
}

fn draw_submit_modal(f: &mut Frame, ss: &SubmitState, snap: &AppSnapshot) {
    let area = centered_rect(70, 30, f.area());
    f.render_widget(Clear, area);

    let (title, required) = match snap.next_slot {
        Some(slot) => (
            format!("Your {} ({} syllables)", slot.label(), slot.required_syllables()),
            Some(slot.required_syllables()),
        ),
        None => ("Today's haiku is already complete".to_string(), None),
    };
    let counted = count_syllables(&ss.input);
    let count_style = match required {
        Some(required) if counted == required && !ss.input.trim().is_empty() => {
            Style::default().fg(Color::Green)
        }
        _ => Style::default().fg(Color::Red),
    };
    let lines = vec![
        Line::from(format!("> {}", ss.input)),
        Line::from(""),
        Line::from(vec![
            Span::raw("Syllables: "),
            Span::styled(counted.to_string(), count_style),
            match required {
                Some(required) => Span::raw(format!(" of {required}")),
                None => Span::raw(""),
            },
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter to submit, Esc to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
