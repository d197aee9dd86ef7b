mod app;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame, Terminal,
};
use tracing::{info, warn};

use app::{bar, truncate, Action, App, Focus, InputMode};
use football_pulse::cell::LatencyStats;
use football_pulse::config::Config;
use football_pulse::credential::CredentialStore;
use football_pulse::error::{AppError, Result};
use football_pulse::logging;
use football_pulse::panel::Panels;
use football_pulse::view::PanelView;

const REDRAW_EVERY: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cfg = Config::from_env()?;
    if let Some(path) = std::env::var_os("TUI_LOG_FILE") {
        logging::init_file(&cfg.log_level, &PathBuf::from(path))?;
    }

    let credentials = CredentialStore::new(&cfg.credential_path);
    let credential = credentials
        .resolve(cfg.football_api_key.as_deref())?
        .ok_or_else(|| AppError::Config("no API key: set FOOTBALL_API_KEY".to_string()))?;

    let panels = Panels::build(&cfg, credential, Arc::new(LatencyStats::new()))?;
    let mut app = App::new(panels.in_play.is_some());
    info!("TUI started");

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_loop(&mut terminal, &mut app, &panels);

    // Restore terminal regardless of result
    panels.teardown_all();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!("TUI closed");

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    panels: &Panels,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app, panels))?;

        if !event::poll(REDRAW_EVERY)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key.code) {
            Action::None => {}
            Action::Quit => return Ok(()),
            Action::Refresh(Focus::Matches) => {
                panels.live_matches.trigger();
            }
            Action::Refresh(Focus::InPlay) => {
                if let Some(in_play) = &panels.in_play {
                    in_play.trigger();
                }
            }
            Action::Refresh(Focus::Prediction) => match panels.prediction.current_match_id() {
                Some(id) => submit(panels, id),
                None => app.notice = Some("Press p to enter a match ID".to_string()),
            },
            Action::RefreshOdds => {
                panels.live_odds.trigger();
            }
            Action::OpenOdds => panels.live_odds.enable(),
            Action::CloseOdds => panels.live_odds.disable(),
            Action::Submit(id) => submit(panels, id),
        }
    }
}

fn submit(panels: &Panels, id: String) {
    let prediction = Arc::clone(&panels.prediction);
    tokio::spawn(async move {
        if let Err(e) = prediction.submit(&id).await {
            warn!(match_id = %id, "Prediction lookup rejected: {e}");
        }
    });
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &App, panels: &Panels) {
    let matches = PanelView::from_state("LIVE MATCHES", &panels.live_matches.snapshot());
    let in_play = panels
        .in_play
        .as_ref()
        .map(|c| PanelView::from_state("IN-PLAY", &c.snapshot()));
    let prediction = PanelView::from_state("PREDICTION", &panels.prediction.cell().snapshot());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // input / notice
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    render_header(f, &[Some(&matches), in_play.as_ref(), Some(&prediction)], chunks[0]);

    let focused = match app.focus {
        Focus::Matches => &matches,
        Focus::InPlay => in_play.as_ref().unwrap_or(&matches),
        Focus::Prediction => &prediction,
    };
    let placeholder = match app.focus {
        Focus::Prediction if panels.prediction.current_match_id().is_none() => {
            Some("Press p and type a match ID")
        }
        _ => None,
    };
    render_panel(f, focused, placeholder, chunks[1]);

    if app.odds_open {
        let odds = PanelView::from_state("LIVE ODDS", &panels.live_odds.snapshot());
        let popup = centered_rect(80, 70, chunks[1]);
        f.render_widget(Clear, popup);
        render_panel(f, &odds, None, popup);
    }

    render_input(f, app, chunks[2]);
    render_footer(f, chunks[3]);
}

fn render_header(f: &mut Frame, views: &[Option<&PanelView>], area: Rect) {
    let mut spans = vec![Span::styled(
        " Football Pulse  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    for view in views.iter().flatten() {
        let (glyph, color) = status_glyph(view);
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(format!("{glyph} {} ", view.title.to_lowercase()), Style::default().fg(color)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

fn status_glyph(view: &PanelView) -> (&'static str, Color) {
    if view.loading {
        ("◌", Color::Yellow)
    } else if view.error.is_some() {
        ("✗", Color::Red)
    } else if view.enabled {
        ("●", Color::Green)
    } else {
        ("○", Color::DarkGray)
    }
}

fn render_panel(f: &mut Frame, view: &PanelView, placeholder: Option<&str>, area: Rect) {
    let mut title = vec![Span::styled(
        format!(" {} ", view.title),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if view.loading {
        title.push(Span::styled("⟳ loading ", Style::default().fg(Color::Yellow)));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Line::from(title));

    let mut rows: Vec<Row> = Vec::new();
    if let Some(message) = view.error {
        rows.push(Row::new(vec![Cell::from(message).style(Style::default().fg(Color::Red))]));
    }
    if view.is_blank() {
        if let Some(text) = placeholder {
            rows.push(Row::new(vec![Cell::from(text).style(Style::default().fg(Color::DarkGray))]));
        }
    }
    for r in &view.rows {
        let detail = match r.gauge {
            Some(pct) => bar(pct, 20),
            None => r.secondary.clone(),
        };
        rows.push(Row::new(vec![
            Cell::from(truncate(&r.primary, 36)),
            Cell::from(detail).style(Style::default().fg(Color::White)),
            Cell::from(r.badge.clone()).style(Style::default().fg(Color::Cyan)),
        ]));
    }

    let table = Table::new(
        rows,
        [Constraint::Length(36), Constraint::Min(10), Constraint::Length(12)],
    )
    .block(block);
    f.render_widget(table, area);
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let line = match (&app.input, &app.notice) {
        (InputMode::MatchId(buf), _) => Line::from(vec![
            Span::styled(" Match ID: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{buf}_")),
        ]),
        (InputMode::Normal, Some(notice)) => {
            Line::from(Span::styled(format!(" {notice}"), Style::default().fg(Color::Red)))
        }
        (InputMode::Normal, None) => Line::default(),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let line = Line::from(vec![
        key(" [q] "),
        Span::raw("quit  "),
        key("[Tab] "),
        Span::raw("panel  "),
        key("[r] "),
        Span::raw("refresh  "),
        key("[o] "),
        Span::raw("odds  "),
        key("[p] "),
        Span::raw("predict"),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
