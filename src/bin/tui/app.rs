use crossterm::event::KeyCode;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Matches,
    InPlay,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a match id for the prediction panel.
    MatchId(String),
}

/// What the event loop should do in response to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Refresh(Focus),
    RefreshOdds,
    OpenOdds,
    CloseOdds,
    Submit(String),
}

#[derive(Debug, Clone)]
pub struct App {
    pub focus: Focus,
    pub odds_open: bool,
    pub input: InputMode,
    /// One-line message shown in the footer until the next key.
    pub notice: Option<String>,
    has_in_play: bool,
}

impl App {
    pub fn new(has_in_play: bool) -> Self {
        Self {
            focus: Focus::Matches,
            odds_open: false,
            input: InputMode::Normal,
            notice: None,
            has_in_play,
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Action {
        self.notice = None;
        match &mut self.input {
            InputMode::MatchId(buf) => match code {
                KeyCode::Enter => {
                    let id = buf.trim().to_string();
                    self.input = InputMode::Normal;
                    if id.is_empty() {
                        self.notice = Some("Please enter a match ID".to_string());
                        Action::None
                    } else {
                        Action::Submit(id)
                    }
                }
                KeyCode::Esc => {
                    self.input = InputMode::Normal;
                    Action::None
                }
                KeyCode::Backspace => {
                    buf.pop();
                    Action::None
                }
                KeyCode::Char(c) if !c.is_whitespace() => {
                    buf.push(c);
                    Action::None
                }
                _ => Action::None,
            },
            InputMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Char('Q') => Action::Quit,
                KeyCode::Tab => {
                    self.focus = self.next_focus();
                    Action::None
                }
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    if self.odds_open {
                        Action::RefreshOdds
                    } else {
                        Action::Refresh(self.focus)
                    }
                }
                KeyCode::Char('o') | KeyCode::Char('O') => {
                    self.odds_open = !self.odds_open;
                    if self.odds_open {
                        Action::OpenOdds
                    } else {
                        Action::CloseOdds
                    }
                }
                KeyCode::Esc if self.odds_open => {
                    self.odds_open = false;
                    Action::CloseOdds
                }
                KeyCode::Char('p') | KeyCode::Char('P') => {
                    self.focus = Focus::Prediction;
                    self.input = InputMode::MatchId(String::new());
                    Action::None
                }
                _ => Action::None,
            },
        }
    }

    fn next_focus(&self) -> Focus {
        match self.focus {
            Focus::Matches if self.has_in_play => Focus::InPlay,
            Focus::Matches | Focus::InPlay => Focus::Prediction,
            Focus::Prediction => Focus::Matches,
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Text bar for a 0-100 percentage.
pub fn bar(pct: u32, width: usize) -> String {
    let filled = (pct.min(100) as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
