//! # TUI Adapter
//!
//! The ratatui-specific consumer of a chat session. It renders snapshots
//! from the session's watch channel and turns key presses into intents on a
//! [`SessionHandle`]. It never touches conversation state directly.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! - **Awaiting a reply**: draws every ~80ms so the typing indicator animates.
//! - **Idle**: polls up to 250ms, redrawing only on input or a new snapshot.

mod event;
mod ui;

use log::{debug, info, warn};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;

use crate::core::action::Rejection;
use crate::core::clock::{SystemClock, TokioSleeper, UuidIds};
use crate::core::config::ResolvedConfig;
use crate::core::quick::QuickResponseTable;
use crate::core::state::ConversationState;
use crate::inference::{CompletionClient, OpenAiProvider};
use crate::session::{Dispatch, SessionConfig, SessionController, SessionDeps, SessionError, SessionHandle};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// TUI-specific presentation state (not part of the session)
#[derive(Debug, Default)]
pub struct TuiState {
    pub input: String,
    /// Lines scrolled back from the newest message (0 = pinned to bottom).
    pub scroll_from_bottom: u16,
    pub status_message: Option<String>,
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> io::Result<Self> {
        execute!(stdout(), EnableMouseCapture, EnableBracketedPaste)?;
        info!("Terminal modes enabled (mouse, bracketed paste)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableMouseCapture, DisableBracketedPaste);
    }
}

/// Wire a production session from resolved config.
pub fn build_session(config: &ResolvedConfig) -> Result<SessionController, SessionError> {
    let sleeper = Arc::new(TokioSleeper);
    let provider = Arc::new(OpenAiProvider::new(
        config.api_key.clone(),
        Some(config.base_url.clone()),
    ));
    let client = CompletionClient::new(
        provider,
        sleeper.clone(),
        config.retry,
        config.pre_request_delay,
        config.params.clone(),
    );

    SessionController::spawn(
        SessionConfig {
            mode: config.mode,
            greeting: config.greeting.clone(),
            quick_reply_delay: config.quick_reply_delay,
            quick_responses: Arc::new(QuickResponseTable::new(config.quick_responses.clone())),
        },
        SessionDeps {
            client: Arc::new(client),
            clock: Box::new(SystemClock),
            ids: Box::new(UuidIds),
            sleeper,
        },
    )
}

pub async fn run(config: ResolvedConfig) -> io::Result<()> {
    let controller = build_session(&config).map_err(io::Error::other)?;
    let handle = controller.handle();

    let mut terminal = ratatui::init();
    let result = match TerminalModeGuard::new() {
        Ok(_guard) => event_loop(&mut terminal, &handle).await,
        Err(e) => Err(e),
    };
    ratatui::restore();

    // Tear down after the terminal is restored so abort logging can't garble it.
    controller.shutdown().await;
    result
}

async fn event_loop(terminal: &mut ratatui::DefaultTerminal, handle: &SessionHandle) -> io::Result<()> {
    let quick_questions = handle.quick_questions();
    let mut snapshots = handle.subscribe();
    let mut state: ConversationState = snapshots.borrow_and_update().clone();
    let mut tui = TuiState::default();

    let start_time = Instant::now();
    let mut needs_redraw = true; // Force first frame

    loop {
        if snapshots.has_changed().unwrap_or(false) {
            state = snapshots.borrow_and_update().clone();
            tui.scroll_from_bottom = 0;
            needs_redraw = true;
        }

        let animating = state.is_awaiting_reply;
        if animating {
            needs_redraw = true;
        }

        if needs_redraw {
            let spinner_frame = (start_time.elapsed().as_millis() / 300) as usize;
            terminal.draw(|f| ui::draw_ui(f, &state, &mut tui, &quick_questions, spinner_frame))?;
            needs_redraw = false;
        }

        let timeout = if animating {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(250)
        };

        // Crossterm polling blocks; keep it off the async scheduler's hot path.
        let mut events = Vec::new();
        tokio::task::block_in_place(|| -> io::Result<()> {
            if let Some(first) = poll_event_timeout(timeout)? {
                events.push(first);
                while let Some(next) = poll_event_immediate()? {
                    events.push(next);
                }
            }
            Ok(())
        })?;

        for event in events {
            needs_redraw = true;
            match event {
                TuiEvent::Quit | TuiEvent::ForceQuit => {
                    info!("Quit requested");
                    return Ok(());
                }
                TuiEvent::Resize => {}
                TuiEvent::ScrollUp => tui.scroll_from_bottom = tui.scroll_from_bottom.saturating_add(1),
                TuiEvent::ScrollDown => tui.scroll_from_bottom = tui.scroll_from_bottom.saturating_sub(1),
                TuiEvent::ToggleMode => {
                    report(&mut tui, handle.toggle_mode().await)?;
                }
                TuiEvent::QuickQuestion(index) => {
                    let Some(question) = quick_questions.get(index) else {
                        continue;
                    };
                    if !state.accepts_input() {
                        tui.status_message = Some("Waiting for reply...".to_string());
                        continue;
                    }
                    report(&mut tui, handle.click_quick_question(question.clone()).await)?;
                }
                TuiEvent::Submit => {
                    if !state.accepts_input() {
                        tui.status_message = Some("Waiting for reply...".to_string());
                        continue;
                    }
                    submit_input(&mut tui, handle).await?;
                }
                // Input is locked while a reply is pending
                TuiEvent::InputChar(_) | TuiEvent::Paste(_) | TuiEvent::Backspace
                    if !state.accepts_input() => {}
                TuiEvent::InputChar(c) => tui.input.push(c),
                TuiEvent::Paste(text) => tui.input.push_str(&text.replace(['\r', '\n'], " ")),
                TuiEvent::Backspace => {
                    tui.input.pop();
                }
            }
        }
    }
}

/// Sends the typed line. The input is only cleared once the session accepts it.
async fn submit_input(tui: &mut TuiState, handle: &SessionHandle) -> io::Result<()> {
    let outcome = handle.send_utterance(tui.input.clone()).await;
    if outcome == Ok(Dispatch::Accepted) {
        tui.input.clear();
    }
    report(tui, outcome)
}

/// Surfaces a dispatch outcome in the status bar. A closed session ends the loop.
fn report(tui: &mut TuiState, outcome: Result<Dispatch, SessionError>) -> io::Result<()> {
    match outcome {
        Ok(Dispatch::Accepted) | Ok(Dispatch::Ignored(Rejection::Blank)) => {
            tui.status_message = None;
            Ok(())
        }
        Ok(Dispatch::Ignored(Rejection::Busy)) => {
            debug!("Intent ignored: reply pending");
            tui.status_message = Some("Waiting for reply...".to_string());
            Ok(())
        }
        Ok(Dispatch::Ignored(Rejection::UnknownShortcut)) => {
            tui.status_message = Some("Unknown quick question".to_string());
            Ok(())
        }
        Err(e) => {
            warn!("Session unavailable: {}", e);
            Err(io::Error::other(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Mode;
    use crate::test_support::{PendingProvider, ScriptedProvider, test_session};

    #[test]
    fn test_report_busy_sets_status() {
        let mut tui = TuiState::default();
        report(&mut tui, Ok(Dispatch::Ignored(Rejection::Busy))).unwrap();
        assert_eq!(tui.status_message.as_deref(), Some("Waiting for reply..."));

        report(&mut tui, Ok(Dispatch::Accepted)).unwrap();
        assert!(tui.status_message.is_none());
    }

    #[test]
    fn test_report_closed_session_is_error() {
        let mut tui = TuiState::default();
        assert!(report(&mut tui, Err(SessionError::Closed)).is_err());
    }

    #[tokio::test]
    async fn test_busy_submit_keeps_typed_text() {
        let (controller, _) = test_session(Arc::new(PendingProvider), Mode::Live);
        let handle = controller.handle();
        assert_eq!(handle.send_utterance("first").await, Ok(Dispatch::Accepted));

        let mut tui = TuiState {
            input: "second".to_string(),
            ..Default::default()
        };
        submit_input(&mut tui, &handle).await.unwrap();

        assert_eq!(tui.input, "second");
        assert_eq!(tui.status_message.as_deref(), Some("Waiting for reply..."));
        assert_eq!(handle.snapshot().messages.len(), 2);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_accepted_submit_clears_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Some("hi".into()))]));
        let (controller, _) = test_session(provider, Mode::Live);
        let handle = controller.handle();

        let mut tui = TuiState {
            input: "hello".to_string(),
            ..Default::default()
        };
        submit_input(&mut tui, &handle).await.unwrap();

        assert!(tui.input.is_empty());
        assert_eq!(handle.snapshot().messages[1].text(), "hello");
        controller.shutdown().await;
    }
}
