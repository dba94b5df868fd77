//! Terminal front end.
//!
//! Reads lines from stdin and drives a [`ChatSession`]. Output is rendered
//! by a separate task subscribed to the session's state snapshots.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use uuid::Uuid;

use insurechat_chat::{ChatSession, SessionState};
use insurechat_core::types::{KnowledgeEntry, Role};

const HELP: &str = "Commands: /reset  /retry  /search <terms>  /model [name]  /help  /quit\n\
Type a number to ask one of the suggested questions.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Reset,
    Retry,
    Search(String),
    /// `None` clears the override.
    Model(Option<String>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse a line; a bare number picks from `suggestions` (1-based).
pub fn parse_command(line: &str, suggestions: &[String]) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    if let Ok(n) = line.parse::<usize>() {
        if let Some(question) = n.checked_sub(1).and_then(|i| suggestions.get(i)) {
            return Command::Send(question.clone());
        }
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name.to_lowercase().as_str() {
        "reset" => Command::Reset,
        "retry" => Command::Retry,
        "search" => Command::Search(arg.to_string()),
        "model" => Command::Model((!arg.is_empty()).then(|| arg.to_string())),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Turns successive snapshots into output lines.
#[derive(Debug, Default)]
pub struct Renderer {
    shown: Vec<Uuid>,
    last_error: Option<String>,
    was_loading: bool,
}

impl Renderer {
    pub fn new(initial: &SessionState) -> Self {
        Self {
            shown: initial.messages.iter().map(|m| m.id).collect(),
            last_error: initial.error.clone(),
            was_loading: initial.is_loading,
        }
    }

    /// Lines to print for `state`.
    ///
    /// Only assistant messages not yet shown are printed; messages dropped
    /// by a retry or reset are forgotten.
    pub fn render(&mut self, state: &SessionState) -> Vec<String> {
        let mut lines = Vec::new();

        if state.messages.is_empty() && !self.shown.is_empty() {
            lines.push("(conversation cleared)".to_string());
        }

        let common = self
            .shown
            .iter()
            .zip(&state.messages)
            .take_while(|(id, m)| **id == m.id)
            .count();
        let fresh = &state.messages[common..];

        if state.is_loading && !self.was_loading {
            lines.push("assistant is thinking...".to_string());
        }

        let mut replied = false;
        for message in fresh.iter().filter(|m| m.role == Role::Assistant) {
            lines.push(String::new());
            lines.push(format!("assistant> {}", message.content));
            replied = true;
        }
        if replied && !state.suggestions.is_empty() {
            lines.push(String::new());
            lines.extend(format_suggestions(&state.suggestions));
        }

        if state.error != self.last_error {
            if let Some(error) = &state.error {
                lines.push(format!("! {} (type /retry to try again)", error));
            }
        }

        self.shown = state.messages.iter().map(|m| m.id).collect();
        self.last_error = state.error.clone();
        self.was_loading = state.is_loading;
        lines
    }
}

fn format_suggestions(suggestions: &[String]) -> Vec<String> {
    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  [{}] {}", i + 1, s))
        .collect()
}

fn format_search_results(query: &str, results: &[KnowledgeEntry]) -> Vec<String> {
    if results.is_empty() {
        return vec![format!("No entries match \"{}\".", query)];
    }
    results
        .iter()
        .map(|e| format!("- {} ({}): {}", e.term, e.category, e.definition))
        .collect()
}

/// Print every snapshot change until the session is dropped.
async fn render_loop(mut rx: watch::Receiver<SessionState>) {
    let mut renderer = Renderer::new(&rx.borrow_and_update());
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        for line in renderer.render(&state) {
            println!("{}", line);
        }
    }
}

/// Run the read-eval-print loop until `/quit` or end of input.
pub async fn run(mut session: ChatSession) -> std::io::Result<()> {
    let render = tokio::spawn(render_loop(session.subscribe()));

    println!("Ask me anything about life insurance. {}", HELP);
    let replayed = session.state().messages.len();
    if replayed > 0 {
        println!("({} messages restored from your last session)", replayed);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line, &session.state().suggestions) {
            Command::Send(text) => {
                // Failures are shown by the renderer from the error state.
                if let Err(e) = session.send_message(&text).await {
                    tracing::debug!(error = %e, "Turn did not complete");
                }
            }
            Command::Retry => {
                if let Err(e) = session.retry_last_message().await {
                    tracing::debug!(error = %e, "Retry did not complete");
                }
            }
            Command::Reset => session.reset(),
            Command::Search(query) => {
                let results = session.search_knowledge_base(&query);
                for line in format_search_results(&query, &results) {
                    println!("{}", line);
                }
            }
            Command::Model(model) => {
                session.set_model_override(model);
                match &session.state().model_override {
                    Some(m) => println!("Using model {}", m),
                    None => println!("Using the configured model"),
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            Command::Empty => {}
            Command::Unknown(name) => println!("Unknown command /{}. {}", name, HELP),
        }
    }

    drop(session);
    let _ = render.await;
    Ok(())
}
