/// Ratatui-based TUI for threadline.
///
/// Architecture:
///   main thread:   event loop — crossterm keyboard events + mpsc StreamUpdate drain
///   session task:  tokio::spawn — streams server snapshots via UnboundedSender
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  todo region (collapsible, only when present)  │
///   ├────────────────────────────────────────────────┤
///   │  conversation history (scrollable, Min(0))     │
///   ├────────────────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   ├────────────────────────────────────────────────┤
///   │  input box (3 lines, fixed)                    │
///   └────────────────────────────────────────────────┘
pub mod chat;
pub mod render;

use std::io;

use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::composer::{Attachment, Composer, mime_for};
use crate::config::ResolvedConfig;
use crate::stream::{StreamUpdate, ThreadClient, ThreadEvent, ThreadValues, TodoItem};
use crate::thread::{self, Thread};

// ── Mode — TUI modal state ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    FilePicker, // @ image picker
}

// ── FilePicker state ──────────────────────────────────────────────────────────

pub struct FilePickerState {
    /// All candidate image paths (relative to cwd), gathered once on open
    pub all_files: Vec<String>,
    /// Current filter query (text after the `@`)
    pub query: String,
    /// Index of highlighted item in filtered list
    pub selected: usize,
}

impl FilePickerState {
    pub fn open() -> Self {
        Self { all_files: gather_images(), query: String::new(), selected: 0 }
    }

    pub fn filtered(&self) -> Vec<&String> {
        if self.query.is_empty() {
            self.all_files.iter().collect()
        } else {
            let q = self.query.to_lowercase();
            self.all_files
                .iter()
                .filter(|p| p.to_lowercase().contains(&q))
                .collect()
        }
    }
}

/// Collect image files under cwd up to depth 5, skipping hidden dirs and
/// common noise.
pub fn gather_images() -> Vec<String> {
    let mut out = Vec::new();
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    walk_dir(&cwd, &cwd, 0, 5, &mut out);
    out.sort();
    out
}

fn walk_dir(
    base: &std::path::Path,
    dir: &std::path::Path,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<String>,
) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name_str = name.to_string_lossy();

        // Skip hidden, target dir, node_modules, __pycache__
        if name_str.starts_with('.')
            || name_str == "target"
            || name_str == "node_modules"
            || name_str == "__pycache__"
        {
            continue;
        }

        if path.is_dir() {
            walk_dir(base, &path, depth + 1, max_depth, out);
        } else if path.is_file() {
            let Some(rel) = path.strip_prefix(base).ok() else { continue };
            let rel = rel.display().to_string();
            if mime_for(&rel).is_some() {
                out.push(rel);
            }
        }
    }
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    /// Last delivered snapshot — owned by the server, replaced wholesale.
    pub messages: Vec<ThreadEvent>,
    pub todos: Vec<TodoItem>,
    /// Derived presentation state — recomputed on every snapshot, never
    /// mutated incrementally.
    pub thread: Thread,
    pub composer: Composer,
    pub notices: Vec<String>,
    pub is_loading: bool,
    pub mode: Mode,
    pub scroll: usize, // lines scrolled up in history
    pub spinner_tick: u32,
    pub profile: String,
    pub assistant: String,
    pub thread_id: String,
    pub recursion_limit: u32,
    /// Current run, once the server names it (needed for cancel)
    pub run_id: Option<String>,
    pub todo_expanded: bool,
    /// Which chip is focused (for Del removal); None = input focused
    pub focused_chip: Option<usize>,
    pub file_picker: Option<FilePickerState>,
    pub last_turn_at: Option<DateTime<Local>>,
    pub cancel_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig, thread_id: String) -> Self {
        Self {
            messages: Vec::new(),
            todos: Vec::new(),
            thread: Thread::default(),
            composer: Composer::default(),
            notices: Vec::new(),
            is_loading: false,
            mode: Mode::Normal,
            scroll: 0,
            spinner_tick: 0,
            profile: resolved.profile_name.clone(),
            assistant: resolved.assistant_id.clone(),
            thread_id,
            recursion_limit: resolved.recursion_limit,
            run_id: None,
            todo_expanded: false,
            focused_chip: None,
            file_picker: None,
            last_turn_at: None,
            cancel_tx: None,
        }
    }

    pub fn push_notice(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
        self.scroll = 0; // auto-scroll to bottom on new content
    }

    /// Recompute the derived thread from the current snapshot.
    fn reclassify(&mut self) {
        self.thread = thread::classify(&self.messages, &self.todos);
    }

    /// Seed state from an existing thread (resume path).
    pub fn seed(&mut self, values: ThreadValues) {
        let turns = values.messages.len();
        self.messages = values.messages;
        self.todos = values.todos;
        self.reclassify();
        if turns > 0 {
            self.push_notice(format!(
                "↩ resumed thread · {turns} event{}",
                if turns == 1 { "" } else { "s" }
            ));
        }
    }

    pub fn apply_update(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::RunStarted { run_id } => {
                self.run_id = Some(run_id);
            }
            StreamUpdate::Snapshot { messages, todos } => {
                self.messages = messages;
                self.todos = todos;
                self.reclassify();
                self.last_turn_at = Some(Local::now());
                self.scroll = 0;
            }
            StreamUpdate::RunFinished => {
                self.is_loading = false;
                self.run_id = None;
                self.cancel_tx = None;
                self.composer.sync_phase(false);
            }
            StreamUpdate::RunError(e) => {
                self.push_notice(format!("✗ {e}"));
                self.is_loading = false;
                self.run_id = None;
                self.cancel_tx = None;
                self.composer.sync_phase(false);
            }
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(
    client: ThreadClient,
    resolved: ResolvedConfig,
    thread_id: String,
    initial: ThreadValues,
) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, client, resolved, thread_id, initial).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: ThreadClient,
    resolved: ResolvedConfig,
    thread_id: String,
    initial: ThreadValues,
) -> Result<()> {
    let mut state = AppState::new(&resolved, thread_id);
    state.seed(initial);

    // Channel: session task → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<StreamUpdate>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.is_loading {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain updates from the session task ───────────────────────────
            Some(update) = ui_rx.recv() => {
                state.apply_update(update);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        let keep = handle_key(key, &mut state, &client, ui_tx.clone());
                        if !keep { break; }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}

// ── Key handling ──────────────────────────────────────────────────────────────

/// Returns false when the app should exit.
fn handle_key(
    key: KeyEvent,
    state: &mut AppState,
    client: &ThreadClient,
    ui_tx: mpsc::UnboundedSender<StreamUpdate>,
) -> bool {
    // Keep the gate in sync with the loading flag before any transition
    state.composer.sync_phase(state.is_loading);

    // ── FilePicker mode ───────────────────────────────────────────────────────
    if state.mode == Mode::FilePicker {
        if let Some(picker) = &mut state.file_picker {
            match key.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    state.file_picker = None;
                }
                KeyCode::Up => {
                    picker.selected = picker.selected.saturating_sub(1);
                }
                KeyCode::Down => {
                    if picker.selected + 1 < picker.filtered().len() {
                        picker.selected += 1;
                    }
                }
                KeyCode::Backspace => {
                    picker.query.pop();
                    picker.selected = 0;
                }
                KeyCode::Char(c) => {
                    picker.query.push(c);
                    picker.selected = 0;
                }
                KeyCode::Enter => {
                    let chosen = picker.filtered().get(picker.selected).map(|p| p.to_string());
                    state.mode = Mode::Normal;
                    state.file_picker = None;
                    if let Some(path) = chosen {
                        match Attachment::load(&path) {
                            Ok(attachment) => state.composer.attachments.push(attachment),
                            Err(e) => state.push_notice(format!("✗ attach: {e}")),
                        }
                    }
                }
                _ => {}
            }
        }
        return true;
    }

    // ── Chip focus ────────────────────────────────────────────────────────────
    if let Some(i) = state.focused_chip {
        match key.code {
            KeyCode::Delete | KeyCode::Backspace => {
                if i < state.composer.attachments.len() {
                    state.composer.attachments.remove(i);
                }
                state.focused_chip = None;
                return true;
            }
            KeyCode::Tab => {
                state.focused_chip = if i + 1 < state.composer.attachments.len() {
                    Some(i + 1)
                } else {
                    None
                };
                return true;
            }
            KeyCode::Esc => {
                state.focused_chip = None;
                return true;
            }
            // Any other key: unfocus and fall through to normal handling
            _ => state.focused_chip = None,
        }
    }

    match (key.modifiers, key.code) {
        // Ctrl+C — stop the run in flight, or quit when idle
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
            if state.composer.press_abort() {
                abort_run(state, client);
            } else {
                return false;
            }
        }
        // Ctrl+D — quit
        (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
            return false;
        }
        // Ctrl+T — toggle todo region
        (KeyModifiers::CONTROL, KeyCode::Char('t')) => {
            state.todo_expanded = !state.todo_expanded;
        }
        // @ — open the image picker
        (_, KeyCode::Char('@')) => {
            state.file_picker = Some(FilePickerState::open());
            state.mode = Mode::FilePicker;
        }
        // Tab — focus attachment chips when any exist
        (KeyModifiers::NONE, KeyCode::Tab) if !state.composer.attachments.is_empty() => {
            state.focused_chip = Some(0);
        }
        (_, KeyCode::Enter) => {
            submit(state, client, ui_tx);
        }
        (_, KeyCode::Esc) => {
            state.composer.clear();
        }
        (_, KeyCode::Backspace) => {
            state.composer.backspace();
        }
        (_, KeyCode::Left) => state.composer.move_left(),
        (_, KeyCode::Right) => state.composer.move_right(),
        (_, KeyCode::Home) => state.composer.move_home(),
        (_, KeyCode::End) => state.composer.move_end(),
        (_, KeyCode::Up) | (_, KeyCode::PageUp) => {
            let step = if key.code == KeyCode::PageUp { 10 } else { 1 };
            state.scroll = state.scroll.saturating_add(step);
        }
        (_, KeyCode::Down) | (_, KeyCode::PageDown) => {
            let step = if key.code == KeyCode::PageDown { 10 } else { 1 };
            state.scroll = state.scroll.saturating_sub(step);
        }
        (_, KeyCode::Char(c)) => {
            state.composer.insert(c);
        }
        _ => {}
    }

    true
}

// ── Submit / abort ────────────────────────────────────────────────────────────

fn submit(state: &mut AppState, client: &ThreadClient, ui_tx: mpsc::UnboundedSender<StreamUpdate>) {
    let Some(message) = state.composer.press_submit() else {
        return;
    };
    // The chips row owns attachment lifecycle — cleared after the hand-off
    state.composer.attachments.clear();
    state.focused_chip = None;

    state.is_loading = true;
    state.composer.sync_phase(true);
    state.scroll = 0;

    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    state.cancel_tx = Some(cancel_tx);

    let client = client.clone();
    let thread_id = state.thread_id.clone();
    let limit = state.recursion_limit;
    let stream_tx = ui_tx.clone();

    tokio::spawn(async move {
        tokio::select! {
            result = client.stream_run(&thread_id, message, limit, stream_tx) => {
                match result {
                    Ok(()) => { let _ = ui_tx.send(StreamUpdate::RunFinished); }
                    Err(e) => { let _ = ui_tx.send(StreamUpdate::RunError(e.to_string())); }
                }
            }
            _ = cancel_rx => {
                let _ = ui_tx.send(StreamUpdate::RunFinished);
            }
        }
    });
}

fn abort_run(state: &mut AppState, client: &ThreadClient) {
    if let Some(tx) = state.cancel_tx.take() {
        let _ = tx.send(());
    }
    // Tell the server too — stopping locally only stops reading the stream
    if let Some(run_id) = state.run_id.clone() {
        let client = client.clone();
        let thread_id = state.thread_id.clone();
        tokio::spawn(async move {
            let _ = client.cancel_run(&thread_id, &run_id).await;
        });
    }
    state.push_notice("■ run stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{EventKind, MessageContent};

    fn resolved() -> ResolvedConfig {
        ResolvedConfig {
            server_url: "http://localhost:2024".to_string(),
            assistant_id: "coding_agent".to_string(),
            recursion_limit: 100,
            api_key: None,
            profile_name: "test".to_string(),
        }
    }

    fn snapshot(texts: &[&str]) -> StreamUpdate {
        StreamUpdate::Snapshot {
            messages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| ThreadEvent {
                    id: format!("m{i}"),
                    kind: EventKind::Ai,
                    content: MessageContent::Text(t.to_string()),
                    tool_calls: vec![],
                    tool_call_id: None,
                })
                .collect(),
            todos: vec![],
        }
    }

    #[test]
    fn snapshot_replaces_previous_state_wholesale() {
        let mut state = AppState::new(&resolved(), "th-1".to_string());
        state.apply_update(snapshot(&["first"]));
        assert_eq!(state.thread.blocks.len(), 1);
        state.apply_update(snapshot(&["first", "second"]));
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.thread.blocks.len(), 2);
    }

    #[test]
    fn run_error_clears_loading_and_records_a_notice() {
        let mut state = AppState::new(&resolved(), "th-1".to_string());
        state.is_loading = true;
        state.apply_update(StreamUpdate::RunError("boom".to_string()));
        assert!(!state.is_loading);
        assert!(state.run_id.is_none());
        assert!(state.notices.iter().any(|n| n.contains("boom")));
    }

    #[test]
    fn run_finished_returns_the_composer_to_idle() {
        let mut state = AppState::new(&resolved(), "th-1".to_string());
        state.is_loading = true;
        state.composer.sync_phase(true);
        state.apply_update(StreamUpdate::RunFinished);
        assert!(!state.is_loading);
        assert!(!state.composer.is_busy());
    }

    #[test]
    fn abort_does_not_alter_already_rendered_blocks() {
        let mut state = AppState::new(&resolved(), "th-1".to_string());
        state.apply_update(snapshot(&["kept"]));
        let before = state.thread.clone();
        state.is_loading = true;
        state.apply_update(StreamUpdate::RunFinished);
        assert_eq!(state.thread, before);
    }
}
