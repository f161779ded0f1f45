/// Chat history pane rendering — build_items, draw_history, draw_chips,
/// todo region, spinner, wrap utilities.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block as UiBlock, List, ListItem, Paragraph},
};
use serde_json::Value;

use super::AppState;
use crate::thread::{Author, Block, ToolState};
use crate::ui::{state_glyph, tool_glyph};

// ── Spinner ────────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[(&str, Color)] = &[
    ("thinking…",          Color::Cyan),
    ("streaming…",         Color::Cyan),
    ("running tools…",     Color::Yellow),
    ("working on it…",     Color::Rgb(0, 220, 180)),
    ("almost there…",      Color::Rgb(100, 200, 255)),
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str, Color) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message cycles more slowly — changes every ~2 seconds (120ms × 16 ticks)
    let msg_idx = (tick as usize / 16) % SPINNER_MSGS.len();
    let (msg, color) = SPINNER_MSGS[msg_idx];
    (glyph, msg, color)
}

// ── Tool colour ────────────────────────────────────────────────────────────────

fn tool_color(tool_name: &str) -> Color {
    match tool_name {
        "read_file"                => Color::Cyan,
        "write_file" | "edit_file" => Color::Green,
        "bash"                     => Color::Yellow,
        "search"                   => Color::Magenta,
        "list_files"               => Color::Blue,
        "write_todos"              => Color::Rgb(140, 120, 220),
        _                          => Color::White,
    }
}

fn state_color(state: ToolState) -> Color {
    match state {
        ToolState::InputStreaming  => Color::DarkGray,
        ToolState::InputAvailable  => Color::Cyan,
        ToolState::OutputAvailable => Color::Rgb(0, 200, 100),
        ToolState::OutputError     => Color::Red,
    }
}

// ── History items builder ──────────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();

    for block in &state.thread.blocks {
        match block {
            Block::Message { author: Author::Human, images, text, .. } => {
                push_image_chips(&mut items, images);
                push_human_bubble(&mut items, text, term_width);
            }

            Block::Message { author: Author::Assistant, images, words, .. } => {
                push_image_chips(&mut items, images);
                push_assistant_text(&mut items, words, term_width);
            }

            Block::ToolUse { name, args, state: tool_state, output, error, .. } => {
                push_tool_card(&mut items, name, args, *tool_state, output, error);
            }
        }
    }

    for notice in &state.notices {
        for line in notice.lines() {
            let line = line.to_string();
            items.push(ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled(line, Style::default().fg(Color::DarkGray)),
            ])));
        }
    }

    if state.is_loading {
        let (glyph, msg, color) = spinner_frame(state.spinner_tick);
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{glyph} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(msg.to_string(), Style::default().fg(color)),
        ])));
    }

    items
}

// ── Human bubble ───────────────────────────────────────────────────────────────

fn push_human_bubble(items: &mut Vec<ListItem<'static>>, text: &str, term_width: u16) {
    // Bubble colours
    let bg       = Color::Rgb(28, 26, 52);
    let border   = Color::Rgb(110, 90, 200);
    let label_fg = Color::Rgb(160, 140, 255);
    let text_fg  = Color::Rgb(235, 232, 255);
    let body_style = Style::default().fg(text_fg).bg(bg);
    let edge_style = Style::default().fg(border).bg(bg);

    // Dynamic widths — 2 chars left margin, 1 right margin
    let inner_w = (term_width as usize).saturating_sub(3).max(10);
    // Top: "╭─ you ──...──╮"  — label is " you " (5 chars), corners+space = 4
    let dash_total = inner_w.saturating_sub(4 + 5);
    let top_dashes = "─".repeat(dash_total);
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled("╭─ ".to_string(), edge_style),
        Span::styled("you", Style::default().fg(label_fg).bg(bg).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {top_dashes}╮"), edge_style),
    ])));

    // Body — word-wrap inside the box (inner_w minus "│ " = 2)
    let wrap_width = inner_w.saturating_sub(2).max(10);
    let raw_lines: Vec<&str> = if text.is_empty() { vec![""] } else { text.lines().collect() };
    let wrapped: Vec<String> = raw_lines
        .iter()
        .flat_map(|line| wrap_text(line, wrap_width))
        .collect();
    for line in &wrapped {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("│ ", edge_style),
            Span::styled(line.clone(), body_style),
        ])));
    }

    // Bottom: "╰──...──╯"
    let bot_dashes = "─".repeat(inner_w.saturating_sub(2));
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("╰{bot_dashes}╯"), edge_style),
    ])));
    items.push(ListItem::new(Line::raw("")));
}

// ── Assistant text ─────────────────────────────────────────────────────────────

/// Flat assistant rendering, built from the word-level split so streamed
/// snapshots reveal word by word rather than reflowing mid-word.
fn push_assistant_text(items: &mut Vec<ListItem<'static>>, words: &[String], term_width: u16) {
    // "        " indent = 8 cols
    let wrap_width = (term_width as usize).saturating_sub(8).max(20);
    let label_fg = Color::Rgb(0, 210, 210);
    let text_fg  = Color::Rgb(210, 230, 255);

    let mut first = true;
    for line in wrap_words(words, wrap_width) {
        if first {
            first = false;
            items.push(ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled("agent", Style::default().fg(label_fg).add_modifier(Modifier::BOLD)),
                Span::raw("  "),
                Span::styled(line, Style::default().fg(text_fg)),
            ])));
        } else {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("         "),
                Span::styled(line, Style::default().fg(text_fg)),
            ])));
        }
    }
    items.push(ListItem::new(Line::raw("")));
}

// ── Image chips ────────────────────────────────────────────────────────────────

/// The terminal shows no bitmaps — image parts render as fixed-width chips
/// carrying a source hint, one per image, before the text.
fn push_image_chips(items: &mut Vec<ListItem<'static>>, images: &[String]) {
    for url in images {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                format!(" ▦ image · {} ", image_hint(url)),
                Style::default().fg(Color::White).bg(Color::Rgb(40, 38, 70)),
            ),
        ])));
    }
}

/// Short display hint for an image source: data URLs show their media type,
/// anything else shows a truncated tail of the URL.
fn image_hint(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("data:") {
        return rest.split(';').next().unwrap_or("attachment").to_string();
    }
    let tail: String = url.chars().rev().take(28).collect::<Vec<_>>().into_iter().rev().collect();
    if tail.len() < url.len() { format!("…{tail}") } else { tail }
}

// ── Tool card ──────────────────────────────────────────────────────────────────

const OUTPUT_PREVIEW_LINES: usize = 8;

fn push_tool_card(
    items: &mut Vec<ListItem<'static>>,
    name: &str,
    args: &Option<Value>,
    state: ToolState,
    output: &Option<String>,
    error: &Option<String>,
) {
    let glyph = tool_glyph(name).to_string();
    let color = tool_color(name);
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            format!("{} ", state_glyph(state)),
            Style::default().fg(state_color(state)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{glyph} {name} "), Style::default().fg(color)),
        Span::styled(args_summary(args), Style::default().fg(Color::DarkGray)),
    ])));

    let body = error.as_deref().or(output.as_deref());
    if let Some(body) = body {
        let body_color = if state == ToolState::OutputError { Color::Red } else { Color::DarkGray };
        let mut line_iter = body.lines();
        // First line gets the "→ " prefix
        if let Some(first) = line_iter.next() {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("    "),
                Span::styled("→ ", Style::default().fg(Color::DarkGray)),
                Span::styled(first.to_string(), Style::default().fg(body_color)),
            ])));
        }
        // Subsequent lines indented to align with first, capped
        let rest: Vec<&str> = line_iter.collect();
        for line in rest.iter().take(OUTPUT_PREVIEW_LINES) {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("      "),
                Span::styled(line.to_string(), Style::default().fg(body_color)),
            ])));
        }
        if rest.len() > OUTPUT_PREVIEW_LINES {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("      "),
                Span::styled(
                    format!("… {} more lines", rest.len() - OUTPUT_PREVIEW_LINES),
                    Style::default().fg(Color::Rgb(70, 70, 90)),
                ),
            ])));
        }
    }
}

/// Compact one-line args display: "key=value" pairs for objects, truncated.
pub fn args_summary(args: &Option<Value>) -> String {
    let Some(args) = args else { return "…".to_string() };
    let full = match args {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    };
    let mut out: String = full.chars().take(64).collect();
    if out.len() < full.len() {
        out.push('…');
    }
    out
}

// ── Todo region ────────────────────────────────────────────────────────────────

pub const TODO_EXPANDED_MAX: usize = 8;

/// Number of terminal rows the todo region needs right now.
pub fn todo_region_height(state: &AppState) -> u16 {
    let Some(summary) = &state.thread.todos else { return 0 };
    if state.todo_expanded {
        1 + summary.items.len().min(TODO_EXPANDED_MAX) as u16
    } else {
        1
    }
}

pub fn draw_todos(f: &mut Frame, state: &AppState, area: Rect) {
    let Some(summary) = &state.thread.todos else { return };

    let arrow = if state.todo_expanded { "▾" } else { "▸" };
    let header = Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{arrow} {} {}", summary.total, summary.label),
            Style::default().fg(Color::Rgb(140, 120, 220)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  ·  {} done", summary.completed),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled("  Ctrl+T", Style::default().fg(Color::Rgb(55, 50, 90))),
    ]);

    let mut lines = vec![header];
    if state.todo_expanded {
        for item in summary.items.iter().take(TODO_EXPANDED_MAX) {
            let (mark, fg) = if item.completed {
                ("✓", Color::Rgb(0, 200, 100))
            } else {
                ("○", Color::DarkGray)
            };
            lines.push(Line::from(vec![
                Span::raw("   "),
                Span::styled(format!("{mark} "), Style::default().fg(fg)),
                Span::styled(
                    item.title.clone(),
                    if item.completed {
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
                    } else {
                        Style::default().fg(Color::Rgb(200, 200, 220))
                    },
                ),
            ]));
        }
    }

    f.render_widget(
        Paragraph::new(lines).style(Style::default().bg(Color::Rgb(12, 12, 22))),
        area,
    );
}

// ── Draw functions ─────────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;

    let skip = if total > visible {
        (total - visible).saturating_sub(state.scroll)
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(UiBlock::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

pub fn draw_chips(f: &mut Frame, state: &AppState, area: Rect) {
    let mut spans = vec![Span::styled(" ▦ ", Style::default().fg(Color::DarkGray))];
    for (i, attachment) in state.composer.attachments.iter().enumerate() {
        let focused = state.focused_chip == Some(i);
        let name = short_filename(&attachment.path);
        let (bg, fg) = if focused {
            (Color::Cyan, Color::Black)
        } else {
            (Color::DarkGray, Color::White)
        };
        spans.push(Span::styled(
            format!(" {name} ✕ "),
            Style::default().fg(fg).bg(bg),
        ));
        spans.push(Span::raw(" "));
    }
    if !state.composer.attachments.is_empty() {
        spans.push(Span::styled(
            " Tab to focus · Del to remove ",
            Style::default().fg(Color::DarkGray),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn short_filename(path: &str) -> &str {
    std::path::Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path)
}

// ── Utilities ──────────────────────────────────────────────────────────────────

/// Word-wrap a single line of text to `max_width` columns.
/// Splits on whitespace; never truncates mid-word unless the word alone exceeds max_width.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.len(); // close enough for ASCII; unicode_width would be better
        if current_width == 0 {
            // First word on line
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(current.clone());
            current = word.to_string();
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Flow a word-split token stream into lines; `"\n"` tokens force a break.
pub fn wrap_words(words: &[String], max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in words {
        if word == "\n" {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
            continue;
        }
        let word_width = word.len();
        if current_width == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn short_id(id: &str) -> String {
    if id.len() <= 8 {
        id.to_string()
    } else {
        format!("{}…", &id[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrap_words_breaks_on_newline_tokens() {
        let words: Vec<String> = ["a", "b", "\n", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(wrap_words(&words, 40), vec!["a b", "c"]);
    }

    #[test]
    fn wrap_words_flows_to_width() {
        let words: Vec<String> = ["alpha", "beta", "gamma"].iter().map(|s| s.to_string()).collect();
        assert_eq!(wrap_words(&words, 10), vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn args_summary_formats_object_pairs() {
        let args = Some(json!({"q": "rust", "limit": 5}));
        let summary = args_summary(&args);
        assert!(summary.contains("q=rust"));
        assert!(summary.contains("limit=5"));
    }

    #[test]
    fn args_summary_shows_placeholder_while_streaming() {
        assert_eq!(args_summary(&None), "…");
    }

    #[test]
    fn image_hint_prefers_media_type_for_data_urls() {
        assert_eq!(image_hint("data:image/png;base64,AAAA"), "image/png");
        assert!(image_hint("https://example.com/a-very-long-path/shot.png").starts_with('…'));
    }
}
