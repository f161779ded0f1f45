/// Message-to-view classification: turns the delivered event sequence into
/// ordered renderable blocks. Pure and synchronous — rebuilt from scratch on
/// every snapshot, never mutated incrementally.
use std::collections::HashMap;

use serde_json::Value;

use crate::stream::{
    ContentPart, EventKind, KnownPart, MessageContent, ThreadEvent, TodoItem, TodoStatus,
};

// ── Blocks ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    Human,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A rendered turn: images first (in declared order), then text.
    /// Human blocks render contained, assistant blocks flat.
    Message {
        id: String,
        author: Author,
        images: Vec<String>,
        text: String,
        /// Word-level split of `text`, used for incremental reveal.
        words: Vec<String>,
    },
    /// One tool invocation with its correlated result, if any.
    ToolUse {
        id: String,
        name: String,
        args: Option<Value>,
        state: ToolState,
        output: Option<String>,
        error: Option<String>,
    },
}

// ── Tool display state ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    /// Derive the display state from exactly three inputs. First match wins:
    ///
    ///   args absent                  → InputStreaming
    ///   args, no result              → InputAvailable
    ///   args, result, error string   → OutputError
    ///   args, result                 → OutputAvailable
    pub fn derive(args_present: bool, result: Option<&MessageContent>) -> Self {
        if !args_present {
            return ToolState::InputStreaming;
        }
        match result {
            None => ToolState::InputAvailable,
            Some(content) if is_error_text(content) => ToolState::OutputError,
            Some(_) => ToolState::OutputAvailable,
        }
    }
}

/// Failure is signalled only by the string convention: a plain-string result
/// starting with `Error:`. Structured content never counts as an error.
fn is_error_text(content: &MessageContent) -> bool {
    matches!(content, MessageContent::Text(s) if s.starts_with("Error:"))
}

// ── Todo summary ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TodoSummary {
    pub total: usize,
    pub completed: usize,
    pub label: &'static str,
    pub items: Vec<TodoLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodoLine {
    pub title: String,
    pub completed: bool,
}

// ── Classified thread ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Thread {
    pub blocks: Vec<Block>,
    pub todos: Option<TodoSummary>,
}

/// Classify the full event sequence into renderable blocks.
///
/// Tool results are correlated through a lookup rebuilt on every pass from
/// the authoritative sequence; duplicates overwrite in delivered order (last
/// write wins). Tool events never render as standalone blocks. Malformed
/// content contributes nothing — no event is ever rejected.
pub fn classify(events: &[ThreadEvent], todos: &[TodoItem]) -> Thread {
    let mut results: HashMap<&str, &MessageContent> = HashMap::new();
    for ev in events {
        if ev.kind == EventKind::Tool {
            if let Some(id) = ev.tool_call_id.as_deref() {
                results.insert(id, &ev.content);
            }
        }
    }

    let mut blocks = Vec::new();
    for ev in events {
        if !matches!(ev.kind, EventKind::Human | EventKind::Ai) {
            continue;
        }

        if has_content(&ev.content) {
            let text = message_text(&ev.content);
            blocks.push(Block::Message {
                id: ev.id.clone(),
                author: if ev.kind == EventKind::Human {
                    Author::Human
                } else {
                    Author::Assistant
                },
                images: image_urls(&ev.content),
                words: split_words(&text),
                text,
            });
        }

        if ev.kind == EventKind::Ai {
            for call in &ev.tool_calls {
                let args_present = !matches!(call.args, None | Some(Value::Null));
                let result = results.get(call.id.as_str()).copied();
                let state = ToolState::derive(args_present, result);
                blocks.push(Block::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    args: call.args.clone(),
                    state,
                    output: result.map(output_text),
                    error: match (state, result) {
                        (ToolState::OutputError, Some(MessageContent::Text(s))) => {
                            Some(s.clone())
                        }
                        _ => None,
                    },
                });
            }
        }
    }

    Thread { blocks, todos: summarize_todos(todos) }
}

fn summarize_todos(todos: &[TodoItem]) -> Option<TodoSummary> {
    if todos.is_empty() {
        return None;
    }
    let items: Vec<TodoLine> = todos
        .iter()
        .map(|t| TodoLine {
            title: t.title.clone(),
            completed: t.status == TodoStatus::Completed,
        })
        .collect();
    let completed = items.iter().filter(|i| i.completed).count();
    Some(TodoSummary {
        total: items.len(),
        completed,
        label: if items.len() == 1 { "Todo Item" } else { "Todo Items" },
        items,
    })
}

// ── Content inspection ────────────────────────────────────────────────────────

/// A turn renders a message block only if it carries a non-empty string or a
/// non-empty part list. Opaque structured content never renders.
pub fn has_content(content: &MessageContent) -> bool {
    match content {
        MessageContent::Text(s) => !s.is_empty(),
        MessageContent::Parts(parts) => !parts.is_empty(),
        MessageContent::Structured(_) => false,
    }
}

/// Text of a turn: the string itself, or the newline-join of its text parts.
/// Unrecognized parts contribute nothing.
fn message_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|p| match p {
                ContentPart::Known(KnownPart::Text { text }) => text.as_str(),
                _ => "",
            })
            .collect::<Vec<_>>()
            .join("\n"),
        MessageContent::Structured(_) => String::new(),
    }
}

/// Image URLs of a turn, in declared order.
fn image_urls(content: &MessageContent) -> Vec<String> {
    match content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Known(KnownPart::ImageUrl { image_url }) => {
                    Some(image_url.url().to_string())
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Tool result content rendered as display text. Structured payloads are
/// shown as compact JSON.
fn output_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Parts(_) => message_text(content),
        MessageContent::Structured(v) => serde_json::to_string(v).unwrap_or_default(),
    }
}

/// Word-level split used for incremental reveal of assistant text.
/// Newlines are preserved as their own tokens so paragraph structure survives.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            words.push("\n".to_string());
        }
        words.extend(line.split_whitespace().map(str::to_string));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ImageRef, ToolCall};
    use serde_json::json;

    fn human(id: &str, text: &str) -> ThreadEvent {
        ThreadEvent {
            id: id.to_string(),
            kind: EventKind::Human,
            content: MessageContent::Text(text.to_string()),
            tool_calls: vec![],
            tool_call_id: None,
        }
    }

    fn ai(id: &str, text: &str, tool_calls: Vec<ToolCall>) -> ThreadEvent {
        ThreadEvent {
            id: id.to_string(),
            kind: EventKind::Ai,
            content: MessageContent::Text(text.to_string()),
            tool_calls,
            tool_call_id: None,
        }
    }

    fn tool_result(id: &str, call_id: &str, text: &str) -> ThreadEvent {
        ThreadEvent {
            id: id.to_string(),
            kind: EventKind::Tool,
            content: MessageContent::Text(text.to_string()),
            tool_calls: vec![],
            tool_call_id: Some(call_id.to_string()),
        }
    }

    fn call(id: &str, name: &str, args: Option<Value>) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), args }
    }

    #[test]
    fn single_human_turn_yields_one_contained_block() {
        let thread = classify(&[human("m1", "hi")], &[]);
        assert_eq!(thread.blocks.len(), 1);
        let Block::Message { author, text, images, .. } = &thread.blocks[0] else {
            panic!("expected message block");
        };
        assert_eq!(*author, Author::Human);
        assert_eq!(text, "hi");
        assert!(images.is_empty());
    }

    #[test]
    fn unresolved_call_with_args_is_input_available() {
        let events = vec![
            human("m1", "x"),
            ai("m2", "", vec![call("t1", "search", Some(json!({"q": "x"})))]),
        ];
        let thread = classify(&events, &[]);
        assert_eq!(thread.blocks.len(), 2);
        let Block::ToolUse { id, name, state, output, .. } = &thread.blocks[1] else {
            panic!("expected tool block");
        };
        assert_eq!(id, "t1");
        assert_eq!(name, "search");
        assert_eq!(*state, ToolState::InputAvailable);
        assert!(output.is_none());
    }

    #[test]
    fn error_prefixed_result_flips_state_to_output_error() {
        let events = vec![
            human("m1", "x"),
            ai("m2", "", vec![call("t1", "search", Some(json!({"q": "x"})))]),
            tool_result("r1", "t1", "Error: not found"),
        ];
        let thread = classify(&events, &[]);
        let Block::ToolUse { state, error, .. } = &thread.blocks[1] else {
            panic!("expected tool block");
        };
        assert_eq!(*state, ToolState::OutputError);
        assert_eq!(error.as_deref(), Some("Error: not found"));
    }

    #[test]
    fn empty_ai_turn_without_calls_emits_nothing() {
        let thread = classify(&[ai("m1", "", vec![])], &[]);
        assert!(thread.blocks.is_empty());
    }

    #[test]
    fn call_without_args_is_input_streaming_even_with_a_result() {
        // First table row wins regardless of the later columns
        let events = vec![
            ai("m1", "", vec![call("t1", "search", None)]),
            tool_result("r1", "t1", "found it"),
        ];
        let thread = classify(&events, &[]);
        let Block::ToolUse { state, .. } = &thread.blocks[0] else {
            panic!("expected tool block");
        };
        assert_eq!(*state, ToolState::InputStreaming);
    }

    #[test]
    fn null_args_count_as_absent() {
        let events = vec![ai("m1", "", vec![call("t1", "search", Some(Value::Null))])];
        let thread = classify(&events, &[]);
        let Block::ToolUse { state, .. } = &thread.blocks[0] else {
            panic!("expected tool block");
        };
        assert_eq!(*state, ToolState::InputStreaming);
    }

    #[test]
    fn successful_result_is_output_available() {
        let events = vec![
            ai("m1", "", vec![call("t1", "bash", Some(json!({"cmd": "ls"})))]),
            tool_result("r1", "t1", "src\ntests"),
        ];
        let thread = classify(&events, &[]);
        let Block::ToolUse { state, output, error, .. } = &thread.blocks[0] else {
            panic!("expected tool block");
        };
        assert_eq!(*state, ToolState::OutputAvailable);
        assert_eq!(output.as_deref(), Some("src\ntests"));
        assert!(error.is_none());
    }

    #[test]
    fn block_count_matches_visible_turns_with_content() {
        let events = vec![
            human("m1", "a"),
            ai("m2", "", vec![]), // empty — no block
            ai("m3", "reply", vec![]),
            tool_result("r1", "zz", "ignored"), // tool turns never render standalone
            human("m4", "b"),
        ];
        let thread = classify(&events, &[]);
        let message_count = thread
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::Message { .. }))
            .count();
        assert_eq!(message_count, 3);
    }

    #[test]
    fn tool_blocks_preserve_declared_invocation_order() {
        let events = vec![ai(
            "m1",
            "",
            vec![
                call("t1", "read_file", Some(json!({"path": "a"}))),
                call("t2", "search", Some(json!({"q": "b"}))),
                call("t3", "bash", Some(json!({"cmd": "c"}))),
            ],
        )];
        let thread = classify(&events, &[]);
        let ids: Vec<&str> = thread
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn duplicate_results_resolve_last_write_wins() {
        let events = vec![
            ai("m1", "", vec![call("t1", "search", Some(json!({})))]),
            tool_result("r1", "t1", "first"),
            tool_result("r2", "t1", "second"),
        ];
        let thread = classify(&events, &[]);
        let Block::ToolUse { output, .. } = &thread.blocks[0] else {
            panic!("expected tool block");
        };
        assert_eq!(output.as_deref(), Some("second"));
    }

    #[test]
    fn result_arriving_before_its_call_still_correlates() {
        let events = vec![
            tool_result("r1", "t1", "done"),
            ai("m1", "", vec![call("t1", "search", Some(json!({})))]),
        ];
        let thread = classify(&events, &[]);
        let Block::ToolUse { state, .. } = &thread.blocks[0] else {
            panic!("expected tool block");
        };
        assert_eq!(*state, ToolState::OutputAvailable);
    }

    #[test]
    fn reclassifying_unchanged_events_is_identical() {
        let events = vec![
            human("m1", "do the thing"),
            ai("m2", "on it", vec![call("t1", "bash", Some(json!({"cmd": "make"})))]),
            tool_result("r1", "t1", "ok"),
        ];
        let todos = vec![TodoItem {
            id: json!(1),
            title: "A".to_string(),
            status: TodoStatus::Pending,
        }];
        let a = classify(&events, &todos);
        let b = classify(&events, &todos);
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn images_precede_text_and_keep_declared_order() {
        let ev = ThreadEvent {
            id: "m1".to_string(),
            kind: EventKind::Human,
            content: MessageContent::Parts(vec![
                ContentPart::Known(KnownPart::ImageUrl {
                    image_url: ImageRef::Url("u1".to_string()),
                }),
                ContentPart::Known(KnownPart::Text { text: "caption".to_string() }),
                ContentPart::Known(KnownPart::ImageUrl {
                    image_url: ImageRef::Object { url: "u2".to_string() },
                }),
            ]),
            tool_calls: vec![],
            tool_call_id: None,
        };
        let thread = classify(&[ev], &[]);
        let Block::Message { images, text, .. } = &thread.blocks[0] else {
            panic!("expected message block");
        };
        assert_eq!(images, &["u1".to_string(), "u2".to_string()]);
        assert!(text.contains("caption"));
    }

    #[test]
    fn malformed_parts_contribute_nothing() {
        let ev = ThreadEvent {
            id: "m1".to_string(),
            kind: EventKind::Ai,
            content: MessageContent::Parts(vec![
                ContentPart::Other(json!({"type": "audio", "data": "zzz"})),
                ContentPart::Known(KnownPart::Text { text: "kept".to_string() }),
            ]),
            tool_calls: vec![],
            tool_call_id: None,
        };
        let thread = classify(&[ev], &[]);
        let Block::Message { text, images, .. } = &thread.blocks[0] else {
            panic!("expected message block");
        };
        assert_eq!(text, "\nkept");
        assert!(images.is_empty());
    }

    #[test]
    fn unknown_event_kinds_are_invisible() {
        let ev = ThreadEvent {
            id: "m1".to_string(),
            kind: EventKind::Other,
            content: MessageContent::Text("internal".to_string()),
            tool_calls: vec![],
            tool_call_id: None,
        };
        let thread = classify(&[ev], &[]);
        assert!(thread.blocks.is_empty());
    }

    #[test]
    fn single_todo_summary_is_singular_and_unchecked() {
        let todos = vec![TodoItem {
            id: json!(1),
            title: "A".to_string(),
            status: TodoStatus::Pending,
        }];
        let thread = classify(&[], &todos);
        let summary = thread.todos.expect("summary present");
        assert_eq!(summary.total, 1);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.label, "Todo Item");
        assert!(!summary.items[0].completed);
    }

    #[test]
    fn todo_summary_pluralizes_and_counts_completed() {
        let todos = vec![
            TodoItem { id: json!(1), title: "A".to_string(), status: TodoStatus::Completed },
            TodoItem { id: json!(2), title: "B".to_string(), status: TodoStatus::Pending },
        ];
        let thread = classify(&[], &todos);
        let summary = thread.todos.expect("summary present");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.label, "Todo Items");
    }

    #[test]
    fn empty_todo_list_has_no_summary() {
        assert!(classify(&[], &[]).todos.is_none());
    }

    #[test]
    fn split_words_preserves_line_breaks_as_tokens() {
        assert_eq!(split_words("a b\nc"), vec!["a", "b", "\n", "c"]);
        assert!(split_words("").is_empty());
    }
}
