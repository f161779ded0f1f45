/// UI helpers shared between the TUI and plain-stdout modes.
use crate::thread::ToolState;

// ── Tool glyphs ───────────────────────────────────────────────────────────────

pub fn tool_glyph(tool_name: &str) -> &'static str {
    match tool_name {
        "read_file"  => "○",
        "write_file" => "●",
        "edit_file"  => "◈",
        "bash"       => "❯",
        "search"     => "⌕",
        "list_files" => "≡",
        "write_todos" => "☰",
        _            => "⚙",
    }
}

// ── Tool state glyphs ─────────────────────────────────────────────────────────

pub fn state_glyph(state: ToolState) -> &'static str {
    match state {
        ToolState::InputStreaming  => "◌",
        ToolState::InputAvailable  => "▸",
        ToolState::OutputAvailable => "✓",
        ToolState::OutputError     => "✗",
    }
}

pub fn state_label(state: ToolState) -> &'static str {
    match state {
        ToolState::InputStreaming  => "streaming",
        ToolState::InputAvailable  => "running",
        ToolState::OutputAvailable => "done",
        ToolState::OutputError     => "error",
    }
}
