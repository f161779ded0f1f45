/// Ratatui draw entry-point for threadline.
/// Thin dispatcher — most rendering lives in chat.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use super::chat::{self, SPINNER_GLYPHS, short_id};
use super::{AppState, Mode};

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let todo_height = chat::todo_region_height(state);
    let has_chips = !state.composer.attachments.is_empty();

    let mut constraints = Vec::new();
    if todo_height > 0 {
        constraints.push(Constraint::Length(todo_height));
    }
    constraints.push(Constraint::Min(0));     // history
    constraints.push(Constraint::Length(1));  // status bar
    if has_chips {
        constraints.push(Constraint::Length(1)); // attachment chips row
    }
    constraints.push(Constraint::Length(3));  // input box

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut idx = 0;
    if todo_height > 0 {
        chat::draw_todos(f, state, chunks[idx]);
        idx += 1;
    }
    chat::draw_history(f, state, chunks[idx]);
    idx += 1;
    draw_status_bar(f, state, chunks[idx]);
    idx += 1;
    if has_chips {
        chat::draw_chips(f, state, chunks[idx]);
        idx += 1;
    }
    draw_input(f, state, chunks[idx]);

    if state.mode == Mode::FilePicker {
        if let Some(picker) = &state.file_picker {
            draw_file_picker(f, picker, area);
        }
    }
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    // Animated spinner glyph in status bar when a run is in flight
    let (status_glyph, status_color) = if state.is_loading {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let turn_time = state
        .last_turn_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(status_glyph, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::styled(" threadline", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.assistant.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled("  ", Style::default()),
        Span::styled(
            format!("thread {}", short_id(&state.thread_id)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            if turn_time.is_empty() { String::new() } else { format!("  ◷ {turn_time}") },
            Style::default().fg(Color::Rgb(80, 80, 120)),
        ),
        Span::styled(
            "  @ attach  Ctrl+T todos  Ctrl+C stop/quit",
            Style::default().fg(Color::Rgb(55, 50, 90)),
        ),
    ]);

    let bar_style = if state.is_loading {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };

    f.render_widget(Paragraph::new(line).style(bar_style), area);
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let (border_color, prompt_color, prompt_char) = if state.is_loading {
        (Color::Rgb(40, 40, 60), Color::DarkGray, "·")
    } else {
        match state.mode {
            Mode::FilePicker => (Color::Green, Color::Green, "@"),
            Mode::Normal     => (Color::Rgb(60, 60, 80), Color::Cyan, "❯"),
        }
    };

    let prompt_span = Span::styled(
        format!("  {prompt_char} "),
        Style::default().fg(prompt_color).add_modifier(Modifier::BOLD),
    );

    let input_text = state.composer.text.clone();

    let content_span = if state.is_loading {
        let tick = state.spinner_tick as usize;
        let cancel_hints = ["Ctrl+C to stop", "Ctrl+C to interrupt"];
        let hint = cancel_hints[(tick / 20) % cancel_hints.len()];
        Span::styled(hint.to_string(), Style::default().fg(Color::Rgb(60, 60, 80)))
    } else if input_text.is_empty() {
        Span::styled(
            "message · @ attach image · Enter to send",
            Style::default().fg(Color::Rgb(70, 70, 90)),
        )
    } else {
        Span::styled(input_text.clone(), Style::default().fg(Color::White))
    };

    let input_line = Line::from(vec![prompt_span, content_span]);

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let paragraph = Paragraph::new(input_line)
        .block(block)
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, area);

    // Position cursor at the actual edit cursor, not end of string
    if !state.is_loading && state.mode == Mode::Normal {
        use unicode_width::UnicodeWidthStr;
        // prompt is "  ❯ " — ❯ is 1 wide, total visible width is 4 cols
        let prompt_width: u16 = 4;
        let text = state.composer.text.as_str();
        let cursor_byte = state.composer.cursor.min(text.len());
        let cursor_x = area.x + prompt_width + text[..cursor_byte].width() as u16;
        let cursor_y = area.y + 1; // +1 for top border
        if cursor_x < area.x + area.width {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}

// ── Image file picker overlay ─────────────────────────────────────────────────

pub fn draw_file_picker(f: &mut Frame, picker: &super::FilePickerState, area: Rect) {
    let filtered = picker.filtered();
    let height = (filtered.len().min(10) + 2) as u16;
    let width = area.width.saturating_sub(8).min(70);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.height.saturating_sub(height + 5),
        width,
        height,
    };

    f.render_widget(Clear, popup);

    let items: Vec<ListItem> = filtered
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let selected = i == picker.selected;
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(format!(" {path} "), style)))
        })
        .collect();

    let title = format!(" attach image · {} ", picker.query);
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(title)
            .style(Style::default().bg(Color::Rgb(10, 12, 18))),
    );
    f.render_widget(list, popup);
}
