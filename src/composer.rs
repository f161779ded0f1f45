/// Input capture and submission gating for the prompt line.
///
/// The Idle/Busy phase is an explicit state machine driven entirely by the
/// session's loading flag — there are no local timers and no retry logic.
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};

use crate::stream::{ContentPart, ImageRef, KnownPart, MessageContent, OutgoingMessage};

// ── Phase ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Busy,
}

// ── Attachments ───────────────────────────────────────────────────────────────

/// An attached image, encoded at attach time so submission is synchronous.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub path: String,
    pub mime_type: &'static str,
    pub data_url: String,
}

impl Attachment {
    pub fn load(path: &str) -> Result<Self> {
        let Some(mime_type) = mime_for(path) else {
            bail!("not an image file: {path}");
        };
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {path}"))?;
        Ok(Self {
            path: path.to_string(),
            mime_type,
            data_url: format!("data:{mime_type};base64,{}", B64.encode(&bytes)),
        })
    }
}

/// Media type by file extension. Only image types are attachable.
pub fn mime_for(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// ── Composer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Composer {
    pub text: String,
    /// Byte offset of the edit cursor in `text`.
    pub cursor: usize,
    pub attachments: Vec<Attachment>,
    phase: Phase,
}

impl Composer {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Busy
    }

    /// Mirror the external loading flag. The only way phase changes.
    pub fn sync_phase(&mut self, loading: bool) {
        self.phase = if loading { Phase::Busy } else { Phase::Idle };
    }

    // ── Editing ──────────────────────────────────────────────────────────────

    pub fn insert(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = self.text[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.text.remove(prev);
        self.cursor = prev;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.text[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Submit gate. Rejected while Busy, and rejected when the trimmed text
    /// is empty AND there are no attachments. On acceptance the text buffer
    /// clears immediately (optimistic); attachments stay — the chips widget
    /// owns their lifecycle and clears them after the hand-off.
    pub fn press_submit(&mut self) -> Option<OutgoingMessage> {
        if self.phase == Phase::Busy {
            return None;
        }
        if self.text.trim().is_empty() && self.attachments.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.text);
        self.cursor = 0;
        Some(self.compose(text))
    }

    /// Abort gate: only meaningful while Busy.
    pub fn press_abort(&self) -> bool {
        self.phase == Phase::Busy
    }

    /// Image parts in attachment order, then one trailing text part.
    fn compose(&self, text: String) -> OutgoingMessage {
        if self.attachments.is_empty() {
            return OutgoingMessage::human(MessageContent::Text(text));
        }
        let mut parts: Vec<ContentPart> = self
            .attachments
            .iter()
            .map(|a| {
                ContentPart::Known(KnownPart::ImageUrl {
                    image_url: ImageRef::Url(a.data_url.clone()),
                })
            })
            .collect();
        parts.push(ContentPart::Known(KnownPart::Text { text }));
        OutgoingMessage::human(MessageContent::Parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer_with_text(text: &str) -> Composer {
        let mut c = Composer::default();
        for ch in text.chars() {
            c.insert(ch);
        }
        c
    }

    fn fake_attachment() -> Attachment {
        Attachment {
            path: "shot.png".to_string(),
            mime_type: "image/png",
            data_url: "data:image/png;base64,AA==".to_string(),
        }
    }

    #[test]
    fn submit_while_busy_is_rejected_and_buffer_unchanged() {
        let mut c = composer_with_text("hello");
        c.sync_phase(true);
        assert!(c.press_submit().is_none());
        assert_eq!(c.text, "hello");
    }

    #[test]
    fn submit_with_empty_text_and_no_attachments_is_rejected() {
        let mut c = composer_with_text("   ");
        assert!(c.press_submit().is_none());
        let mut c = Composer::default();
        assert!(c.press_submit().is_none());
    }

    #[test]
    fn accepted_submit_clears_text_optimistically() {
        let mut c = composer_with_text("run the tests");
        let msg = c.press_submit().expect("accepted");
        assert_eq!(c.text, "");
        assert_eq!(c.cursor, 0);
        assert_eq!(
            msg.content,
            MessageContent::Text("run the tests".to_string())
        );
    }

    #[test]
    fn attachment_only_submit_is_accepted() {
        let mut c = Composer::default();
        c.attachments.push(fake_attachment());
        let msg = c.press_submit().expect("accepted");
        let MessageContent::Parts(parts) = msg.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 2);
        assert!(matches!(
            &parts[0],
            ContentPart::Known(KnownPart::ImageUrl { .. })
        ));
        assert!(matches!(
            &parts[1],
            ContentPart::Known(KnownPart::Text { text }) if text.is_empty()
        ));
    }

    #[test]
    fn images_come_before_the_trailing_text_part() {
        let mut c = composer_with_text("see these");
        c.attachments.push(fake_attachment());
        c.attachments.push(Attachment {
            path: "two.jpg".to_string(),
            mime_type: "image/jpeg",
            data_url: "data:image/jpeg;base64,BB==".to_string(),
        });
        let msg = c.press_submit().expect("accepted");
        let MessageContent::Parts(parts) = msg.content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        let ContentPart::Known(KnownPart::ImageUrl { image_url }) = &parts[0] else {
            panic!("expected first image");
        };
        assert_eq!(image_url.url(), "data:image/png;base64,AA==");
        assert!(matches!(
            &parts[2],
            ContentPart::Known(KnownPart::Text { text }) if text == "see these"
        ));
    }

    #[test]
    fn submit_does_not_clear_attachments() {
        let mut c = composer_with_text("x");
        c.attachments.push(fake_attachment());
        c.press_submit().expect("accepted");
        assert_eq!(c.attachments.len(), 1);
    }

    #[test]
    fn abort_only_fires_while_busy() {
        let mut c = Composer::default();
        assert!(!c.press_abort());
        c.sync_phase(true);
        assert!(c.press_abort());
        c.sync_phase(false);
        assert!(!c.press_abort());
    }

    #[test]
    fn cursor_editing_is_utf8_safe() {
        let mut c = Composer::default();
        c.insert('é');
        c.insert('x');
        c.move_left();
        c.backspace();
        assert_eq!(c.text, "x");
        assert_eq!(c.cursor, 0);
        c.move_right();
        assert_eq!(c.cursor, 1);
    }

    #[test]
    fn mime_detection_covers_image_extensions_only() {
        assert_eq!(mime_for("a.png"), Some("image/png"));
        assert_eq!(mime_for("a.JPG"), Some("image/jpeg"));
        assert_eq!(mime_for("a.jpeg"), Some("image/jpeg"));
        assert_eq!(mime_for("a.webp"), Some("image/webp"));
        assert_eq!(mime_for("a.gif"), Some("image/gif"));
        assert_eq!(mime_for("a.rs"), None);
        assert_eq!(mime_for("noext"), None);
    }

    #[test]
    fn loading_attachment_rejects_non_images() {
        assert!(Attachment::load("src/main.rs").is_err());
    }
}
