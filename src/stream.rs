use anyhow::{anyhow, Context, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

// ── Wire types ────────────────────────────────────────────────────────────────

/// One turn in the conversation, as delivered by the agent server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub content: MessageContent,
    /// Tool invocations requested by this turn (assistant turns only).
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result turns: the invocation this result answers.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EventKind {
    Human,
    Ai,
    Tool,
    /// Anything the server sends that we don't know — decoded, never rendered.
    Other,
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "human" => EventKind::Human,
            "ai" => EventKind::Ai,
            "tool" => EventKind::Tool,
            _ => EventKind::Other,
        }
    }
}

/// Message content: a plain string, an ordered part list, or an opaque
/// structured payload (tool results may carry arbitrary JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Structured(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// A single content part. Recognized shapes decode into [`KnownPart`];
/// everything else lands in `Other` and contributes nothing to rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Known(KnownPart),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownPart {
    Text { text: String },
    ImageUrl { image_url: ImageRef },
}

/// Image reference: servers send either an inline URL string or `{ url }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    Url(String),
    Object { url: String },
}

impl ImageRef {
    pub fn url(&self) -> &str {
        match self {
            ImageRef::Url(s) => s,
            ImageRef::Object { url } => url,
        }
    }
}

/// A tool invocation embedded in an assistant turn. `args` is absent while
/// the server is still streaming the invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Option<Value>,
}

// ── Todo list ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: Value,
    pub title: String,
    #[serde(default)]
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum TodoStatus {
    #[default]
    Pending,
    Completed,
    /// Statuses we don't know render unchecked, same as pending.
    Unknown,
}

impl From<String> for TodoStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TodoStatus::Pending,
            "completed" => TodoStatus::Completed,
            _ => TodoStatus::Unknown,
        }
    }
}

// ── State snapshot ────────────────────────────────────────────────────────────

/// Full thread state as delivered by a `values` stream event or the
/// thread-state endpoint. Each snapshot wholesale replaces the previous one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadValues {
    #[serde(default)]
    pub messages: Vec<ThreadEvent>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
}

// ── Outgoing message ──────────────────────────────────────────────────────────

/// One new human turn, composed by the input layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: MessageContent,
}

impl OutgoingMessage {
    pub fn human(content: MessageContent) -> Self {
        Self { kind: EventKind::Human, content }
    }
}

// ── Updates from the session task to the UI ───────────────────────────────────

#[derive(Debug, Clone)]
pub enum StreamUpdate {
    /// The server accepted the run; `run_id` is needed for cancellation.
    RunStarted { run_id: String },
    /// A full state snapshot. Replaces everything previously delivered.
    Snapshot { messages: Vec<ThreadEvent>, todos: Vec<TodoItem> },
    /// The run completed (or was stopped).
    RunFinished,
    /// The run failed. Transport and in-band errors both end up here.
    RunError(String),
}

// ── SSE metadata frame ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RunMetadata {
    run_id: String,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// HTTP client for the agent server's thread-streaming API.
#[derive(Clone)]
pub struct ThreadClient {
    http: reqwest::Client,
    pub base_url: String,
    pub assistant_id: String,
    api_key: Option<String>,
}

impl ThreadClient {
    pub fn new(base_url: String, assistant_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            assistant_id,
            api_key: None,
        }
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url).header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }
        req
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Create a new thread on the server and return its id.
    pub async fn create_thread(&self) -> Result<String> {
        let resp = self
            .post(&self.url("/threads"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to reach agent server")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Server error {} creating thread: {}", status, text));
        }

        let body: Value = resp.json().await?;
        body["thread_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No thread_id in server response"))
    }

    /// Fetch the current state of an existing thread (used on resume).
    pub async fn thread_state(&self, thread_id: &str) -> Result<ThreadValues> {
        let url = self.url(&format!("/threads/{thread_id}/state"));
        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }
        let resp = req.send().await.context("Failed to reach agent server")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Server error {} reading thread state", resp.status()));
        }

        let body: Value = resp.json().await?;
        // State endpoint wraps the snapshot in a `values` field
        let values = body.get("values").cloned().unwrap_or(body);
        Ok(serde_json::from_value(values).unwrap_or_default())
    }

    /// Ask the server to stop a run in flight. Intent only — snapshots
    /// already delivered are never altered.
    pub async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let url = self.url(&format!("/threads/{thread_id}/runs/{run_id}/cancel"));
        let resp = self.post(&url).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("Server error {} cancelling run", resp.status()));
        }
        Ok(())
    }

    /// Submit one human turn and stream state snapshots until the run ends.
    /// Sends `RunStarted` and `Snapshot` updates as frames arrive; the caller
    /// is responsible for the terminal `RunFinished`/`RunError`.
    pub async fn stream_run(
        &self,
        thread_id: &str,
        message: OutgoingMessage,
        recursion_limit: u32,
        updates: mpsc::UnboundedSender<StreamUpdate>,
    ) -> Result<()> {
        let body = serde_json::json!({
            "assistant_id": self.assistant_id,
            "input": { "messages": [message] },
            "config": { "recursion_limit": recursion_limit },
            "stream_mode": "values",
        });

        let url = self.url(&format!("/threads/{thread_id}/runs/stream"));
        let resp = self.post(&url).json(&body).send().await
            .context("Failed to reach agent server")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Server error {}: {}", status, text));
        }

        let mut stream = resp.bytes_stream();

        // SSE frames may split across chunks; buffer and drain complete lines
        let mut buf = String::new();
        let mut event_name = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            buf.push_str(std::str::from_utf8(&bytes).unwrap_or(""));

            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim_end_matches('\r').to_string();
                buf.drain(..=pos);

                if line.is_empty() {
                    continue;
                }
                if let Some(name) = line.strip_prefix("event: ") {
                    event_name = name.trim().to_string();
                    continue;
                }
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                match event_name.as_str() {
                    "metadata" => {
                        if let Ok(meta) = serde_json::from_str::<RunMetadata>(data) {
                            let _ = updates.send(StreamUpdate::RunStarted { run_id: meta.run_id });
                        }
                    }
                    "values" => {
                        // Malformed snapshots are skipped, not fatal — the next
                        // one replaces whatever we have anyway
                        if let Ok(values) = serde_json::from_str::<ThreadValues>(data) {
                            let _ = updates.send(StreamUpdate::Snapshot {
                                messages: values.messages,
                                todos: values.todos,
                            });
                        }
                    }
                    "error" => {
                        let msg = serde_json::from_str::<Value>(data)
                            .ok()
                            .and_then(|v| {
                                v.get("message").and_then(Value::as_str).map(str::to_string)
                            })
                            .unwrap_or_else(|| data.to_string());
                        return Err(anyhow!("{msg}"));
                    }
                    "end" => return Ok(()),
                    _ => {}
                }
            }
        }

        Ok(())
    }
}
