mod composer;
mod config;
mod stream;
mod thread;
mod tui;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use config::{ConfigFile, ResolvedConfig};
use stream::{StreamUpdate, ThreadClient, ThreadValues};

#[derive(Parser, Debug)]
#[command(
    name = "threadline",
    about = "A terminal chat client for remote coding agents",
    long_about = None,
)]
struct Args {
    /// Message to send directly (omit to enter interactive TUI mode)
    message: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "THREADLINE_PROFILE")]
    profile: Option<String>,

    /// Override agent server URL
    #[arg(long, env = "THREADLINE_SERVER")]
    server: Option<String>,

    /// Override assistant id
    #[arg(short, long, env = "THREADLINE_ASSISTANT")]
    assistant: Option<String>,

    /// Resume an existing thread by id (omit to start a new one)
    #[arg(short, long)]
    thread: Option<String>,

    /// Override API key
    #[arg(long, env = "THREADLINE_API_KEY")]
    api_key: Option<String>,

    /// Override the per-run recursion limit
    #[arg(long)]
    recursion_limit: Option<u32>,

    /// Write a default config file to ~/.config/threadline/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: threadline");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.server.as_deref(),
        args.assistant.as_deref(),
        args.api_key.as_deref(),
        args.recursion_limit,
    );

    let mut client = ThreadClient::new(resolved.server_url.clone(), resolved.assistant_id.clone());
    if let Some(key) = &resolved.api_key {
        client.set_api_key(key.clone());
    }

    // Resume the named thread, or start a fresh one
    let (thread_id, initial) = match &args.thread {
        Some(id) => {
            let values = client.thread_state(id).await?;
            (id.clone(), values)
        }
        None => (client.create_thread().await?, ThreadValues::default()),
    };

    // ── Single-shot mode (non-TUI) ────────────────────────────────────────────
    if let Some(message) = args.message {
        return run_single_shot(message, client, resolved, thread_id).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    tui::run(client, resolved, thread_id, initial).await
}

// ── Single-shot mode (plain stdout, no TUI) ───────────────────────────────────

async fn run_single_shot(
    message: String,
    client: ThreadClient,
    resolved: ResolvedConfig,
    thread_id: String,
) -> Result<()> {
    use tokio::sync::mpsc;

    println!();
    println!("  ▲ threadline  {}  ·  {}", resolved.profile_name, resolved.assistant_id);
    println!();
    println!("  thread: {thread_id}");
    println!();

    let outgoing =
        stream::OutgoingMessage::human(stream::MessageContent::Text(message));

    let (tx, mut rx) = mpsc::unbounded_channel::<StreamUpdate>();

    let run_client = client.clone();
    let run_thread = thread_id.clone();
    let limit = resolved.recursion_limit;
    let run_handle = tokio::spawn(async move {
        run_client.stream_run(&run_thread, outgoing, limit, tx).await
    });

    // Keep only the final snapshot — each one replaces the last anyway
    let mut messages = Vec::new();
    let mut todos = Vec::new();
    while let Some(update) = rx.recv().await {
        if let StreamUpdate::Snapshot { messages: m, todos: t } = update {
            messages = m;
            todos = t;
        }
    }

    let result = run_handle.await?;
    print_thread_plain(&thread::classify(&messages, &todos));

    if let Err(e) = result {
        println!("  ✗ {e}");
        std::process::exit(1);
    }
    println!("  thread {thread_id}  ·  resume with: threadline --thread {thread_id}");
    Ok(())
}

fn print_thread_plain(thread: &thread::Thread) {
    use thread::{Author, Block};

    if let Some(summary) = &thread.todos {
        println!("  ☰ {} {} · {} done", summary.total, summary.label, summary.completed);
        for item in &summary.items {
            let mark = if item.completed { "✓" } else { "○" };
            println!("    {mark} {}", item.title);
        }
        println!();
    }

    for block in &thread.blocks {
        match block {
            Block::Message { author, images, text, .. } => {
                let label = match author {
                    Author::Human => "you",
                    Author::Assistant => "agent",
                };
                for url in images {
                    let hint: String = url.chars().take(48).collect();
                    println!("  [{label}] ▦ image · {hint}");
                }
                let mut first = true;
                for line in text.lines() {
                    if first {
                        println!("  [{label}] {line}");
                        first = false;
                    } else {
                        println!("          {line}");
                    }
                }
                println!();
            }
            Block::ToolUse { name, state, output, error, .. } => {
                println!(
                    "  {} {} {name} ({})",
                    ui::state_glyph(*state),
                    ui::tool_glyph(name),
                    ui::state_label(*state),
                );
                let body = error.as_deref().or(output.as_deref());
                if let Some(body) = body {
                    if let Some(line) = body.lines().next() {
                        println!("    → {line}");
                    }
                }
                println!();
            }
        }
    }
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, String, u32)> = file
        .profiles
        .iter()
        .map(|(name, p)| {
            (name.clone(), p.server_url.clone(), p.assistant_id.clone(), p.recursion_limit)
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    for (name, server, assistant, limit) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    server     {server}");
        println!("    assistant  {assistant}");
        println!("    rec-limit  {limit}");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "threadline", &mut std::io::stdout());
    Ok(())
}
