mod cli;
mod config;
mod preset_file;

use std::sync::Arc;

use clap::Parser;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand, TasksCommand};
use config::load_config;
use lab_adapter::Adapter;
use lab_providers::ProviderRegistry;
use lab_store::Store;
use lab_tools::ToolRegistry;
use lab_types::event::{ConversationEvent, Event};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lab_cli=debug")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { preset, topic, id, resume, rounds, json } => run(preset, topic, id, resume, rounds, json).await,
        Command::Doctor => doctor().await,
        Command::Config(ConfigCommand::Validate) => config_validate(),
        Command::Config(ConfigCommand::Show) => config_show(),
        Command::Tasks(TasksCommand::Validate { path }) => tasks_validate(&path),
        Command::Version => {
            println!("lab-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run(preset_path: std::path::PathBuf, topic: String, id: Option<String>, resume: bool, rounds: i64, json: bool) -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;
    tracing::info!(config_path, "loaded configuration");

    let preset = preset_file::load_preset(&preset_path)?;

    let store = Arc::new(Store::open(&config.store.path)?);

    let mut providers = ProviderRegistry::new();
    for (role, model_spec) in &config.roles {
        providers.assign_role(role, model_spec);
    }
    if providers.is_empty() {
        tracing::warn!("no LLM providers registered — every agent/moderator/summarizer turn will fail with a provider-not-found error");
    }

    let tools = ToolRegistry::new();

    let adapter = Adapter::new(Arc::new(providers), Arc::new(tools), store, config.adapter.max_concurrent_conversations);

    let preset_ref = preset_path.display().to_string();
    let conversation_id = adapter.start_conversation(preset_ref, preset, topic, id, resume).await?;
    adapter.set_conversation_rounds(&conversation_id, rounds).await?;

    println!("conversation {conversation_id} started, running up to {rounds} rounds");

    let mut events = adapter.stream_events(&conversation_id).await?;
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        if json {
            collected.push(event);
        } else {
            print_event(&event);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&collected)?);
    }

    Ok(())
}

fn print_event(event: &ConversationEvent) {
    use std::io::Write;
    let mut out = std::io::stdout();
    match &event.event {
        Event::ProviderResult { node_id, role, content_len } => {
            let _ = writeln!(out, "[{node_id}/{role}] produced {content_len} chars");
        }
        Event::ToolCall { node_id, tool_id, .. } => {
            let _ = writeln!(out, "[{node_id}] calling tool {tool_id}");
        }
        Event::ToolResult { node_id, tool_id, ok } => {
            let _ = writeln!(out, "[{node_id}] tool {tool_id} -> {}", if *ok { "ok" } else { "failed" });
        }
        Event::ToolError { node_id, tool_id, message } => {
            let _ = writeln!(out, "[{node_id}] tool {tool_id} error: {message}");
        }
        Event::NodeSkipped { node_id } => {
            let _ = writeln!(out, "[{node_id}] skipped");
        }
        Event::IterationComplete { iter } => {
            let _ = writeln!(out, "-- iteration {iter} complete --");
        }
        Event::ModeratorAction { action, rollback } => {
            let _ = writeln!(out, "moderator action: {action} (rollback {rollback})");
        }
        Event::RunComplete => {
            let _ = writeln!(out, "run complete");
        }
        Event::Error { kind, message, fatal } => {
            let _ = writeln!(std::io::stderr(), "error[{kind}]{}: {message}", if *fatal { " (fatal)" } else { "" });
        }
        Event::UserMessage { content } => {
            let _ = writeln!(out, "user: {content}");
        }
    }
    let _ = out.flush();
}

async fn doctor() -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;
    println!("config file: {config_path}");

    let issues = config.validate();
    if issues.is_empty() {
        println!("config: ok");
    } else {
        for issue in &issues {
            println!("config: {issue}");
        }
    }

    match Store::open(&config.store.path) {
        Ok(_) => println!("store: ok ({})", config.store.path.display()),
        Err(e) => println!("store: error opening {}: {e}", config.store.path.display()),
    }

    let has_errors = issues.iter().any(|i| i.severity == config::ConfigSeverity::Error);
    if has_errors {
        std::process::exit(1);
    }
    Ok(())
}

fn config_validate() -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == config::ConfigSeverity::Error).count();

    println!("validating {config_path}");
    for issue in &issues {
        println!("  {issue}");
    }
    if issues.is_empty() {
        println!("  no issues found");
    }

    if error_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn config_show() -> anyhow::Result<()> {
    let (config, _path) = load_config()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[derive(serde::Deserialize)]
struct TasksFile {
    #[serde(default)]
    tasks: Vec<lab_tasks::TaskConfig>,
}

fn tasks_validate(path: &std::path::Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let file: TasksFile = toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;

    if file.tasks.is_empty() {
        println!("no tasks defined in {}", path.display());
        return Ok(());
    }

    let now = chrono::Utc::now();
    for config in &file.tasks {
        let due = lab_tasks::is_due(&config.schedule, None, now);
        println!(
            "{:<20} enabled={:<5} due_now={:<5} sources={:?} sinks={:?}",
            config.id, config.enabled, due, config.sources, config.sinks
        );
    }
    Ok(())
}
