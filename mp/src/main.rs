//! MissionPlanner - streaming LLM drone mission planner
//!
//! CLI entry point for planning missions and talking to the planning assistant.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use missionplanner::chat::{ChatRequest, PlannerChat};
use missionplanner::cli::{Cli, Command, OutputFormat, PlanArgs, generate_after_help};
use missionplanner::config::Config;
use missionplanner::domain::MissionPlanRequest;
use missionplanner::events::{EventBus, create_event_bus, spawn_event_logger};
use missionplanner::geocode::{Geocoder, GoogleGeocoder};
use missionplanner::llm::{LlmClient, Message, STREAM_CHANNEL_CAPACITY, StreamChunk, create_client};
use missionplanner::pipeline::{ChunkType, MissionPlanner};
use missionplanner::templates::TEMPLATES;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("missionplanner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("missionplanner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows credential checks
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("MissionPlanner loaded config: model={}", config.llm.model);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan(args) => cmd_plan(&config, args).await,
        Command::Chat { message, context, model } => cmd_chat(&config, message, context, model).await,
        Command::Templates { format } => cmd_templates(format),
    }
}

/// Generate a mission plan
async fn cmd_plan(config: &Config, args: PlanArgs) -> Result<()> {
    debug!(simple = args.simple, "cmd_plan: called");
    let request = args.to_request()?;

    // A missing key is reported through the stream, not here
    if let Err(e) = config.validate() {
        warn!(error = %e, "cmd_plan: configuration incomplete");
    }

    let llm: Arc<dyn LlmClient> = create_client(&config.llm).context("Failed to create LLM client")?;
    let geocoder: Arc<dyn Geocoder> =
        Arc::new(GoogleGeocoder::from_config(&config.geocoding).context("Failed to create geocoder")?);

    let events: Arc<EventBus> = create_event_bus();
    let logger = config
        .events
        .dir
        .as_ref()
        .map(|dir| spawn_event_logger(events.clone(), dir));

    let planner = MissionPlanner::from_config(config, llm, geocoder, events);
    let succeeded = if args.simple {
        let response = planner.generate_simple(request).await;
        println!("{}", serde_json::to_string_pretty(&response)?);
        response.success
    } else {
        stream_plan(&planner, request).await?
    };

    // The logger stops once every handle to the bus is gone
    drop(planner);
    if let Some(handle) = logger
        && let Err(e) = handle.await
    {
        warn!(error = %e, "cmd_plan: event logger task failed");
    }

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Print each chunk as a `data:` line until the run ends or Ctrl-C
async fn stream_plan(planner: &MissionPlanner, request: MissionPlanRequest) -> Result<bool> {
    let mut stream = planner.generate(request);
    info!(run_id = %stream.run_id(), "stream_plan: run started");

    let mut succeeded = false;
    loop {
        tokio::select! {
            chunk = stream.recv() => {
                let Some(chunk) = chunk else { break };
                if chunk.is_final {
                    succeeded = chunk.chunk_type == ChunkType::Plan;
                }
                println!("data: {}\n", serde_json::to_string(&chunk)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!(run_id = %stream.run_id(), "stream_plan: interrupted, cancelling run");
                stream.cancel();
            }
        }
    }

    println!("data: {}\n", serde_json::json!({"event": "done"}));
    Ok(succeeded)
}

/// Send one message to the planning assistant and stream the reply
async fn cmd_chat(config: &Config, message: String, context: Option<String>, model: Option<String>) -> Result<()> {
    debug!(?model, has_context = context.is_some(), "cmd_chat: called");
    config.validate()?;

    let context = context
        .map(|c| serde_json::from_str::<serde_json::Value>(&c))
        .transpose()
        .context("--context is not valid JSON")?;

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let chat = PlannerChat::new(llm, config.llm.max_tokens);
    let request = ChatRequest {
        messages: vec![Message::user(message)],
        context,
        model,
    };

    let (tx, mut rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let printer = tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = rx.recv().await {
            if let StreamChunk::ContentDelta(text) = chunk {
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
        }
    });

    let result = chat.stream(&request, tx).await;
    printer.await.context("Chat printer task failed")?;
    println!();

    let response = result.context("Chat request failed")?;
    debug!(content_len = response.content.len(), "cmd_chat: reply complete");
    Ok(())
}

/// List built-in mission templates
fn cmd_templates(format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_templates: called");
    match format {
        OutputFormat::Json => {
            let templates: Vec<serde_json::Value> = TEMPLATES
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "id": t.id,
                        "name": t.name,
                        "description": t.description,
                        "objective": t.objective(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
        OutputFormat::Text => {
            println!("Available templates:");
            println!();
            for template in TEMPLATES {
                let objective = template.objective();
                println!("  {}", template.id);
                println!("    {}", template.name);
                println!("    {}", template.description);
                println!("    Priority: {}", objective.priority);
                if let Some(constraints) = objective.constraints_line() {
                    println!("    Constraints: {}", constraints);
                }
                println!();
            }
        }
    }
    Ok(())
}
