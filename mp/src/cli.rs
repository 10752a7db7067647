//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{GeocodingConfig, LlmConfig};
use crate::domain::{Coordinate, MissionObjective, MissionPlanRequest, Priority};
use crate::templates::find_template;

/// MissionPlanner - streaming LLM drone mission planner
#[derive(Parser)]
#[command(
    name = "mp",
    about = "Plan drone missions from natural-language objectives",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a mission plan, streaming progress as it is produced
    Plan(PlanArgs),

    /// Ask the planning assistant a question
    Chat {
        /// Message to send
        message: String,

        /// Mission context as a JSON document
        #[arg(long)]
        context: Option<String>,

        /// LLM model override
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List built-in mission templates
    Templates {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Arguments of `mp plan`
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Mission objective in plain language
    pub objective: Option<String>,

    /// Read the full request from a JSON file instead
    #[arg(short, long, conflicts_with_all = ["objective", "template"])]
    pub request: Option<PathBuf>,

    /// Start from a built-in template (see `mp templates`)
    #[arg(short, long, conflicts_with = "objective")]
    pub template: Option<String>,

    /// Objective priority (low, medium, high)
    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// Additional constraint (repeatable)
    #[arg(long = "constraint", value_name = "TEXT")]
    pub constraints: Vec<String>,

    /// Launch position as lat,lng[,alt]
    #[arg(long, value_parser = parse_coordinate, value_name = "LAT,LNG[,ALT]")]
    pub start: Option<Coordinate>,

    /// Area-of-interest corner as lat,lng (repeatable)
    #[arg(long = "aoi", value_parser = parse_coordinate, value_name = "LAT,LNG")]
    pub area_of_interest: Vec<Coordinate>,

    /// LLM model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Stream the model's reasoning
    #[arg(long)]
    pub reasoning: bool,

    /// Print one JSON response instead of streaming chunks
    #[arg(long)]
    pub simple: bool,
}

impl PlanArgs {
    /// Build the planning request from the arguments
    ///
    /// Command-line flags override values read from `--request` or a template.
    pub fn to_request(&self) -> Result<MissionPlanRequest> {
        debug!(request = ?self.request, template = ?self.template, "to_request: called");
        let mut request = if let Some(path) = &self.request {
            let content =
                std::fs::read_to_string(path).context(format!("Failed to read request file {}", path.display()))?;
            serde_json::from_str::<MissionPlanRequest>(&content)
                .context(format!("Failed to parse request file {}", path.display()))?
        } else if let Some(id) = &self.template {
            let template = find_template(id).ok_or_else(|| eyre::eyre!("Unknown template '{id}'. Run `mp templates`"))?;
            MissionPlanRequest::new(template.objective())
        } else if let Some(objective) = &self.objective {
            MissionPlanRequest::new(MissionObjective::new(objective.as_str()))
        } else {
            return Err(eyre::eyre!("Provide an objective, --request FILE or --template ID"));
        };

        if let Some(priority) = self.priority {
            request.objective.priority = priority;
        }
        if !self.constraints.is_empty() {
            request
                .objective
                .constraints
                .get_or_insert_with(Vec::new)
                .extend(self.constraints.iter().cloned());
        }
        if self.start.is_some() {
            request.start_position = self.start;
        }
        if !self.area_of_interest.is_empty() {
            request.area_of_interest = Some(self.area_of_interest.clone());
        }
        if self.model.is_some() {
            request.model = self.model.clone();
        }
        if self.reasoning {
            request.include_reasoning = true;
        }
        Ok(request)
    }
}

/// Parse `lat,lng` or `lat,lng,alt`
pub fn parse_coordinate(s: &str) -> Result<Coordinate, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let number = |p: &str| p.parse::<f64>().map_err(|e| format!("'{p}' is not a number: {e}"));
    let coordinate = match parts.as_slice() {
        [lat, lng] => Coordinate::new(number(lat)?, number(lng)?),
        [lat, lng, alt] => Coordinate::with_alt(number(lat)?, number(lng)?, number(alt)?),
        _ => return Err(format!("expected LAT,LNG[,ALT], got '{s}'")),
    };
    coordinate.validate()?;
    Ok(coordinate)
}

/// Whether a credential environment variable is set
pub struct CredentialCheck {
    pub env_var: String,
    pub purpose: &'static str,
    pub present: bool,
}

impl CredentialCheck {
    pub fn check(env_var: &str, purpose: &'static str) -> Self {
        debug!(%env_var, "CredentialCheck::check: called");
        let present = std::env::var(env_var).is_ok_and(|v| !v.trim().is_empty());
        Self {
            env_var: env_var.to_string(),
            purpose,
            present,
        }
    }
}

/// Check the credentials the default configuration reads
pub fn check_credentials() -> Vec<CredentialCheck> {
    vec![
        CredentialCheck::check(&LlmConfig::default().api_key_env, "LLM"),
        CredentialCheck::check(&GeocodingConfig::default().api_key_env, "geocoding"),
    ]
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("missionplanner")
        .join("logs")
        .join("missionplanner.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with credential checks and the log path
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Credentials:\n");
    for check in check_credentials() {
        let icon = if check.present { "\u{2705}" } else { "\u{274C}" };
        help.push_str(&format!("  {} {:<22} {}\n", icon, check.env_var, check.purpose));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for listing commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}
