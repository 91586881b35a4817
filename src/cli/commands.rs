use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;

use crate::ids::SessionId;
use crate::runtime_config::RuntimeConfig;
use crate::sse::augment_endpoint;
use crate::uri_template::{is_template, TemplateValue, TemplateVariables, UriTemplate};

/// Command-line interface for mcpwire
#[derive(Parser, Debug)]
#[command(name = "mcpwire")]
#[command(about = "URI template and SSE endpoint tooling", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a template with the given variables
    Expand {
        #[arg(short, long)]
        template: String,

        /// Single value, `name=value` (repeatable)
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,

        /// List value, `name=a,b,c` (repeatable)
        #[arg(long = "list", value_parser = parse_binding)]
        lists: Vec<(String, String)>,
    },
    /// Match a URI against a template and print the bindings as JSON
    Match {
        #[arg(short, long)]
        template: String,

        #[arg(short, long)]
        uri: String,
    },
    /// Append a session id to an SSE message endpoint
    Endpoint {
        #[arg(short, long, default_value = "/messages")]
        endpoint: String,

        /// Use this id (a ULID) instead of generating one
        #[arg(long)]
        session_id: Option<SessionId>,

        /// Print `{"endpoint": ..., "session_id": ...}` instead of the bare endpoint
        #[arg(long)]
        json: bool,
    },
    /// Report whether a string contains template expressions
    IsTemplate { text: String },
}

/// Text to print and whether the command succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct EndpointInfo {
    endpoint: String,
    session_id: SessionId,
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got `{raw}`")),
    }
}

fn compile(template: &str, config: &RuntimeConfig) -> Result<UriTemplate> {
    UriTemplate::with_limits(template, config.template_limits())
        .with_context(|| format!("invalid template `{template}`"))
}

/// Run one command without touching stdout.
pub fn execute(command: &Commands, config: &RuntimeConfig) -> Result<CommandOutput> {
    match command {
        Commands::Expand {
            template,
            vars,
            lists,
        } => {
            let template = compile(template, config)?;
            let mut bindings = TemplateVariables::new();
            for (name, value) in vars {
                bindings.insert(name.clone(), TemplateValue::from(value.as_str()));
            }
            for (name, items) in lists {
                if bindings.contains_key(name) {
                    bail!("variable `{name}` given as both --var and --list");
                }
                let items: Vec<&str> = items.split(',').collect();
                bindings.insert(name.clone(), TemplateValue::from(items));
            }
            Ok(CommandOutput::ok(template.expand(&bindings)))
        }
        Commands::Match { template, uri } => {
            let template = compile(template, config)?;
            match template.match_uri(uri) {
                Some(bound) => {
                    let sorted: std::collections::BTreeMap<_, _> = bound.into_iter().collect();
                    Ok(CommandOutput::ok(serde_json::to_string(&sorted)?))
                }
                None => Ok(CommandOutput {
                    text: "null".to_string(),
                    success: false,
                }),
            }
        }
        Commands::Endpoint {
            endpoint,
            session_id,
            json,
        } => {
            let session_id = session_id.unwrap_or_default();
            let endpoint = augment_endpoint(endpoint, &session_id.to_string());
            if *json {
                let info = EndpointInfo {
                    endpoint,
                    session_id,
                };
                Ok(CommandOutput::ok(serde_json::to_string(&info)?))
            } else {
                Ok(CommandOutput::ok(endpoint))
            }
        }
        Commands::IsTemplate { text } => Ok(CommandOutput::ok(is_template(text).to_string())),
    }
}

/// Parse arguments, run, print, and map the outcome to an exit code.
pub fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();
    let output = execute(&cli.command, &config)?;
    println!("{}", output.text);
    Ok(if output.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
