//! Palaver CLI — entry point.
//!
//! # Commands
//!
//! - `palaver ask [PROMPT]` — general question answering
//! - `palaver diagram [PROMPT]` — Mermaid diagram authoring
//! - `palaver query [PROMPT]` — SQL assistance against a database
//! - `palaver history <list|show|delete|compact>` — stored conversations

mod helpers;
mod history_cmd;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use palaver_agent::{
    resolve_context, AgentLoop, FinalizePipeline, FinalizeRequest, OutputDelivery,
    RequestOptions, ToolRuntime,
};
use palaver_core::config::load_config;
use palaver_core::history::{HistoryStore, ModeContext, UpsertParams};
use palaver_core::types::{Effort, Verbosity};
use palaver_providers::HttpModelClient;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Palaver — a conversational assistant for your terminal
#[derive(Parser)]
#[command(name = "palaver", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a general question
    Ask {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Author or revise a Mermaid diagram
    Diagram {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Work with a SQL database
    Query {
        #[command(flatten)]
        args: RunArgs,

        /// Connection string passed to the SQL tools
        #[arg(long)]
        connection: Option<String>,
    },

    /// Inspect and maintain stored conversations
    History {
        #[command(subcommand)]
        action: history_cmd::HistoryCommands,
    },
}

/// Flags shared by every conversational subcommand.
#[derive(Args)]
struct RunArgs {
    /// Prompt text; read from stdin when omitted
    prompt: Option<String>,

    /// Model to use (inherited from the conversation, then config)
    #[arg(short, long)]
    model: Option<String>,

    /// Reasoning effort: low, medium or high
    #[arg(long)]
    effort: Option<Effort>,

    /// Answer verbosity: low, medium or high
    #[arg(long)]
    verbosity: Option<Verbosity>,

    /// Continue the most recently updated conversation
    #[arg(long = "continue", conflicts_with = "resume")]
    continue_latest: bool,

    /// Resume the conversation at this number from `palaver history list`
    #[arg(long)]
    resume: Option<usize>,

    /// Also write the answer to this file (inside the workspace)
    #[arg(short, long)]
    output: Option<String>,

    /// Also copy the answer to the clipboard
    #[arg(long, default_value_t = false)]
    copy: bool,

    /// Cap on model round trips for this request
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    logs: bool,

    /// Disable colored output
    #[arg(long, default_value_t = false)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug)]
enum Mode {
    Ask,
    Diagram,
    Query,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { args } => {
            init_logging(args.logs);
            run_request(Mode::Ask, args, None).await
        }
        Commands::Diagram { args } => {
            init_logging(args.logs);
            run_request(Mode::Diagram, args, None).await
        }
        Commands::Query { args, connection } => {
            init_logging(args.logs);
            run_request(Mode::Query, args, connection).await
        }
        Commands::History { action } => {
            init_logging(false);
            history_cmd::dispatch(action)
        }
    }
}

// ─────────────────────────────────────────────
// Conversational request
// ─────────────────────────────────────────────

async fn run_request(mode: Mode, args: RunArgs, connection: Option<String>) -> Result<()> {
    let config = load_config(None);
    if config.api.key.is_empty() {
        bail!(
            "no API key configured; set api.key in {} or PALAVER_API__KEY",
            palaver_core::config::get_config_path().display()
        );
    }

    let prompt = helpers::resolve_prompt(args.prompt)?;
    let workspace = helpers::resolve_workspace(&config.workspace)?;
    let store = HistoryStore::at_default_location();

    let options = RequestOptions {
        model: args.model,
        effort: args.effort,
        verbosity: args.verbosity,
        continue_latest: args.continue_latest,
        resume_ordinal: args.resume,
    };
    let ctx = resolve_context(&options, &config.defaults, &store, &prompt)?;
    info!(
        mode = ?mode,
        model = %ctx.model,
        new_conversation = ctx.is_new_conversation,
        "starting request"
    );

    let client = Arc::new(HttpModelClient::new(&config.api.base, &config.api.key));
    let runtime = match mode {
        Mode::Ask => ToolRuntime::for_ask(&workspace),
        Mode::Diagram => ToolRuntime::for_diagram(&workspace),
        Mode::Query => ToolRuntime::for_query(&workspace, connection.clone()),
    };
    let max_iterations = args
        .max_iterations
        .unwrap_or(config.defaults.max_iterations);
    let agent = AgentLoop::new(client, runtime, max_iterations);

    let outcome = agent
        .run(&ctx, Some(instructions(mode).to_string()), &prompt)
        .await?;

    if outcome.reached_max_iterations {
        let warning = format!(
            "Stopped after {max_iterations} iterations; the answer may be incomplete."
        );
        if args.no_color {
            eprintln!("{warning}");
        } else {
            eprintln!("{}", warning.yellow());
        }
    }

    let commit = outcome.response_id.as_ref().map(|id| UpsertParams {
        response_id: id.clone(),
        user_text: prompt.clone(),
        assistant_text: outcome.content.clone(),
        model: ctx.model.clone(),
        effort: ctx.effort,
        verbosity: ctx.verbosity,
        title: ctx.title.clone(),
        previous_response_id: ctx.previous_response_id.clone(),
        active_last_response_id: ctx.active_last_response_id.clone(),
        context: Some(mode_context(mode, &args.output, args.copy, connection)),
    });

    let pipeline = FinalizePipeline::new(&workspace, store);
    let result = pipeline
        .handle_result(FinalizeRequest {
            content: outcome.content,
            delivery: OutputDelivery {
                file: args.output,
                copy: args.copy,
                copy_source: None,
            },
            commit,
        })
        .await?;

    helpers::print_response(&result.stdout, args.no_color);
    Ok(())
}

fn mode_context(
    mode: Mode,
    output: &Option<String>,
    copy: bool,
    connection: Option<String>,
) -> ModeContext {
    match mode {
        Mode::Ask => ModeContext::Ask {
            output_file: output.clone(),
            copy,
            extra: serde_json::Map::new(),
        },
        Mode::Diagram => ModeContext::Diagram {
            output_file: output.clone(),
            copy,
            extra: serde_json::Map::new(),
        },
        Mode::Query => ModeContext::Query {
            connection,
            extra: serde_json::Map::new(),
        },
    }
}

fn instructions(mode: Mode) -> &'static str {
    match mode {
        Mode::Ask => {
            "You are Palaver, a concise assistant running in a terminal. \
             Use the file tools to read or write files in the workspace when \
             the user's request calls for it. Answer in plain text."
        }
        Mode::Diagram => {
            "You are Palaver, a Mermaid diagram author. Write diagrams to \
             .mmd files in the workspace with write_file and validate them \
             with lint_diagram before presenting them. Fix any errors the \
             linter reports."
        }
        Mode::Query => {
            "You are Palaver, a SQL assistant. Use describe_schema to learn \
             the database layout and dry_run_sql to validate statements \
             before presenting them. Never claim a statement works without a \
             successful dry run."
        }
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("palaver=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
