//! bcf - command-line front end for BCF archives.

use bcf_topics::cli::{Cli, Commands, ConfigCommands};
use bcf_topics::commands::{self, NewTopic, Output};
use bcf_topics::config::{ConfigOverrides, resolve_config};
use clap::Parser;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter, e.g. `BCF_LOG=debug`.
const LOG_ENV: &str = "BCF_LOG";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // stdout carries command output, so logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = run_command(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), bcf_topics::Error> {
    let human = cli.human_readable;

    let mut overrides = ConfigOverrides::new();
    if let Some(path) = cli.config {
        overrides = overrides.with_config_path(path);
    }
    if let Some(author) = cli.author {
        overrides = overrides.with_author(author);
    }
    if cli.strict {
        overrides = overrides.with_strict(true);
    }
    let resolved = resolve_config(&overrides)?;
    tracing::debug!(files = resolved.files.len(), "Resolved configuration");

    match cli.command {
        Commands::Show { archive } => {
            let result = commands::show(&archive, resolved.config)?;
            output(&result, human);
        }
        Commands::Convert { input, output: target, to } => {
            let to = to.as_deref().map(commands::parse_version).transpose()?;
            let result = commands::convert(&input, &target, to, resolved.config)?;
            output(&result, human);
        }
        Commands::Extensions { archive } => {
            let result = commands::extensions(&archive, resolved.config)?;
            output(&result, human);
        }
        Commands::New {
            output: target,
            title,
            topic_type,
            status,
            priority,
            description,
            assigned_to,
            labels,
            comments,
            to,
        } => {
            let version = to.as_deref().map(commands::parse_version).transpose()?;
            let topic = NewTopic {
                title,
                topic_type,
                status,
                priority,
                description,
                assigned_to,
                labels,
                comments,
            };
            let result = commands::new_topic(&target, topic, version, resolved.config)?;
            output(&result, human);
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(resolved);
                output(&result, human);
            }
        },
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
