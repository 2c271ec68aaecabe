//! CLI argument definitions for bcf.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with the commit and build time injected by `build.rs`.
pub const BUILD_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BCF_GIT_COMMIT"),
    " ",
    env!("BCF_BUILD_TIMESTAMP"),
    ")"
);

/// bcf - Inspect, convert and create BCF (BIM Collaboration Format) archives.
///
/// Start with `bcf show <archive>` to list the topics in a `.bcf` file.
#[derive(Parser, Debug)]
#[command(name = "bcf")]
#[command(author, version = BUILD_VERSION, about = "Inspect, convert and create BCF archives", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Configuration file layered over the system one.
    /// Falls back to the BCF_CONFIG environment variable.
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Author recorded on new topics and comments
    #[arg(long, global = true)]
    pub author: Option<String>,

    /// Reject topic types, statuses, labels and other values outside the vocabulary
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import an archive and list its topics
    Show {
        /// Path to the .bcf archive
        archive: PathBuf,
    },

    /// Import an archive and export it again, optionally in another version
    Convert {
        /// Archive to read
        input: PathBuf,

        /// Archive to write
        output: PathBuf,

        /// Target schema version (2.1 or 3)
        #[arg(long = "to")]
        to: Option<String>,
    },

    /// Show the vocabulary after importing an archive, with the values in use
    Extensions {
        /// Path to the .bcf archive
        archive: PathBuf,
    },

    /// Create a single-topic archive
    New {
        /// Archive to write
        output: PathBuf,

        /// Topic title
        #[arg(short, long)]
        title: String,

        /// Topic type (e.g. Issue, Clash)
        #[arg(long = "type")]
        topic_type: Option<String>,

        /// Topic status (e.g. Active, Closed)
        #[arg(long)]
        status: Option<String>,

        /// Priority (e.g. High)
        #[arg(long)]
        priority: Option<String>,

        /// Topic description
        #[arg(long)]
        description: Option<String>,

        /// Assignee
        #[arg(long)]
        assigned_to: Option<String>,

        /// Label (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,

        /// Comment text (repeatable)
        #[arg(short, long = "comment")]
        comments: Vec<String>,

        /// Schema version to write (2.1 or 3)
        #[arg(long = "to")]
        to: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show() {
        let cli = Cli::try_parse_from(["bcf", "-H", "show", "issues.bcf"]).unwrap();
        assert!(cli.human_readable);
        match cli.command {
            Commands::Show { archive } => assert_eq!(archive, PathBuf::from("issues.bcf")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_new_with_repeated_flags() {
        let cli = Cli::try_parse_from([
            "bcf", "new", "out.bcf", "--title", "Clash A", "--type", "Clash", "-l", "A",
            "--label", "B", "--comment", "Check this", "--to", "3", "--strict",
        ])
        .unwrap();
        assert!(cli.strict);
        match cli.command {
            Commands::New {
                title,
                topic_type,
                labels,
                comments,
                to,
                ..
            } => {
                assert_eq!(title, "Clash A");
                assert_eq!(topic_type.as_deref(), Some("Clash"));
                assert_eq!(labels, vec!["A", "B"]);
                assert_eq!(comments, vec!["Check this"]);
                assert_eq!(to.as_deref(), Some("3"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_new_requires_title() {
        assert!(Cli::try_parse_from(["bcf", "new", "out.bcf"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["bcf", "config", "show", "--author", "a@example.com"]).unwrap();
        assert_eq!(cli.author.as_deref(), Some("a@example.com"));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }
}
