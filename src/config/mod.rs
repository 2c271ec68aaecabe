//! Configuration for BCF topic management.
//!
//! A [`BcfConfig`] carries the vocabulary topics are validated against
//! (types, statuses, priorities, labels, stages, users) and the policy flags
//! that drive import and export. Every manager owns exactly one.
//!
//! ## config.kdl
//!
//! Located at:
//! - System: `~/.config/bcf/config.kdl`
//! - Explicit: the path given by `--config` or `BCF_CONFIG`
//!
//! ## Precedence
//!
//! CLI flag > explicit config file > system config > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    BCF_CONFIG_ENV, ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config,
    resolve_config_from, system_config_path,
};
pub use schema::{BcfConfig, ConfigPatch};
