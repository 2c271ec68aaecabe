//! bcf-topics - BCF (BIM Collaboration Format) topics for BIM viewers.
//!
//! This library provides the BCF data model and the BCF-zip pipeline used by
//! the `bcf` CLI tool, including topic and comment management, vocabulary
//! validation, viewpoint association, and import/export for BCF 2.1 and 3.

pub mod archive;
pub mod cli;
pub mod commands;
pub mod config;
pub mod events;
pub mod models;
pub mod topics;
pub mod viewpoints;
pub mod xml;

pub use archive::{ImportOutcome, ImportWarning};
pub use config::{BcfConfig, ConfigPatch};
pub use models::{Assignment, Comment, SchemaVersion, Topic, TopicField, TopicInput};
pub use topics::BcfTopics;
pub use viewpoints::{
    MemoryViewpointStore, ViewProvider, Viewpoint, ViewpointCamera, ViewpointSeed,
    ViewpointStore,
};


/// Library-level error type for BCF operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("BCF version {0} is not supported")]
    UnsupportedVersion(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for BCF operations.
pub type Result<T> = std::result::Result<T, Error>;
