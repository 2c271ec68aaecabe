//! Common test utilities for bcf integration tests.
//!
//! Provides `TestEnv` for isolated CLI runs that never read the user's own
//! `~/.config/bcf/config.kdl`, plus helpers for building archives by hand.

#![allow(dead_code)]

use assert_cmd::Command;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with an isolated working and config directory.
///
/// The `bcf()` method returns a `Command` that points `XDG_CONFIG_HOME` and
/// `HOME` at the private config directory and clears `BCF_CONFIG`, making
/// tests parallel-safe.
pub struct TestEnv {
    pub work_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the bcf binary running inside the work directory.
    pub fn bcf(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bcf"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.config_dir.path());
        cmd.env("HOME", self.config_dir.path());
        cmd.env_remove("BCF_CONFIG");
        cmd.env_remove("BCF_LOG");
        cmd
    }

    /// Path of a file inside the work directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.path().join(name)
    }

    /// Write a KDL config file into the work directory and return its path.
    pub fn write_config(&self, name: &str, kdl: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, kdl).unwrap();
        path
    }

    /// Write raw bytes into the work directory and return the path.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a zip archive from `(name, contents)` pairs.
pub fn zip_of(files: &[(&str, &str)]) -> Vec<u8> {
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Names of every entry in a zip archive.
pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Contents of one zip entry as text.
pub fn read_entry(bytes: &[u8], name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

/// A `bcf.version` document.
pub fn version_xml(version: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Version VersionId="{}"></Version>"#,
        version
    )
}

/// Read a file produced by the CLI.
pub fn read_bytes(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
