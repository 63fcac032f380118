//! Reader configuration management

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::models::{ReaderError, ReaderResult};
use crate::parsers::csv_parser::ParserOptions;
use crate::utils::encoding::{is_known_label, DEFAULT_ENCODING};
use crate::utils::validation::accept_entries;

/// Default accepted-types string
pub const DEFAULT_ACCEPT: &str = ".csv, text/csv";

/// Serializable part of the reader's construction parameters
///
/// Callbacks and pass-through attributes are construction-time only and
/// live on the builder instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    /// Accept filter of the control, also the strict-mode reference string
    pub accept: String,
    /// Encoding label used to decode the file (`auto` to detect)
    pub encoding: String,
    /// Reject files whose declared type is not in `accept`
    pub strict: bool,
    pub parser_options: ParserOptions,
    /// Drop completions superseded by a newer selection
    pub latest_only: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            accept: DEFAULT_ACCEPT.to_string(),
            encoding: DEFAULT_ENCODING.to_string(),
            strict: false,
            parser_options: ParserOptions::default(),
            latest_only: false,
        }
    }
}

impl ReaderSettings {
    /// Validate settings before use
    ///
    /// Any accept string is allowed; an empty one leaves the control
    /// unfiltered. Unknown encoding labels are allowed too and decode as
    /// UTF-8.
    pub fn validate(&self) -> ReaderResult<()> {
        if accept_entries(&self.accept).is_empty() {
            tracing::debug!("Accept filter is empty, the control will not filter files");
        }

        if !is_known_label(&self.encoding) {
            tracing::warn!(
                "Unknown encoding label '{}', files will be decoded as UTF-8",
                self.encoding
            );
        }

        self.parser_options
            .validate()
            .map_err(|e| ReaderError::Config(format!("Invalid parser options: {e}")))
    }

    /// Load settings from a JSON file
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        let settings = Self::import(&content)
            .with_context(|| format!("Invalid settings file: {:?}", path))?;

        tracing::info!("Loaded reader settings from: {:?}", path);
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        std::fs::write(path, self.export()?)
            .with_context(|| format!("Failed to write settings file: {:?}", path))?;

        tracing::info!("Saved reader settings to: {:?}", path);
        Ok(())
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let loaded = Self::default_path().and_then(|path| {
            if path.exists() {
                Self::load_from(&path).map(Some)
            } else {
                Ok(None)
            }
        });

        match loaded {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(err) => {
                tracing::warn!("Failed to load reader settings: {:#}. Using defaults", err);
                Self::default()
            }
        }
    }

    /// Get the path to the default settings file
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "csvreaderinput", "csv-reader-input")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("settings.json"))
    }

    /// Export settings as JSON string
    pub fn export(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export settings")
    }

    /// Import settings from JSON string
    pub fn import(json: &str) -> anyhow::Result<Self> {
        let settings: ReaderSettings =
            serde_json::from_str(json).with_context(|| "Failed to parse settings")?;

        settings
            .validate()
            .with_context(|| "Imported settings are invalid")?;

        Ok(settings)
    }
}
