use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which held modifier turns a secondary click into a toggle instead of a replace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToggleModifier {
    /// Control, or Command on macOS keyboards.
    #[default]
    CtrlOrMeta,
    Shift,
    Alt,
}

/// How the authority treats several proposers holding targets for the same participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorshipPolicy {
    /// A non-empty commit clears every other proposer of that participant.
    #[default]
    Exclusive,
    /// Proposers are independent; rendering shows the first non-empty one.
    Shared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetsConfig {
    /// Let players also see connections of their other, non-active participants.
    pub show_owned_persistent: bool,
    /// Mirror target sets into the host's own per-client target marking.
    pub sync_native_targets: bool,
    pub toggle_modifier: ToggleModifier,
    pub authorship: AuthorshipPolicy,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            show_owned_persistent: false,
            sync_native_targets: true,
            toggle_modifier: ToggleModifier::default(),
            authorship: AuthorshipPolicy::default(),
        }
    }
}

impl TargetsConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
