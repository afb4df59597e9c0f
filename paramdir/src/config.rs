use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ParameterError, env_utils::EnvVar};

pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 4 << 30;

fn default_container_extensions() -> Vec<String> {
    vec![".h5".to_string()]
}

fn default_archive_extensions() -> Vec<String> {
    vec![".nnp".to_string()]
}

fn default_max_payload_bytes() -> u64 {
    DEFAULT_MAX_PAYLOAD_BYTES
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PersistenceConfig {
    /// File suffixes routed to the container codec. Anything else is proto.
    #[serde(default = "default_container_extensions")]
    pub container_extensions: Vec<String>,
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
    /// Upper bound on a single decoded payload.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            container_extensions: default_container_extensions(),
            archive_extensions: default_archive_extensions(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn has_suffix(
    path: &Path,
    extensions: &[String],
) -> bool {
    let Some(file_name) = path.file_name() else {
        return false;
    };
    let file_name = file_name.to_string_lossy().to_ascii_lowercase();
    extensions
        .iter()
        .any(|extension| file_name.ends_with(&extension.to_ascii_lowercase()))
}

impl PersistenceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        serde_json::from_str(json).map_err(|err| ParameterError::Config(err.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ParameterError> {
        let json =
            std::fs::read_to_string(path).map_err(|err| ParameterError::io(path, err))?;
        Self::from_json_str(&json)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        let extensions = EnvVar::ContainerExtensions;
        if extensions.is_set() {
            self.container_extensions = extensions.list();
        }

        let max_payload = EnvVar::MaxPayloadBytes;
        if max_payload.is_set() {
            match max_payload.value().trim().parse::<u64>() {
                Ok(value) => self.max_payload_bytes = value,
                Err(_) => log::warn!(
                    "Ignoring {}={:?}: not a byte count",
                    max_payload.key(),
                    max_payload.value()
                ),
            }
        }
        self
    }

    pub fn is_container_path(
        &self,
        path: &Path,
    ) -> bool {
        has_suffix(path, &self.container_extensions)
    }

    pub fn is_archive_path(
        &self,
        path: &Path,
    ) -> bool {
        has_suffix(path, &self.archive_extensions)
    }
}
