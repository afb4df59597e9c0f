#[derive(Copy, Clone, Debug)]
pub enum EnvVar {
    ContainerExtensions,
    MaxPayloadBytes,
}

impl EnvVar {
    pub fn key(&self) -> &'static str {
        match self {
            EnvVar::ContainerExtensions => "PARAMDIR_CONTAINER_EXTENSIONS",
            EnvVar::MaxPayloadBytes => "PARAMDIR_MAX_PAYLOAD_BYTES",
        }
    }

    pub fn value(&self) -> String {
        std::env::var(self.key()).unwrap_or_default()
    }

    pub fn is_set(&self) -> bool {
        !self.value().trim().is_empty()
    }

    /// Comma-separated list, trimmed, empty items dropped.
    pub fn list(&self) -> Vec<String> {
        self.value()
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}
