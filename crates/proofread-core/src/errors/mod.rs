use std::fmt::{Display, Formatter};

/// Fatal configuration problems. Raised before any experiment executes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: unknown experiment(s) {}; available: {}", .unknown.join(", "), .available.join(", "))]
    UnknownExperiment {
        unknown: Vec<String>,
        available: Vec<String>,
    },
    #[error("manifest not found: {path}")]
    ManifestNotFound { path: String },
    #[error("config error: failed to parse manifest {path}: {detail}")]
    ManifestParse { path: String, detail: String },
    #[error("config error: failed to read settings {path}: {detail}")]
    SettingsRead { path: String, detail: String },
    #[error("config error: failed to parse YAML settings {path}: {detail}")]
    SettingsParse { path: String, detail: String },
    #[error("config error: unsupported settings version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error(
        "config error: {count} translations in '{document}' match {condition}; expected exactly one"
    )]
    AmbiguousTranslation {
        document: String,
        condition: String,
        count: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgs(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    MissingConfig,
    ConfigParse,
    InvalidArgs,
    ProviderRateLimit,
    ProviderTimeout,
    ProviderServer,
    Network,
    JudgeUnavailable,
    ExperimentTimeout,
    Other,
}

impl RunErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunErrorKind::MissingConfig => "missing_config",
            RunErrorKind::ConfigParse => "config_parse",
            RunErrorKind::InvalidArgs => "invalid_args",
            RunErrorKind::ProviderRateLimit => "provider_rate_limit",
            RunErrorKind::ProviderTimeout => "provider_timeout",
            RunErrorKind::ProviderServer => "provider_server",
            RunErrorKind::Network => "network",
            RunErrorKind::JudgeUnavailable => "judge_unavailable",
            RunErrorKind::ExperimentTimeout => "experiment_timeout",
            RunErrorKind::Other => "other",
        }
    }
}

/// Classified failure of a scoring or generation call. Attached to failed results so
/// aggregation can branch on the kind instead of parsing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub provider: Option<String>,
    pub detail: Option<String>,
    /// True when kind was inferred from free-form message parsing.
    pub legacy_classified: bool,
}

impl RunError {
    pub fn new(kind: RunErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            provider: None,
            detail: None,
            legacy_classified: false,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Maps an HTTP error status from a model provider to a kind.
    pub fn from_status(status: u16, provider: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let kind = match status {
            429 => RunErrorKind::ProviderRateLimit,
            408 | 504 => RunErrorKind::ProviderTimeout,
            500..=599 => RunErrorKind::ProviderServer,
            _ => RunErrorKind::Other,
        };
        Self::new(kind, format!("{} returned status {}: {}", provider, status, detail))
            .with_status(status)
            .with_provider(provider)
            .with_detail(detail)
    }

    pub fn network(provider: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(
            RunErrorKind::Network,
            format!("network error calling {}: {}", provider, detail),
        )
        .with_provider(provider)
        .with_detail(detail)
    }

    pub fn judge_unavailable(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(RunErrorKind::JudgeUnavailable, format!("judge unavailable: {}", detail))
            .with_detail(detail)
    }

    pub fn experiment_timeout(experiment: &str, seconds: u64) -> Self {
        Self::new(
            RunErrorKind::ExperimentTimeout,
            format!("experiment '{}' timed out after {}s", experiment, seconds),
        )
    }

    pub fn classify_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let msg = message.to_lowercase();

        let kind = if msg.contains("config file not found") || msg.contains("manifest not found") {
            RunErrorKind::MissingConfig
        } else if msg.contains("invalid argument") {
            RunErrorKind::InvalidArgs
        } else if msg.contains("config error") || msg.contains("failed to parse yaml") {
            RunErrorKind::ConfigParse
        } else if msg.contains("rate limit") || msg.contains("429") {
            RunErrorKind::ProviderRateLimit
        } else if msg.contains("timed out") || msg.contains("timeout") {
            RunErrorKind::ProviderTimeout
        } else if msg.contains("500")
            || msg.contains("502")
            || msg.contains("503")
            || msg.contains("provider error")
        {
            RunErrorKind::ProviderServer
        } else if msg.contains("network") || msg.contains("connection") || msg.contains("dns") {
            RunErrorKind::Network
        } else if msg.contains("judge unavailable") || msg.contains("judge failed") {
            RunErrorKind::JudgeUnavailable
        } else {
            RunErrorKind::Other
        };

        let mut run_error = Self::new(kind, message);
        run_error.legacy_classified = true;
        run_error
    }

    /// Typed errors anywhere in the chain win; otherwise fall back to message parsing.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(run_error) = err.chain().find_map(|e| e.downcast_ref::<RunError>()) {
            return run_error.clone();
        }
        Self::classify_message(format!("{:#}", err))
    }
}

impl Display for RunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RunError, RunErrorKind};

    #[test]
    fn classify_message_maps_provider_errors() {
        assert_eq!(
            RunError::classify_message("HTTP 429 Too Many Requests").kind,
            RunErrorKind::ProviderRateLimit
        );
        assert_eq!(
            RunError::classify_message("operation timed out").kind,
            RunErrorKind::ProviderTimeout
        );
        assert_eq!(
            RunError::classify_message("connection refused").kind,
            RunErrorKind::Network
        );
        assert_eq!(
            RunError::classify_message("score missing").kind,
            RunErrorKind::Other
        );
    }

    #[test]
    fn from_anyhow_prefers_typed_error() {
        let typed = RunError::from_status(503, "ollama", "overloaded");
        let err = anyhow::Error::new(typed.clone()).context("scoring summary");
        let back = RunError::from_anyhow(&err);
        assert_eq!(back, typed);
        assert!(!back.legacy_classified);
        assert_eq!(back.kind, RunErrorKind::ProviderServer);
    }

    #[test]
    fn legacy_classification_is_explicitly_marked() {
        let err = anyhow::anyhow!("rate limit exceeded");
        let back = RunError::from_anyhow(&err);
        assert!(back.legacy_classified);
        assert_eq!(back.kind.as_str(), "provider_rate_limit");
    }

    #[test]
    fn unknown_experiment_message_lists_names() {
        let err = ConfigError::UnknownExperiment {
            unknown: vec!["bleu".into()],
            available: vec!["rouge_experiment".into(), "faithfulness".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bleu"));
        assert!(msg.contains("rouge_experiment, faithfulness"));
    }
}
