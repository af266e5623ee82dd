//! Process exit codes. These are part of the CLI contract.

use proofread_core::errors::{ConfigError, RunError, RunErrorKind};

pub const SUCCESS: i32 = 0; // Includes runs where some experiments failed
pub const CONFIG_ERROR: i32 = 2; // Unknown experiment, bad settings/manifest, invalid arguments
pub const INFRA_ERROR: i32 = 3; // Source files unreadable, output not writable

/// Maps a fatal error to its exit code.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_ERROR;
    }
    match err.downcast_ref::<RunError>().map(|e| e.kind) {
        Some(RunErrorKind::MissingConfig | RunErrorKind::ConfigParse | RunErrorKind::InvalidArgs) => {
            CONFIG_ERROR
        }
        _ => INFRA_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_survive_context() {
        let err = Err::<(), _>(ConfigError::InvalidArgs("parallel must be at least 1".into()))
            .context("evaluate")
            .unwrap_err();
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn other_errors_are_infrastructure() {
        assert_eq!(for_error(&anyhow::anyhow!("disk full")), INFRA_ERROR);
        let judge = anyhow::Error::new(RunError::judge_unavailable("no key"));
        assert_eq!(for_error(&judge), INFRA_ERROR);
    }
}
