//! CLI command implementations.

mod display;

pub mod plan;
pub mod schema;
pub mod validate;

/// Exit status for a failed command.
///
/// Library errors keep their own code through any added context; anything
/// else is a generic failure.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<waveplan::Error>()
        .map_or(1, waveplan::Error::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use waveplan::{Error, GraphIntegrityError};

    #[test]
    fn exit_code_survives_context() {
        let result: anyhow::Result<()> = Err(Error::from(GraphIntegrityError::SelfLoop {
            module: "a.py".to_string(),
        }))
        .context("failed to build plan");

        assert_eq!(exit_code(&result.unwrap_err()), 2);
    }

    #[test]
    fn foreign_errors_exit_with_one() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
