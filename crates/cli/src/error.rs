//! Error types and exit codes for the profilec CLI

use std::path::PathBuf;
use thiserror::Error;
use vehicle_profiles::CompileError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{} output(s) out of date; run `profilec build`", .0.len())]
    OutOfDate(Vec<PathBuf>),
}

/// Process exit code for a failed command
pub fn exit_code(error: &anyhow::Error) -> u8 {
    if let Some(CliError::OutOfDate(_)) = error.downcast_ref::<CliError>() {
        return 2;
    }

    match error.downcast_ref::<CompileError>() {
        Some(CompileError::DocumentTarget { .. }) => 3,
        Some(
            CompileError::SchemaValidation { .. }
            | CompileError::Json { .. }
            | CompileError::InvalidFragment { .. }
            | CompileError::ParameterLibrary { .. },
        ) => 4,
        Some(e) if e.is_inheritance_error() => 5,
        Some(CompileError::UnknownParameter { .. }) => 6,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn drift_exits_with_two() {
        let error = anyhow::Error::new(CliError::OutOfDate(vec![PathBuf::from("a.json")]));
        assert_eq!(exit_code(&error), 2);
    }

    #[test]
    fn library_errors_map_through_context() -> TestResult {
        let unknown: anyhow::Result<()> = Err(CompileError::UnknownParameter {
            fragment: PathBuf::from("ev/kona.json"),
            parameter: "SOH".to_string(),
        })
        .context("Build failed");
        let Err(error) = unknown else {
            return Err("context should keep the library error".into());
        };
        assert_eq!(exit_code(&error), 6);
        Ok(())
    }

    #[test]
    fn inheritance_and_validation_codes() {
        let cycle = anyhow::Error::new(CompileError::CyclicInheritance {
            chain: "a.json -> a.json".to_string(),
        });
        assert_eq!(exit_code(&cycle), 5);

        let validation = anyhow::Error::new(CompileError::SchemaValidation { failures: Vec::new() });
        assert_eq!(exit_code(&validation), 4);

        let target = anyhow::Error::new(CompileError::DocumentTarget {
            pattern: "x".to_string(),
            root: PathBuf::from("docs"),
            found: 2,
        });
        assert_eq!(exit_code(&target), 3);

        let config = anyhow::Error::new(CompileError::Config("bad".to_string()));
        assert_eq!(exit_code(&config), 1);
    }
}
