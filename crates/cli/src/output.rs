//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use vehicle_profiles::{BuildSummary, CheckReport, CompileError, ValidationFailure};

use crate::error::CliError;

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

fn validation_failures(error: &Error) -> Option<&[ValidationFailure]> {
    match error.downcast_ref::<CompileError>() {
        Some(CompileError::SchemaValidation { failures }) => Some(failures.as_slice()),
        _ => None,
    }
}

fn stale_outputs(error: &Error) -> Option<&[PathBuf]> {
    match error.downcast_ref::<CliError>() {
        Some(CliError::OutOfDate(paths)) => Some(paths.as_slice()),
        None => None,
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let failures = validation_failures(error).map(|failures| {
        failures
            .iter()
            .map(|f| json!({"path": f.path, "errors": f.errors}))
            .collect::<Vec<_>>()
    });
    let mut body = json!({
        "message": error.to_string(),
        "code": crate::error::exit_code(error),
    });
    if let Some(failures) = failures {
        body["failures"] = json!(failures);
    }
    if let Some(stale) = stale_outputs(error) {
        body["stale"] = json!(stale);
    }
    print_json(&json!({
        "success": false,
        "error": body,
    }));
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    if let Some(failures) = validation_failures(error) {
        for failure in failures {
            eprintln!("  {}", failure.path.display().to_string().bold());
            for message in &failure.errors {
                eprintln!("    {} {}", "•".red(), message);
            }
        }
    }

    // Print error chain if available
    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn print_written(paths: &[PathBuf]) {
    for path in paths {
        println!("  {} {}", "wrote".dimmed(), path.display());
    }
}

/// Print the result of a full build
pub fn print_build_summary(summary: &BuildSummary, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "profiles": summary.profiles,
            "documented": summary.documented,
            "schema_updated": summary.schema_updated,
            "written": summary.written,
        }));
        return;
    }

    println!(
        "{} Compiled {} profiles ({} listed in docs)",
        "✓".green(),
        summary.profiles.to_string().bold(),
        summary.documented
    );
    print_written(&summary.written);
    if summary.schema_updated {
        println!("  {}", "schema parameter enumeration updated".yellow());
    }
}

/// Print the result of compiling without schema work
pub fn print_compile_summary(profiles: usize, written: &[PathBuf], json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "profiles": profiles,
            "written": written,
        }));
        return;
    }

    println!("{} Compiled {} profiles", "✓".green(), profiles.to_string().bold());
    print_written(written);
}

/// Print the result of a successful validation
pub fn print_validation_success(fragments: usize, json: bool) {
    if json {
        print_json(&json!({"success": true, "fragments": fragments}));
    } else {
        println!("{} All {} fragments are valid", "✓".green(), fragments);
    }
}

/// Print the result of a schema sync
pub fn print_schema_sync(path: &Path, updated: bool, json: bool) {
    if json {
        print_json(&json!({"success": true, "schema": path, "updated": updated}));
    } else if updated {
        println!("{} Updated {}", "✓".green(), path.display());
    } else {
        println!("{} {} already current", "✓".green(), path.display());
    }
}

/// Print the result of a drift check
pub fn print_check_report(report: &CheckReport, json: bool) {
    if json {
        // Failures are reported through the error path
        if report.is_current() {
            print_json(&json!({"success": true, "stale": report.stale}));
        }
        return;
    }

    if report.is_current() {
        println!("{} All outputs are up to date", "✓".green());
        return;
    }
    for path in &report.stale {
        println!("  {} {}", "stale".red(), path.display());
    }
}
