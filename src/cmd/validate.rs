//! `broadcaster validate`: check a caches file without starting.
//!
//! Parses and validates the file, reporting in human-readable text or
//! machine-readable JSON.

use std::path::Path;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::Config;
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::{BroadcasterError, ValidationError};

pub fn execute(args: &ValidateArgs) -> Result<(), BroadcasterError> {
    let path = &args.config;
    let config = read_config(path)?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => println!("{}", failure_json(&errors)),
        }
        return Err(BroadcasterError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => println!(
            "\u{2713} {}",
            validation::format_validation_report(&path.display().to_string(), &config)
        ),
        ValidateFormat::Json => println!("{}", success_json(&config)),
    }

    Ok(())
}

fn read_config(path: &Path) -> Result<Config, BroadcasterError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BroadcasterError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_config_str(ext, &content, &path.display().to_string())
}

fn success_json(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "valid": true,
        "groups": config.groups.len(),
        "caches": config.total_caches(),
    })
}

fn failure_json(errors: &[ValidationError]) -> serde_json::Value {
    let errors: Vec<serde_json::Value> = errors
        .iter()
        .map(|e| {
            serde_json::json!({
                "group": e.group,
                "field": e.field,
                "message": e.message,
                "suggestion": e.suggestion,
            })
        })
        .collect();
    serde_json::json!({ "valid": false, "errors": errors })
}
