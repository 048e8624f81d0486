//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as missing groups, duplicate or empty names, malformed
//! cache addresses, and a cache name bound to two different addresses.
//! Returns every [`ValidationError`] found, with suggestions where one
//! is obvious.

use std::collections::{HashMap, HashSet};

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate a single cache address. Returns `Ok(())` or a human-readable error.
pub fn validate_address(address: &str) -> Result<(), String> {
    match Url::parse(address) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{address}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.groups.is_empty() {
        errors.push(ValidationError {
            group: "(root)".into(),
            field: "groups".into(),
            message: "at least one group must be defined".into(),
            suggestion: None,
        });
        return Err(errors);
    }

    let mut seen_groups = HashSet::new();
    // cache name -> address it was first declared with
    let mut addresses: HashMap<&str, &str> = HashMap::new();

    for (i, group) in config.groups.iter().enumerate() {
        let group_id = if group.name.is_empty() {
            format!("groups[{i}]")
        } else {
            group.name.clone()
        };

        if group.name.trim().is_empty() {
            errors.push(ValidationError {
                group: group_id.clone(),
                field: "name".into(),
                message: "group name cannot be empty".into(),
                suggestion: None,
            });
        } else if !seen_groups.insert(group.name.as_str()) {
            errors.push(ValidationError {
                group: group_id.clone(),
                field: "name".into(),
                message: "duplicate group name".into(),
                suggestion: Some("merge the caches into a single group".into()),
            });
        }

        for (j, cache) in group.caches.iter().enumerate() {
            if cache.name.trim().is_empty() {
                errors.push(ValidationError {
                    group: group_id.clone(),
                    field: format!("caches[{j}].name"),
                    message: "cache name cannot be empty".into(),
                    suggestion: None,
                });
                continue;
            }

            if let Err(msg) = validate_address(&cache.address) {
                let suggestion = (!cache.address.contains("://"))
                    .then(|| format!("did you mean 'http://{}'?", cache.address));
                errors.push(ValidationError {
                    group: group_id.clone(),
                    field: format!("caches.{}.address", cache.name),
                    message: msg,
                    suggestion,
                });
                continue;
            }

            match addresses.get(cache.name.as_str()) {
                Some(known) if *known != cache.address => {
                    errors.push(ValidationError {
                        group: group_id.clone(),
                        field: format!("caches.{}.address", cache.name),
                        message: format!(
                            "cache '{}' is already declared with address '{known}'",
                            cache.name
                        ),
                        suggestion: Some("give the cache a distinct name".into()),
                    });
                }
                Some(_) => {}
                None => {
                    addresses.insert(&cache.name, &cache.address);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} groups, {} caches\n",
        config.groups.len(),
        config.total_caches()
    )];

    for group in &config.groups {
        lines.push(format!("  {}  -> {} caches", group.name, group.caches.len()));
        for cache in &group.caches {
            lines.push(format!("    {}: {}", cache.name, cache.address));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
