//! `broadcaster init`: write a starter caches file.
//!
//! Emits YAML, JSON or TOML, either minimal or with the format
//! documented inline. Refuses to overwrite an existing file.
//!
//! # Coming from an INI caches file
//!
//! The INI layout is not read. It maps one to one: each `[section]`
//! becomes a group and each `name = address` line a cache of it.
//!
//! ```ini
//! [europe]
//! varnish-eu-1 = http://10.0.1.10:6081
//! ```
//!
//! ```yaml
//! groups:
//!   - name: europe
//!     caches:
//!       - name: varnish-eu-1
//!         address: "http://10.0.1.10:6081"
//! ```
//!
//! A cache listed under several sections keeps one address everywhere;
//! `broadcaster validate` reports a name bound to two addresses.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::BroadcasterError;

pub fn execute(args: &InitArgs) -> Result<(), BroadcasterError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("broadcaster.{}", args.format.extension())));

    if output.exists() {
        return Err(BroadcasterError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

/// JSON has no comments, so `full` only changes YAML and TOML output.
#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, _) => JSON,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"groups:
  - name: default
    caches:
      - name: varnish-1
        address: "http://127.0.0.1:6081"
"#;

const YAML_FULL: &str = r#"# Broadcaster caches file.
#
# Requests carrying "X-Group: <name>" go to every cache of that group.
# Requests without the header go to every cache of every group.
# Send SIGHUP to reload this file without restarting.

groups:
  - name: europe                       # Matched against the group header, case-sensitive
    caches:
      - name: varnish-eu-1             # Key in the JSON response; keep it unique
        address: "http://10.0.1.10:6081"
      - name: varnish-eu-2
        address: "http://10.0.1.11:6081"

  # A cache may appear in several groups with the same address.
  # - name: america
  #   caches:
  #     - name: varnish-us-1
  #       address: "https://10.0.2.10:6443"

  # A group with no caches answers 204 No Content.
  # - name: staging
  #   caches: []
"#;

const JSON: &str = r#"{
  "groups": [
    {
      "name": "default",
      "caches": [
        { "name": "varnish-1", "address": "http://127.0.0.1:6081" }
      ]
    }
  ]
}
"#;

const TOML_MINIMAL: &str = r#"[[groups]]
name = "default"

[[groups.caches]]
name = "varnish-1"
address = "http://127.0.0.1:6081"
"#;

const TOML_FULL: &str = r#"# Broadcaster caches file.
#
# Requests carrying "X-Group: <name>" go to every cache of that group.
# Requests without the header go to every cache of every group.
# Send SIGHUP to reload this file without restarting.

[[groups]]
name = "europe"                        # Matched against the group header, case-sensitive

[[groups.caches]]
name = "varnish-eu-1"                  # Key in the JSON response; keep it unique
address = "http://10.0.1.10:6081"

[[groups.caches]]
name = "varnish-eu-2"
address = "http://10.0.1.11:6081"

# A cache may appear in several groups with the same address.
# [[groups]]
# name = "america"
#
# [[groups.caches]]
# name = "varnish-us-1"
# address = "https://10.0.2.10:6443"
"#;
