//! CLI argument definitions and output formatting for iniconf.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::ini::IniValueInfo;

/// iniconf - inspect and edit layered ini configuration files.
///
/// Values are merged from `{name}-defaults.ini`, `{name}.ini` and
/// `{name}-constants.ini`; edits are written to `{name}.ini` only.
#[derive(Parser, Debug)]
#[command(name = "iniconf")]
#[command(author, version, about = "Inspect and edit layered ini configuration files", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Directory holding the ini files
    #[arg(short = 'd', long = "dir", global = true, env = "INICONF_DIR")]
    pub dir: Option<PathBuf>,

    /// Base name of the ini files (without extension)
    #[arg(short = 'n', long = "name", global = true, env = "INICONF_NAME", default_value = "settings")]
    pub name: String,

    /// Application name, used for the default directory and remote commands
    #[arg(short = 'a', long = "app", global = true, env = "INICONF_APP", default_value = "iniconf")]
    pub application: String,

    /// Enable debug logging on stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show merged values of all sections, or of one section
    Show {
        /// Section name
        section: Option<String>,
    },

    /// Print one value
    Get {
        /// Section name
        section: String,
        /// Key name
        key: String,
    },

    /// Set a value and save the file
    Set {
        /// Section name
        section: String,
        /// Key name
        key: String,
        /// New value
        value: String,
    },

    /// Remove values from the user file so defaults apply again
    Reset {
        /// Section name
        section: String,
        /// Key name; all keys of the section when omitted
        key: Option<String>,
    },

    /// Run a remote command path, e.g. `set/app/settings/Core/Name/Robin`
    Exec {
        /// Command path of the form command/application/file/section/property[/value]?query
        path: String,
    },
}

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Values returned by `show`, `get`, `set`, `reset` and `exec`.
#[derive(Debug, Serialize)]
pub struct ValuesResult {
    pub file: String,
    pub values: Vec<IniValueInfo>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub saved: bool,
}

impl Output for ValuesResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        let mut current: Option<&str> = None;
        for value in &self.values {
            if current != Some(value.section.as_str()) {
                if current.is_some() {
                    lines.push(String::new());
                }
                lines.push(format!("[{}]", value.section));
                current = Some(value.section.as_str());
            }
            let mut line = format!("  {} = {}", value.ini_key, value.text);
            if value.write_protected {
                line.push_str("  (constant)");
            }
            lines.push(line);
        }
        if self.values.is_empty() {
            lines.push("No values.".to_string());
        }
        if self.saved {
            lines.push(String::new());
            lines.push(format!("Saved {}", self.file));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn info(section: &str, key: &str, text: &str, protected: bool) -> IniValueInfo {
        IniValueInfo {
            section: section.to_string(),
            property: key.to_string(),
            ini_key: key.to_string(),
            value_type: "text".to_string(),
            value: Value::Text(text.to_string()),
            text: text.to_string(),
            default: None,
            description: None,
            write_protected: protected,
            write_needed: true,
        }
    }

    #[test]
    fn test_human_output_groups_sections() {
        let result = ValuesResult {
            file: "app.ini".to_string(),
            values: vec![
                info("A", "x", "1", false),
                info("A", "y", "2", true),
                info("B", "z", "3", false),
            ],
            saved: true,
        };
        assert_eq!(
            result.to_human(),
            "[A]\n  x = 1\n  y = 2  (constant)\n\n[B]\n  z = 3\n\nSaved app.ini"
        );
    }

    #[test]
    fn test_json_output_omits_unsaved_flag() {
        let result = ValuesResult {
            file: "app.ini".to_string(),
            values: vec![info("A", "x", "1", false)],
            saved: false,
        };
        let json: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(json["values"][0]["text"], "1");
        assert!(json.get("saved").is_none());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["iniconf", "-H", "--dir", "/tmp", "get", "Core", "Name"])
            .unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp")));
        assert!(matches!(cli.command, Commands::Get { .. }));
    }
}
