use crate::{Error, Result};

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMode {
    /// HTTP bridge running next to a logged-in trading terminal.
    Bridge { url: String, token: Option<String> },
    /// Recorded bars from a JSON fixture file.
    Replay { path: String },
}

impl std::fmt::Display for TerminalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalMode::Bridge { .. } => write!(f, "bridge"),
            TerminalMode::Replay { .. } => write!(f, "replay"),
        }
    }
}

pub const DEFAULT_SCANNER_CONFIG_PATH: &str = "config/scanner.toml";

/// Deployment settings loaded from environment variables at startup.
/// Scanner parameters (pairs, thresholds, weights) live in the TOML file
/// pointed to by `scanner_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    pub terminal: TerminalMode,
    pub scanner_config_path: String,
    /// Whether `scanner_config_path` was set rather than defaulted.
    pub scanner_config_explicit: bool,
}

impl Config {
    /// Load configuration from environment variables, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&[])
    }

    /// Like `from_env`, but `overrides` take precedence over the environment.
    /// Lets command-line flags stand in for variables.
    pub fn from_env_with(overrides: &[(&str, String)]) -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| {
            overrides
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// Build from an arbitrary key lookup. Used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("TERMINAL_MODE").unwrap_or_else(|| "bridge".to_string());

        let terminal = match mode.trim().to_lowercase().as_str() {
            "bridge" => TerminalMode::Bridge {
                url: required(&lookup, "TERMINAL_URL")?,
                token: lookup("TERMINAL_TOKEN").filter(|t| !t.trim().is_empty()),
            },
            "replay" => TerminalMode::Replay {
                path: required(&lookup, "REPLAY_PATH")?,
            },
            other => {
                return Err(Error::Config(format!(
                    "TERMINAL_MODE must be 'bridge' or 'replay', got: '{other}'"
                )))
            }
        };

        let scanner_config_path =
            lookup("SCANNER_CONFIG_PATH").filter(|p| !p.trim().is_empty());
        Ok(Config {
            terminal,
            scanner_config_explicit: scanner_config_path.is_some(),
            scanner_config_path: scanner_config_path
                .unwrap_or_else(|| DEFAULT_SCANNER_CONFIG_PATH.to_string()),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn bridge_is_the_default_mode() {
        let cfg = Config::from_lookup(lookup(&[("TERMINAL_URL", "http://127.0.0.1:8228")]))
            .unwrap();
        assert_eq!(
            cfg.terminal,
            TerminalMode::Bridge {
                url: "http://127.0.0.1:8228".into(),
                token: None
            }
        );
        assert_eq!(cfg.scanner_config_path, "config/scanner.toml");
        assert!(!cfg.scanner_config_explicit);
    }

    #[test]
    fn bridge_requires_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("TERMINAL_URL"));
    }

    #[test]
    fn replay_mode_reads_path() {
        let cfg = Config::from_lookup(lookup(&[
            ("TERMINAL_MODE", "Replay"),
            ("REPLAY_PATH", "fixtures/bars.json"),
            ("SCANNER_CONFIG_PATH", "/etc/fxscan.toml"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.terminal,
            TerminalMode::Replay {
                path: "fixtures/bars.json".into()
            }
        );
        assert_eq!(cfg.scanner_config_path, "/etc/fxscan.toml");
        assert!(cfg.scanner_config_explicit);
    }

    #[test]
    fn env_example_leaves_scanner_config_defaulted() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../.env.example");
        let vars: HashMap<String, String> = dotenvy::from_path_iter(path)
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        let cfg = Config::from_lookup(move |key| vars.get(key).cloned()).unwrap();
        assert_eq!(cfg.scanner_config_path, DEFAULT_SCANNER_CONFIG_PATH);
        assert!(!cfg.scanner_config_explicit);
    }

    #[test]
    fn overrides_beat_environment() {
        let cfg = Config::from_env_with(&[
            ("TERMINAL_MODE", "replay".to_string()),
            ("REPLAY_PATH", "recorded.json".to_string()),
        ])
        .unwrap();
        assert_eq!(
            cfg.terminal,
            TerminalMode::Replay {
                path: "recorded.json".into()
            }
        );
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Config::from_lookup(lookup(&[("TERMINAL_MODE", "live")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
