//! Server configuration loaded from a TOML context file.
//!
//! Every section and field has a working default: an empty file gives a
//! demo-mode server with no live connectors and generation disabled.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use copilot_renewal::ScoringConfig;
use copilot_renewal::model::ScoreWeights;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub scoring: ScoringSection,
    pub connectors: ConnectorsSection,
    pub genai: GenaiSection,
}

impl ServerConfig {
    /// Resolve a context name to `/etc/copilot/<name>.toml`. A value
    /// containing `/` or `.` is treated as a literal path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/copilot/{name_or_path}.toml"))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen: String,
    pub fetch_deadline_ms: u64,
    pub snippet_limit: usize,
    pub generation_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        let d = copilot_core::ServiceConfig::default();
        Self {
            listen: d.listen,
            fetch_deadline_ms: d.fetch_deadline_ms,
            snippet_limit: d.snippet_limit,
            generation_timeout_ms: d.generation_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub premium_weight: f64,
    pub urgency_weight: f64,
    pub claims_weight: f64,
    pub premium_cap: f64,
    pub claims_cap: f64,
    pub urgency_horizon_days: u32,
    pub urgency_decay: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        let d = ScoringConfig::default();
        Self {
            premium_weight: d.weights.premium,
            urgency_weight: d.weights.urgency,
            claims_weight: d.weights.claims,
            premium_cap: d.premium_cap,
            claims_cap: d.claims_cap,
            urgency_horizon_days: d.urgency_horizon_days,
            urgency_decay: d.urgency_decay,
        }
    }
}

impl ScoringSection {
    pub fn to_config(&self) -> ScoringConfig {
        ScoringConfig {
            weights: ScoreWeights {
                premium: self.premium_weight,
                urgency: self.urgency_weight,
                claims: self.claims_weight,
            },
            premium_cap: self.premium_cap,
            claims_cap: self.claims_cap,
            urgency_horizon_days: self.urgency_horizon_days,
            urgency_decay: self.urgency_decay,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectorsSection {
    /// Serve the built-in demo book of business instead of live
    /// connectors.
    pub demo: bool,
    pub salesforce: Option<SalesforceSection>,
    pub microsoft: Option<MicrosoftSection>,
}

impl Default for ConnectorsSection {
    fn default() -> Self {
        Self { demo: true, salesforce: None, microsoft: None }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SalesforceSection {
    pub access_token: String,
    pub instance_url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MicrosoftSection {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenaiSection {
    pub enabled: bool,
    pub api_key: String,
    pub model: String,
}

impl Default for GenaiSection {
    fn default() -> Self {
        Self { enabled: false, api_key: String::new(), model: "gemini-2.0-flash".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_demo_mode() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert!(config.connectors.demo);
        assert!(!config.genai.enabled);
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert!(config.scoring.to_config().validate().is_ok());
    }

    #[test]
    fn sections_parse() {
        let config: ServerConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:9090"
            fetch_deadline_ms = 1500

            [scoring]
            premium_weight = 0.5
            urgency_weight = 0.35
            claims_weight = 0.15

            [connectors]
            demo = false

            [connectors.salesforce]
            access_token = "tok"
            instance_url = "https://example.my.salesforce.com"

            [genai]
            enabled = true
            api_key = "key"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9090");
        assert_eq!(config.server.fetch_deadline_ms, 1500);
        assert_eq!(config.scoring.to_config().weights.premium, 0.5);
        assert!(!config.connectors.demo);
        assert_eq!(config.connectors.salesforce.unwrap().access_token, "tok");
        assert_eq!(config.genai.model, "gemini-2.0-flash");
    }

    #[test]
    fn resolve_path_name_vs_path() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/copilot/prod.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./local.toml"),
            PathBuf::from("./local.toml")
        );
    }
}
