//! Startup checks. A misconfigured server refuses to start rather than
//! failing on the first request.

use crate::config::ServerConfig;

/// Verify the configuration is usable before binding the listener.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    config.scoring.to_config().validate()?;

    if config.server.fetch_deadline_ms == 0 {
        anyhow::bail!("server.fetch_deadline_ms must be positive");
    }
    if config.server.generation_timeout_ms == 0 {
        anyhow::bail!("server.generation_timeout_ms must be positive");
    }
    if config.server.snippet_limit == 0 {
        anyhow::bail!("server.snippet_limit must be positive");
    }

    if !config.connectors.demo {
        let sf = config
            .connectors
            .salesforce
            .as_ref()
            .filter(|s| !s.access_token.is_empty() && !s.instance_url.is_empty());
        if sf.is_none() {
            anyhow::bail!(
                "No CRM configured.\n\
                 Set connectors.demo = true or configure [connectors.salesforce] \
                 with access_token and instance_url."
            );
        }
    }

    if config.genai.enabled && config.genai.api_key.is_empty() {
        anyhow::bail!("genai.enabled is set but genai.api_key is empty");
    }

    Ok(())
}
