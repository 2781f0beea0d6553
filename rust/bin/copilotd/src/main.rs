//! `copilotd` — the renewal copilot server binary.
//!
//! Usage:
//!   copilotd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/copilot/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use copilot_connector::graph::{
    GraphCalendarConnector, GraphMailConnector, GraphSettings, TeamsChatConnector,
};
use copilot_connector::salesforce::{SalesforceConnector, SalesforceSettings};
use copilot_connector::{Connector, CrmConnector, fixture};
use copilot_core::Module;
use copilot_genai::fixture::NullGenerator;
use copilot_genai::{GeminiClient, TextGenerator};
use copilot_renewal::{RenewalModule, RenewalService};

use config::ServerConfig;

/// Renewal copilot server.
#[derive(Parser, Debug)]
#[command(name = "copilotd", about = "Renewal copilot server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides the config file).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    // Verify configuration is valid.
    bootstrap::verify_config(&server_config)?;

    let listen = cli.listen.unwrap_or_else(|| server_config.server.listen.clone());
    let service_config = copilot_core::ServiceConfig {
        listen: listen.clone(),
        fetch_deadline_ms: server_config.server.fetch_deadline_ms,
        snippet_limit: server_config.server.snippet_limit,
        generation_timeout_ms: server_config.server.generation_timeout_ms,
    };

    // Wire connectors: live where configured, demo fixtures otherwise.
    let (crm, connectors) = build_connectors(&server_config);
    let generator = build_generator(&server_config);

    let renewal_service = RenewalService::new(
        crm,
        connectors,
        generator,
        server_config.scoring.to_config(),
        &service_config,
    )
    .map_err(|e| anyhow::anyhow!("cannot build renewal service: {e}"))?;
    let renewal_module = RenewalModule::new(Arc::new(renewal_service));
    info!("Renewal module initialized");

    let module_routes = vec![(renewal_module.name(), renewal_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("Copilot server listening on {}", listen);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_connectors(config: &ServerConfig) -> (Arc<dyn CrmConnector>, Vec<Arc<dyn Connector>>) {
    if config.connectors.demo {
        info!("Demo mode: serving the built-in book of business");
        let crm: Arc<dyn CrmConnector> = Arc::new(fixture::StaticCrm::demo());
        let connectors: Vec<Arc<dyn Connector>> = vec![
            Arc::new(fixture::StaticConnector::new("graph_mail", fixture::demo_mail_snippets())),
            Arc::new(fixture::StaticConnector::new(
                "graph_calendar",
                fixture::demo_meeting_snippets(),
            )),
            Arc::new(fixture::StaticConnector::new("teams_chat", fixture::demo_chat_snippets())),
        ];
        return (crm, connectors);
    }

    // verify_config guarantees the Salesforce section is present here.
    let sf = config.connectors.salesforce.clone().unwrap_or_default();
    let crm: Arc<dyn CrmConnector> = Arc::new(SalesforceConnector::new(SalesforceSettings {
        access_token: sf.access_token,
        instance_url: sf.instance_url,
    }));
    info!("Salesforce CRM connector configured");

    let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();
    if let Some(ms) = &config.connectors.microsoft {
        let settings = GraphSettings {
            access_token: Some(ms.access_token.clone()),
            api_base: None,
        };
        connectors.push(Arc::new(GraphMailConnector::new(settings.clone())));
        connectors.push(Arc::new(GraphCalendarConnector::new(settings.clone())));
        connectors.push(Arc::new(TeamsChatConnector::new(settings)));
        info!("Microsoft Graph connectors configured");
    }
    (crm, connectors)
}

fn build_generator(config: &ServerConfig) -> Arc<dyn TextGenerator> {
    if config.genai.enabled {
        info!(model = %config.genai.model, "Gemini generation enabled");
        Arc::new(GeminiClient::new(config.genai.api_key.clone(), config.genai.model.clone()))
    } else {
        info!("Generation disabled, templated briefs and explanations only");
        Arc::new(NullGenerator)
    }
}
