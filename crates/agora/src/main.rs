//! Agora hub server binary.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use agora_hub::{HubConfig, HubServer, JwtVerifier};
use agora_settings::{AgoraSettings, AuthSettings};
use anyhow::{Context, Result};
use clap::Parser;

/// Agora realtime hub.
#[derive(Parser, Debug)]
#[command(name = "agora", about = "Agora realtime presence and messaging hub")]
struct Cli {
    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings if specified).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.agora/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<AgoraSettings> {
        let settings = match &self.config {
            Some(path) => agora_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => agora_settings::load_settings().context("Failed to load settings")?,
        };
        Ok(settings)
    }

    fn hub_config(&self, settings: &AgoraSettings) -> HubConfig {
        let mut config = HubConfig::from_settings(settings);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

fn verifier(auth: &AuthSettings) -> Result<JwtVerifier> {
    let secret = auth
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("auth.jwtSecret is not set (or set AGORA_JWT_SECRET)")?;
    Ok(JwtVerifier::new(secret.as_bytes(), auth.leeway_secs))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    agora_logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let verifier = verifier(&settings.auth)?;
    let config = args.hub_config(&settings);
    let mut server =
        HubServer::new(config, Arc::new(verifier)).context("Invalid hub configuration")?;

    match agora_hub::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let handle = server.listen().await.context("Failed to start server")?;
    tracing::info!(addr = %handle.local_addr(), "agora hub listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    handle.stop().await.context("Server did not stop cleanly")?;
    tracing::info!("agora hub stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_settings() {
        let cli = Cli::parse_from(["agora"]);
        assert_eq!(cli.host, None);
        assert_eq!(cli.port, None);
        assert_eq!(cli.config, None);

        let config = cli.hub_config(&AgoraSettings::default());
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8090);
    }

    #[test]
    fn cli_overrides_host_and_port() {
        let cli = Cli::parse_from(["agora", "--host", "127.0.0.1", "--port", "0"]);
        let config = cli.hub_config(&AgoraSettings::default());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["agora", "--config", "/tmp/agora.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/agora.json")));
    }

    #[test]
    fn settings_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server":{"port":9100},"hub":{"queueCapacity":32}}"#).unwrap();

        let cli = Cli::parse_from(["agora", "--config", path.to_str().unwrap()]);
        let settings = cli.load_settings().unwrap();
        let config = cli.hub_config(&settings);
        assert_eq!(config.port, 9100);
        assert_eq!(config.queue_capacity, 32);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = verifier(&AuthSettings::default()).unwrap_err();
        assert!(err.to_string().contains("jwtSecret"));
    }

    #[test]
    fn empty_secret_is_an_error() {
        let auth = AuthSettings {
            jwt_secret: Some(String::new()),
            ..AuthSettings::default()
        };
        assert!(verifier(&auth).is_err());
    }

    #[test]
    fn configured_secret_builds_verifier() {
        let auth = AuthSettings {
            jwt_secret: Some("s3cret".into()),
            ..AuthSettings::default()
        };
        assert!(verifier(&auth).is_ok());
    }
}
