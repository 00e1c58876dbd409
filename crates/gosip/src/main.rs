//! Composition root: loads configuration, wires every collaborator port
//! to a concrete adapter, and runs the server shell until signalled to
//! stop.
//!
//! The persistent store, PSTN provider, and outbound transport are all
//! external collaborators per spec.md §1 Non-goals; this binary is the
//! reference wiring a deployment replaces piece by piece (start with the
//! in-memory `DeviceStore`/`RegistrationStore` here, swap in the real
//! repository client once one exists).

mod collaborators;

use std::sync::Arc;

use anyhow::{Context, Result};
use gosip_auth::DigestAuthenticator;
use gosip_infra::lifecycle::Component;
use gosip_infra::logging::{setup_logging, LoggingConfig};
use gosip_moh::MohEngine;
use gosip_mwi::MwiManager;
use gosip_registrar::Registrar;
use gosip_security::srtp::SrtpContextStore;
use gosip_security::zrtp::ZrtpManager;
use gosip_server::{GosipConfig, ServerShell, SipfragNotifier};
use gosip_session::{SessionStore, TransferManager};
use tracing::info;

use collaborators::{InMemoryDeviceStore, InMemoryRegistrationStore, LoggingBridge, LoggingNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LoggingConfig::new(tracing::Level::INFO, "gosip")).ok();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "gosip.toml".to_string());
    let config = match gosip_infra::config::load_toml::<GosipConfig>(&config_path) {
        Ok(config) => config,
        Err(err) => {
            info!(config_path, %err, "no config file found, starting with defaults");
            GosipConfig::default()
        }
    };

    let authenticator = Arc::new(DigestAuthenticator::new(Arc::new(InMemoryDeviceStore::seeded())));
    let registrar = Arc::new(Registrar::new(Arc::new(InMemoryRegistrationStore::default())));
    let sessions = Arc::new(SessionStore::new());
    let mwi = Arc::new(MwiManager::new());
    let moh = Arc::new(MohEngine::new());
    let notifier: Arc<dyn gosip_server::OutboundNotifier> = Arc::new(LoggingNotifier);
    let transfer = Arc::new(TransferManager::new(Arc::new(LoggingBridge), Arc::new(SipfragNotifier(notifier.clone()))));
    let srtp = Arc::new(SrtpContextStore::new());
    let zrtp = Arc::new(ZrtpManager::new(None, Some(config.zrtp.cache_expiry_days), Arc::new(|_sas| true)));

    let shell = Arc::new(ServerShell::new(
        config,
        authenticator,
        registrar,
        sessions,
        mwi,
        moh,
        transfer,
        srtp,
        zrtp,
        notifier,
        None,
    ));

    shell.start().await.context("failed to start gosip-server")?;
    info!("gosip-rs running; Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;

    info!("shutting down");
    shell.stop().await.context("failed to stop gosip-server")?;
    Ok(())
}
