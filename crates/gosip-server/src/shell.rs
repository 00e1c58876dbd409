//! The server shell: lifecycle, background cleanup loops, and the
//! collaborator wiring described in spec.md §4.12. The shell never
//! terminates a socket itself — that is the transport library's job
//! (spec.md §1 Non-goals) — it only owns the managers and the loops
//! that keep their state tidy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gosip_auth::DigestAuthenticator;
use gosip_infra::errors::InfraError;
use gosip_infra::lifecycle::{Component, ComponentState};
use gosip_moh::MohEngine;
use gosip_mwi::MwiManager;
use gosip_registrar::Registrar;
use gosip_security::srtp::SrtpContextStore;
use gosip_security::zrtp::ZrtpManager;
use gosip_session::{SessionStore, TransferManager};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{validate_listener_config, GosipConfig};
use crate::error::Result;
use crate::handlers::Handlers;
use crate::ports::OutboundNotifier;

const REGISTRAR_SWEEP: Duration = Duration::from_secs(60);
const SESSION_SWEEP: Duration = Duration::from_secs(300);
const MWI_SWEEP: Duration = Duration::from_secs(60);

fn session_max_age() -> chrono::Duration {
    chrono::Duration::minutes(10)
}

/// Owns the managers and background loops a running gosip process needs.
/// Implements [`Component`] the way the teacher's own long-running
/// services do, so it composes into the same start/stop supervision.
pub struct ServerShell {
    config: GosipConfig,
    handlers: Arc<Handlers>,
    registrar: Arc<Registrar>,
    sessions: Arc<SessionStore>,
    mwi: Arc<MwiManager>,
    moh: Arc<MohEngine>,
    authenticator: Arc<DigestAuthenticator>,
    state: SyncMutex<ComponentState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ServerShell {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: GosipConfig,
        authenticator: Arc<DigestAuthenticator>,
        registrar: Arc<Registrar>,
        sessions: Arc<SessionStore>,
        mwi: Arc<MwiManager>,
        moh: Arc<MohEngine>,
        transfer: Arc<TransferManager>,
        srtp: Arc<SrtpContextStore>,
        zrtp: Arc<ZrtpManager>,
        notifier: Arc<dyn OutboundNotifier>,
        pstn: Option<Arc<dyn crate::ports::PstnProvider>>,
    ) -> Self {
        wire_mwi_notifications(&mwi, notifier);

        let handlers = Arc::new(Handlers::new(
            authenticator.clone(),
            registrar.clone(),
            sessions.clone(),
            Arc::new(gosip_session::HoldManager::new(moh.clone(), None)),
            transfer,
            mwi.clone(),
            moh.clone(),
            srtp,
            zrtp,
            pstn,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            handlers,
            registrar,
            sessions,
            mwi,
            moh,
            authenticator,
            state: SyncMutex::new(ComponentState::Created),
            shutdown_tx,
            shutdown_rx,
            tasks: SyncMutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn handlers(&self) -> Arc<Handlers> {
        self.handlers.clone()
    }
}

/// Bridges the synchronous [`MwiManager::on_notify`] callback to the
/// async [`OutboundNotifier`] port by detaching each delivery as its own
/// task, the way `HoldManager`/`TransferManager` keep the lock-holding
/// caller from blocking on I/O (spec.md §5).
fn wire_mwi_notifications(mwi: &Arc<MwiManager>, notifier: Arc<dyn OutboundNotifier>) {
    mwi.on_notify(move |subscription, body, subscription_state| {
        let notifier = notifier.clone();
        let call_id = subscription.call_id.clone();
        tokio::spawn(async move {
            notifier
                .send_notify(&call_id, "message-summary", &subscription_state, gosip_mwi::CONTENT_TYPE, body)
                .await;
        });
    });
}

#[async_trait::async_trait]
impl Component for ServerShell {
    fn name(&self) -> &str {
        "gosip-server"
    }

    fn state(&self) -> ComponentState {
        *self.state.lock()
    }

    async fn start(&self) -> std::result::Result<(), InfraError> {
        validate_listener_config(&self.config).map_err(|e| InfraError::Config(e.to_string()))?;

        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut tasks = self.tasks.lock();

        let auth = self.authenticator.clone();
        let shutdown = self.shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { auth.run_nonce_gc(shutdown).await }));

        let registrar = self.registrar.clone();
        let mut shutdown = self.shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REGISTRAR_SWEEP);
            loop {
                tokio::select! {
                    _ = ticker.tick() => { registrar.cleanup_expired(); }
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
            }
        }));

        let sessions = self.sessions.clone();
        let mut shutdown = self.shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_SWEEP);
            loop {
                tokio::select! {
                    _ = ticker.tick() => { sessions.cleanup(session_max_age()); }
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
            }
        }));

        let mwi = self.mwi.clone();
        let mut shutdown = self.shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MWI_SWEEP);
            loop {
                tokio::select! {
                    _ = ticker.tick() => { mwi.cleanup_expired(); }
                    _ = shutdown.changed() => { if *shutdown.borrow() { break; } }
                }
            }
        }));

        *self.state.lock() = ComponentState::Running;
        info!(sip_port = self.config.sip_port, "gosip-server started");
        Ok(())
    }

    async fn stop(&self) -> std::result::Result<(), InfraError> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown_tx.send(true);
        self.moh.stop_all();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }

        *self.state.lock() = ComponentState::Stopped;
        info!("gosip-server stopped");
        Ok(())
    }
}

pub fn startup_validate(config: &GosipConfig) -> Result<()> {
    validate_listener_config(config)
}
