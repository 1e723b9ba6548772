//! The bot event loop.
//!
//! A single actor drains the inbound stream one message at a time, runs the
//! transport heartbeat, and stops on a shutdown signal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deskhand_channels::{ConfirmationGate, KeyboardTracker, TelegramAdapter};
use deskhand_tools::{CommandRunner, FileStore, ShellRunner};
use deskhand_types::config::{BotConfig, DesktopConfig};
use deskhand_types::errors::DeskhandError;
use deskhand_types::{ChatTransport, DesktopController, SystemClock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, DispatcherConfig, DispatcherDeps};
use crate::text;

pub struct Runtime {
    dispatcher: Dispatcher,
    transport: Arc<dyn ChatTransport>,
    gate: Arc<ConfirmationGate>,
    heartbeat: Duration,
}

impl Runtime {
    pub fn new(
        dispatcher: Dispatcher,
        transport: Arc<dyn ChatTransport>,
        gate: Arc<ConfirmationGate>,
        heartbeat: Duration,
    ) -> Self {
        Self {
            dispatcher,
            transport,
            gate,
            heartbeat,
        }
    }

    /// Wire the production stack from a validated config: Telegram, the
    /// desktop backend for the host OS and local storage.
    pub async fn from_config(config: &BotConfig) -> Result<Self, DeskhandError> {
        let clock = Arc::new(SystemClock);
        let transport: Arc<dyn ChatTransport> = Arc::new(TelegramAdapter::new(&config.telegram)?);

        let runner = Arc::new(ShellRunner::new(Duration::from_secs(
            config.desktop.command_timeout_secs,
        )));
        let desktop = desktop_backend(runner, &config.desktop)?;

        let owner = Some(config.desktop.user_name.clone()).filter(|name| !name.is_empty());
        let store = Arc::new(FileStore::new(&config.storage.path, owner, clock.clone()));
        store.ensure_dir().await?;

        let gate = Arc::new(ConfirmationGate::new(
            Duration::from_secs(config.confirmation.ttl_secs),
            clock.clone(),
        ));

        let deps = DispatcherDeps {
            transport: transport.clone(),
            desktop,
            gate: gate.clone(),
            keyboards: Arc::new(KeyboardTracker::new(text::default_keyboard())),
            store,
            clock,
        };
        let dispatcher = Dispatcher::new(deps, DispatcherConfig::from_config(config)?)?;

        Ok(Self::new(
            dispatcher,
            transport,
            gate,
            Duration::from_secs(config.telegram.heartbeat_interval_secs),
        ))
    }

    /// Process messages until `shutdown` resolves or the inbound stream ends.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), DeskhandError> {
        match self.transport.health_check().await {
            Ok(()) => info!("chat transport reachable"),
            Err(e) => warn!(error = %e, "chat transport unreachable at startup, polling anyway"),
        }

        let mut inbound = self.transport.start_listening().await?;
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        heartbeat.tick().await;

        tokio::pin!(shutdown);
        info!("deskhand running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                message = inbound.recv() => match message {
                    Some(message) => {
                        let update_id = message.update_id;
                        let disposition = self.dispatcher.handle_message(message).await;
                        debug!(update_id, ?disposition, "message handled");
                    }
                    None => {
                        warn!("inbound stream closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => self.beat().await,
            }
        }

        info!(pending = self.gate.pending_count(), "deskhand stopped");
        Ok(())
    }

    /// Check the transport, restarting polling when it does not answer, and
    /// drop expired confirmations.
    async fn beat(&self) {
        if let Err(e) = self.transport.health_check().await {
            warn!(error = %e, "heartbeat failed, restarting polling");
            self.transport.restart_polling();
        }
        let purged = self.gate.purge_expired();
        if purged > 0 {
            debug!(purged, "expired confirmations purged");
        }
    }
}

#[cfg(target_os = "linux")]
fn desktop_backend(
    runner: Arc<dyn CommandRunner>,
    config: &DesktopConfig,
) -> Result<Arc<dyn DesktopController>, DeskhandError> {
    Ok(Arc::new(deskhand_tools::LinuxDesktop::new(runner, config)?))
}

#[cfg(target_os = "windows")]
fn desktop_backend(
    runner: Arc<dyn CommandRunner>,
    config: &DesktopConfig,
) -> Result<Arc<dyn DesktopController>, DeskhandError> {
    Ok(Arc::new(deskhand_tools::WindowsDesktop::new(runner, config)))
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn desktop_backend(
    _runner: Arc<dyn CommandRunner>,
    _config: &DesktopConfig,
) -> Result<Arc<dyn DesktopController>, DeskhandError> {
    Err(DeskhandError::Platform(format!(
        "unsupported platform: {}",
        std::env::consts::OS
    )))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
