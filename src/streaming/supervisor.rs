// =============================================================================
// Streaming Supervisor — producer lifecycle, transport policy, REST failover
// =============================================================================
//
// Owns every ingestion task: the producers (WebSocket client / REST poller),
// the bounded channel between them and the aggregator, and the shutdown
// signal. Producer exits never propagate: in `ws` mode a dead WebSocket is
// terminal for that producer only, and in `auto` mode it triggers the
// one-shot REST fallback guarded by a latch. The latch is never reset, so a
// process sees at most one WS -> REST transition in its lifetime.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::providers::{BinanceRestPoller, BinanceWsClient, ProviderError};
use crate::settings::{Settings, Transport};
use crate::storage::BarStore;
use crate::streaming::aggregator::BarAggregator;

/// Capacity of the producer -> aggregator channel. Producers block (rather
/// than drop) when the aggregator falls behind.
const CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Status — the externally visible slice of supervisor state
// =============================================================================

/// Shared, read-mostly view of the streaming lifecycle, surfaced by
/// `/v1/providers`.
pub struct StreamingStatus {
    active_transport: RwLock<Option<&'static str>>,
    rest_fallback_triggered: AtomicBool,
}

impl StreamingStatus {
    pub fn new() -> Self {
        Self {
            active_transport: RwLock::new(None),
            rest_fallback_triggered: AtomicBool::new(false),
        }
    }

    /// Currently active transport: `"ws"`, `"rest"`, or `None` when no
    /// producer is running.
    pub fn active_transport(&self) -> Option<&'static str> {
        *self.active_transport.read()
    }

    pub fn rest_fallback_triggered(&self) -> bool {
        self.rest_fallback_triggered.load(Ordering::SeqCst)
    }

    fn set_active(&self, transport: Option<&'static str>) {
        *self.active_transport.write() = transport;
    }

    /// Arm the fallback latch. Returns `true` exactly once.
    fn arm_fallback_latch(&self) -> bool {
        !self.rest_fallback_triggered.swap(true, Ordering::SeqCst)
    }
}

impl Default for StreamingStatus {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// WS-exit decision — the pure core of the failover state machine
// =============================================================================

/// What the supervisor does when the WebSocket producer exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsExitAction {
    /// `auto` mode, latch unarmed: start the REST poller (arms the latch).
    StartRestFallback,
    /// `ws` mode, or `auto` with the latch already armed: the producer is
    /// done for the rest of the process lifetime.
    Terminal,
    /// Clean shutdown: do nothing.
    Stop,
}

/// Decide the reaction to a WS producer exit. Pure so the failover contract
/// is testable without any network.
pub fn ws_exit_action(
    mode: Transport,
    fallback_already_triggered: bool,
    shutting_down: bool,
) -> WsExitAction {
    if shutting_down {
        return WsExitAction::Stop;
    }
    match mode {
        Transport::Auto if !fallback_already_triggered => WsExitAction::StartRestFallback,
        _ => WsExitAction::Terminal,
    }
}

// =============================================================================
// Supervisor
// =============================================================================

pub struct StreamingSupervisor {
    settings: Arc<Settings>,
    store: Arc<BarStore>,
    status: Arc<StreamingStatus>,
    shutdown_tx: watch::Sender<bool>,
}

impl StreamingSupervisor {
    pub fn new(settings: Arc<Settings>, store: Arc<BarStore>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            settings,
            store,
            status: Arc::new(StreamingStatus::new()),
            shutdown_tx,
        }
    }

    /// Handle for `/v1/providers` and tests.
    pub fn status(&self) -> Arc<StreamingStatus> {
        self.status.clone()
    }

    /// Request shutdown; every producer and the aggregator exit promptly.
    pub fn shutdown(&self) {
        info!("streaming supervisor shutting down");
        let _ = self.shutdown_tx.send(true);
    }

    /// Run ingestion until shutdown. Never returns an error — every failure
    /// mode is contained and logged.
    pub async fn run(&self) {
        if !self.settings.binance_enabled() {
            warn!("binance provider not enabled — ingestion not started");
            return;
        }

        let (tx, rx) = mpsc::channel::<crate::types::Bar>(CHANNEL_CAPACITY);

        let aggregator = match BarAggregator::new(self.store.clone(), &self.settings.bar_intervals)
        {
            Ok(agg) => agg,
            Err(e) => {
                error!(error = %e, "failed to initialise aggregator — ingestion not started");
                return;
            }
        };
        let aggregator_handle = tokio::spawn(aggregator.run(rx));

        match self.settings.transport {
            Transport::Rest => self.run_rest(tx).await,
            Transport::Ws => self.run_ws_only(tx).await,
            Transport::Auto => self.run_auto(tx).await,
        }

        // Producers are gone; dropping the last sender lets the aggregator
        // drain and stop.
        let _ = aggregator_handle.await;
    }

    async fn run_rest(&self, tx: mpsc::Sender<crate::types::Bar>) {
        info!(transport = "rest", "starting Binance REST poller");
        self.status.set_active(Some("rest"));

        let poller = BinanceRestPoller::new(&self.settings.symbols, self.settings.rest_poll_seconds);
        let shutdown = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { poller.run(tx, shutdown).await });

        match handle.await {
            Ok(Ok(())) => info!("REST poller exited"),
            Ok(Err(e)) => error!(error = %e, "REST poller terminated"),
            Err(e) => error!(error = %e, "REST poller task panicked"),
        }
        self.status.set_active(None);
    }

    async fn run_ws_only(&self, tx: mpsc::Sender<crate::types::Bar>) {
        info!(transport = "ws", "starting Binance WebSocket client");
        self.status.set_active(Some("ws"));

        // Without a fallback the client retries forever; fail-fast off.
        let client = BinanceWsClient::new(&self.settings.symbols, false);
        let shutdown = self.shutdown_tx.subscribe();
        let result = client.run(tx, shutdown).await;

        match ws_exit_action(Transport::Ws, false, *self.shutdown_tx.borrow()) {
            WsExitAction::Stop => info!("WebSocket client stopped"),
            _ => match result {
                Ok(()) => warn!("WebSocket client exited — no fallback in ws mode"),
                Err(e) => error!(error = %e, "WebSocket client terminated — no fallback in ws mode"),
            },
        }
        self.status.set_active(None);
    }

    async fn run_auto(&self, tx: mpsc::Sender<crate::types::Bar>) {
        info!(transport = "auto", "starting Binance WebSocket client with REST failover");
        self.status.set_active(Some("ws"));

        let client = BinanceWsClient::new(&self.settings.symbols, true);
        let shutdown = self.shutdown_tx.subscribe();
        let result = client.run(tx.clone(), shutdown).await;

        let action = ws_exit_action(
            Transport::Auto,
            self.status.rest_fallback_triggered(),
            *self.shutdown_tx.borrow(),
        );

        match action {
            WsExitAction::Stop => {
                info!("WebSocket client stopped");
                self.status.set_active(None);
            }
            WsExitAction::Terminal => {
                error!("WebSocket producer exited with the fallback already used");
                self.status.set_active(None);
            }
            WsExitAction::StartRestFallback => {
                if let Err(ProviderError::Unavailable(reason)) = &result {
                    warn!(reason = %reason, "WebSocket unavailable");
                }
                if self.status.arm_fallback_latch() {
                    warn!("falling back to REST polling for the rest of the process lifetime");
                    self.run_rest(tx).await;
                }
            }
        }
    }
}
