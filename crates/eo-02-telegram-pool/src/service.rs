//! # Telegram Pool Service
//!
//! ```text
//! add_tele ──size──▶ gauge ──▶ validate ──┬─ edge call ──▶ dispatch ──▶ response
//!                                         └─ other ─────▶ enqueue ──▶ event loop
//! ```
//!
//! Two pipelines share only the slot gauge:
//!
//! - **Edge calls** are dispatched inline. The slot is held for the duration
//!   of the P2P call.
//! - **Other telegrams** are handed with their slot to the event loop, which
//!   owns the account queues. The slot is freed when the telegram is promoted
//!   or pruned.
//!
//! The event loop selects over enqueue requests, promote requests, a pruning
//! tick (`prune_interval`) and the shutdown signal. Admission never waits on
//! the loop.

use crate::domain::{
    AccountQueues, ConfigError, EdgeCall, EdgeResponse, SlotGauge, SlotGuard, Telegram,
    TelepoolConfig, TelepoolError,
};
use crate::ports::{TelegramPoolApi, TelegramSigner};
use async_trait::async_trait;
use http::Method;
use parking_lot::{Mutex, RwLock};
use shared_types::{
    is_zero_address, register_peer_route, Address, AddressBook, P2pRequest, P2pTransport,
    PeerDirectory,
};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_CLOSED: u8 = 2;

struct EnqueueRequest {
    telegram: Telegram,
    slot: SlotGuard,
    reply: oneshot::Sender<Result<(), TelepoolError>>,
}

struct PromoteRequest {
    account: Address,
    next_nonce: u64,
}

type LoopReceivers = (
    mpsc::Receiver<EnqueueRequest>,
    mpsc::Receiver<PromoteRequest>,
);

/// The telegram pool.
pub struct TelegramPool {
    config: TelepoolConfig,
    signer: RwLock<Arc<dyn TelegramSigner>>,
    directory: Arc<dyn PeerDirectory>,
    address_book: Arc<dyn AddressBook>,
    transport: Arc<dyn P2pTransport>,
    gauge: Arc<SlotGauge>,
    enqueue_tx: mpsc::Sender<EnqueueRequest>,
    promote_tx: mpsc::Sender<PromoteRequest>,
    receivers: Mutex<Option<LoopReceivers>>,
    promoted_tx: broadcast::Sender<Telegram>,
    shutdown_tx: watch::Sender<bool>,
    state: AtomicU8,
    enqueued: Arc<AtomicU64>,
}

impl TelegramPool {
    /// Create a pool. The event loop is not running until [`start`](Self::start).
    pub fn new(
        config: TelepoolConfig,
        directory: Arc<dyn PeerDirectory>,
        address_book: Arc<dyn AddressBook>,
        transport: Arc<dyn P2pTransport>,
        signer: Arc<dyn TelegramSigner>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (enqueue_tx, enqueue_rx) = mpsc::channel(config.enqueue_buffer);
        let (promote_tx, promote_rx) = mpsc::channel(config.enqueue_buffer);
        let (promoted_tx, _) = broadcast::channel(config.enqueue_buffer);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            gauge: Arc::new(SlotGauge::new(config.max_slots)),
            config,
            signer: RwLock::new(signer),
            directory,
            address_book,
            transport,
            enqueue_tx,
            promote_tx,
            receivers: Mutex::new(Some((enqueue_rx, promote_rx))),
            promoted_tx,
            shutdown_tx,
            state: AtomicU8::new(STATE_IDLE),
            enqueued: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn config(&self) -> &TelepoolConfig {
        &self.config
    }

    /// Spawn the event loop on the current runtime.
    pub fn start(&self) -> Result<JoinHandle<()>, TelepoolError> {
        let (enqueue_rx, promote_rx) = self
            .receivers
            .lock()
            .take()
            .ok_or(TelepoolError::AlreadyStarted)?;

        let event_loop = EventLoop {
            queues: AccountQueues::new(self.config.max_account_enqueued),
            enqueue_rx,
            promote_rx,
            shutdown_rx: self.shutdown_tx.subscribe(),
            promoted_tx: self.promoted_tx.clone(),
            enqueued: Arc::clone(&self.enqueued),
            prune_interval: self.config.prune_interval,
            enqueued_ttl: self.config.enqueued_ttl,
        };

        self.state.store(STATE_RUNNING, Ordering::Release);
        Ok(tokio::spawn(event_loop.run()))
    }

    /// Signal the event loop to stop. Later enqueues fail with `ShuttingDown`.
    pub fn close(&self) {
        self.state.store(STATE_CLOSED, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
    }

    /// Replace the signer used to validate telegrams.
    pub fn set_signer(&self, signer: Arc<dyn TelegramSigner>) {
        *self.signer.write() = signer;
    }

    /// Receive every telegram promoted from an account queue.
    pub fn subscribe_promoted(&self) -> broadcast::Receiver<Telegram> {
        self.promoted_tx.subscribe()
    }

    /// Slots currently held.
    pub fn slots_in_use(&self) -> u64 {
        self.gauge.height()
    }

    /// Telegrams waiting in account queues.
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Acquire)
    }

    /// Admit, validate and handle a telegram.
    ///
    /// See [`TelegramPoolApi::add_tele`].
    pub async fn add_tele(&self, telegram: &mut Telegram) -> Result<String, TelepoolError> {
        if telegram.encoded_len() > self.config.max_telegram_size {
            return Err(TelepoolError::OversizedData);
        }

        let Some(slot) = self.gauge.try_acquire() else {
            warn!(
                height = self.gauge.height(),
                max = self.gauge.max(),
                "telegram rejected, pool is full"
            );
            return Err(TelepoolError::TxPoolOverflow);
        };

        self.validate_tele(telegram)?;

        if telegram.is_edge_call() {
            let result = self.dispatch_edge_call(telegram).await;
            drop(slot);
            return result;
        }

        self.enqueue(telegram.clone(), slot).await?;
        Ok(String::new())
    }

    /// Set `account`'s next expected nonce and promote what became ready.
    pub async fn promote(&self, account: Address, next_nonce: u64) -> Result<(), TelepoolError> {
        self.ensure_running()?;
        self.promote_tx
            .send(PromoteRequest {
                account,
                next_nonce,
            })
            .await
            .map_err(|_| TelepoolError::ShuttingDown)
    }

    fn ensure_running(&self) -> Result<(), TelepoolError> {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => Ok(()),
            STATE_IDLE => Err(TelepoolError::NotRunning),
            _ => Err(TelepoolError::ShuttingDown),
        }
    }

    /// Recover and check the sender and, if present, the provider. `from`
    /// is only written once every check has passed.
    fn validate_tele(&self, telegram: &mut Telegram) -> Result<(), TelepoolError> {
        let signer = Arc::clone(&*self.signer.read());

        let from = signer.sender(telegram).map_err(|e| {
            debug!(error = %e, "failed to recover telegram sender");
            TelepoolError::ExtractSignature
        })?;
        if !is_zero_address(&telegram.from) && telegram.from != from {
            return Err(TelepoolError::InvalidSender);
        }

        if !is_zero_address(&telegram.resp_from) {
            let provider = signer.provider(telegram).map_err(|e| {
                debug!(error = %e, "failed to recover telegram provider");
                TelepoolError::ExtractSignature
            })?;
            if provider != telegram.resp_from {
                return Err(TelepoolError::InvalidProvider);
            }
        }
        telegram.from = from;

        debug!(from = %hex::encode(from), nonce = telegram.nonce, "validated telegram");
        Ok(())
    }

    async fn dispatch_edge_call(&self, telegram: &mut Telegram) -> Result<String, TelepoolError> {
        let call = EdgeCall::from_input(&telegram.input)
            .map_err(|e| TelepoolError::InvalidEdgeCall(e.to_string()))?;

        let route = register_peer_route(
            self.directory.as_ref(),
            self.address_book.as_ref(),
            &call.peer_id,
        )?;
        debug!(
            peer_id = %call.peer_id,
            endpoint = %call.endpoint,
            addr = %route.addr,
            "edge call"
        );

        let request = P2pRequest::ec_app(Method::POST, call.endpoint.clone())
            .with_body(call.input.unwrap_or_default());
        let response = self
            .transport
            .round_trip(route.peer_id, request)
            .await
            .map_err(|e| {
                warn!(peer_id = %call.peer_id, endpoint = %call.endpoint, error = %e, "edge call failed");
                e
            })?;

        if !response.status.is_success() {
            return Err(TelepoolError::EdgeCallFailed(response.status.as_u16()));
        }

        let body = response.collect_body(self.config.max_response_size).await?;
        let edge_response = EdgeResponse::from_rlp(&body)
            .map_err(|e| TelepoolError::InvalidResponse(e.to_string()))?;

        telegram.attach_response(&edge_response);
        Ok(edge_response.resp_string)
    }

    async fn enqueue(&self, telegram: Telegram, slot: SlotGuard) -> Result<(), TelepoolError> {
        self.ensure_running()?;

        let (reply, reply_rx) = oneshot::channel();
        self.enqueue_tx
            .send(EnqueueRequest {
                telegram,
                slot,
                reply,
            })
            .await
            .map_err(|_| TelepoolError::ShuttingDown)?;

        reply_rx.await.map_err(|_| TelepoolError::ShuttingDown)?
    }
}

#[async_trait]
impl TelegramPoolApi for TelegramPool {
    async fn add_tele(&self, telegram: &mut Telegram) -> Result<String, TelepoolError> {
        TelegramPool::add_tele(self, telegram).await
    }

    async fn promote(&self, account: Address, next_nonce: u64) -> Result<(), TelepoolError> {
        TelegramPool::promote(self, account, next_nonce).await
    }

    fn slots_in_use(&self) -> u64 {
        TelegramPool::slots_in_use(self)
    }
}

/// State owned by the spawned event loop.
struct EventLoop {
    queues: AccountQueues,
    enqueue_rx: mpsc::Receiver<EnqueueRequest>,
    promote_rx: mpsc::Receiver<PromoteRequest>,
    shutdown_rx: watch::Receiver<bool>,
    promoted_tx: broadcast::Sender<Telegram>,
    enqueued: Arc<AtomicU64>,
    prune_interval: Duration,
    enqueued_ttl: Duration,
}

impl EventLoop {
    async fn run(mut self) {
        info!("telegram pool loop started");

        let first_prune = tokio::time::Instant::now() + self.prune_interval;
        let mut prune_tick = tokio::time::interval_at(first_prune, self.prune_interval);
        prune_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                Some(req) = self.enqueue_rx.recv() => self.handle_enqueue(req),
                Some(req) = self.promote_rx.recv() => self.handle_promote(req),
                _ = prune_tick.tick() => self.handle_prune(),
            }
        }

        info!(dropped = self.queues.len(), "telegram pool loop stopped");
    }

    fn handle_enqueue(&mut self, req: EnqueueRequest) {
        let account = req.telegram.from;
        let nonce = req.telegram.nonce;

        let result = match self.queues.enqueue(req.telegram, req.slot, Instant::now()) {
            Ok(promotable) => {
                debug!(account = %hex::encode(account), nonce, "telegram enqueued");
                if promotable {
                    let promoted = self.queues.promote(&account);
                    self.publish(promoted);
                }
                Ok(())
            }
            Err(e) => {
                debug!(account = %hex::encode(account), nonce, error = %e, "enqueue rejected");
                Err(e)
            }
        };
        self.sync_count();
        let _ = req.reply.send(result);
    }

    fn handle_promote(&mut self, req: PromoteRequest) {
        let (promoted, dropped) = self.queues.reset_nonce(&req.account, req.next_nonce);
        if dropped > 0 {
            debug!(account = %hex::encode(req.account), dropped, "dropped stale telegrams");
        }
        self.publish(promoted);
        self.sync_count();
    }

    fn handle_prune(&mut self) {
        let pruned = self.queues.prune(Instant::now(), self.enqueued_ttl);
        if pruned > 0 {
            info!(pruned, "pruned stale telegrams");
        }
        self.sync_count();
    }

    fn publish(&self, promoted: Vec<Telegram>) {
        if promoted.is_empty() {
            return;
        }
        info!(count = promoted.len(), "promoted telegrams");
        for telegram in promoted {
            // No subscribers is not an error.
            let _ = self.promoted_tx.send(telegram);
        }
    }

    fn sync_count(&self) {
        self.enqueued.store(self.queues.len() as u64, Ordering::Release);
    }
}
