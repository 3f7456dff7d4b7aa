//! The payment lifecycle state machine.
//!
//! One lifecycle tracks one payment request at a time. Each asynchronous
//! stage (locate, validate, depth polling, optional send) runs as its own
//! cancellable task; entering a new state cancels the previous stage's task
//! before scheduling its own, and every task re-checks a generation counter
//! before mutating state so a superseded in-flight call can never apply a
//! stale transition.
//!
//! `NotFound` from the ledger is the expected steady state while the buyer
//! has not paid and is retried silently. Only a definitive `Invalid` verdict
//! (or an on-chain execution failure of the tracked signature) terminates an
//! attempt; every other fault is logged and retried, since the buyer may
//! take arbitrarily long to pay.
//!
//! A lifecycle must be created inside a tokio runtime; its stage tasks are
//! spawned on the ambient runtime.

use crate::config::TerminalConfig;
use crate::status::{PaymentSnapshot, PaymentStatus, SnapshotCallback};
use crate::{LifecycleError, Result};
use chargekit_lib::gateway::GatewayError;
use chargekit_lib::{uri, Address, LedgerGateway, PaymentRequest, Reference, Signature};
use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Drives a payment request from `New` to a terminal state.
///
/// Cloning is cheap and shares the same lifecycle.
#[derive(Clone)]
pub struct PaymentLifecycle {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn LedgerGateway>,
    config: TerminalConfig,
    state: RwLock<State>,
    callbacks: RwLock<Vec<SnapshotCallback>>,
}

struct State {
    status: PaymentStatus,
    amount: Option<Decimal>,
    message: Option<String>,
    memo: Option<String>,
    reference: Option<Reference>,
    signature: Option<Signature>,
    confirmations: u64,
    invalid_reason: Option<String>,
    payer: Option<Address>,
    /// Bumped on every transition and reset. Stage tasks snapshot the value
    /// at spawn and re-check it before any mutation.
    generation: u64,
    /// The single outstanding task of the current stage.
    stage_task: Option<JoinHandle<()>>,
    /// The optional send-retry task, alive only while `Pending` with a
    /// payer attached.
    send_task: Option<JoinHandle<()>>,
}

impl State {
    fn new() -> Self {
        Self {
            status: PaymentStatus::New,
            amount: None,
            message: None,
            memo: None,
            reference: None,
            signature: None,
            confirmations: 0,
            invalid_reason: None,
            payer: None,
            generation: 0,
            stage_task: None,
            send_task: None,
        }
    }
}

impl PaymentLifecycle {
    /// Create a lifecycle in the `New` state.
    pub fn new(gateway: Arc<dyn LedgerGateway>, config: TerminalConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                config,
                state: RwLock::new(State::new()),
                callbacks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a callback invoked on every observable change.
    pub fn on_change(&self, callback: SnapshotCallback) {
        let mut callbacks = self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner());
        callbacks.push(callback);
    }

    /// Current state and fields as one consistent view.
    pub fn snapshot(&self) -> PaymentSnapshot {
        let state = self.inner.state.read().unwrap_or_else(|e| e.into_inner());
        self.inner.snapshot_locked(&state)
    }

    /// Current status.
    pub fn status(&self) -> PaymentStatus {
        let state = self.inner.state.read().unwrap_or_else(|e| e.into_inner());
        state.status
    }

    /// The request as currently configured.
    pub fn request(&self) -> PaymentRequest {
        let state = self.inner.state.read().unwrap_or_else(|e| e.into_inner());
        self.inner.request_locked(&state)
    }

    /// Current shareable encoding of the request.
    pub fn url(&self) -> String {
        uri::encode_url(&self.request())
    }

    /// Set the amount owed. Only applied while `New`; once committed the
    /// request is immutable.
    pub fn set_amount(&self, amount: Option<Decimal>) {
        if let Some(amount) = amount {
            if amount.is_sign_negative() {
                warn!(%amount, "negative amount ignored");
                return;
            }
        }
        self.mutate_new("amount", |state| state.amount = amount);
    }

    /// Set the free-text message. Only applied while `New`.
    pub fn set_message(&self, message: Option<String>) {
        self.mutate_new("message", |state| state.message = message);
    }

    /// Set the on-chain memo. Only applied while `New`.
    pub fn set_memo(&self, memo: Option<String>) {
        self.mutate_new("memo", |state| state.memo = memo);
    }

    fn mutate_new(&self, field: &str, apply: impl FnOnce(&mut State)) {
        let snapshot = {
            let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
            if state.status != PaymentStatus::New {
                debug!(field, status = ?state.status, "field change ignored outside New");
                return;
            }
            apply(&mut state);
            self.inner.snapshot_locked(&state)
        };
        self.inner.notify(&snapshot);
    }

    /// Attach a connected payer. While `Pending`, the lifecycle will attempt
    /// to build and send the transaction on the payer's behalf, retrying on
    /// decline or network failure until the state changes.
    pub fn attach_payer(&self, payer: Address) {
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        state.payer = Some(payer.clone());
        if state.status == PaymentStatus::Pending && state.send_task.is_none() {
            let generation = state.generation;
            state.send_task = Some(self.inner.spawn_send(generation, payer));
        }
    }

    /// Commit to the current amount: assign a fresh reference and begin
    /// watching the ledger for a matching transaction.
    ///
    /// Fails if the amount is absent or not greater than zero, or if a
    /// payment is already in progress; in both cases the state is untouched.
    pub fn commit(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
            if state.status != PaymentStatus::New || state.reference.is_some() {
                return Err(LifecycleError::AlreadyCommitted);
            }
            let amount = state.amount.ok_or(LifecycleError::AmountRequired)?;
            if amount <= Decimal::ZERO {
                return Err(LifecycleError::AmountRequired);
            }
            state.reference = Some(Reference::generate());
            state.status = PaymentStatus::Pending;
            state.generation += 1;
            let generation = state.generation;
            state.stage_task = Some(self.inner.spawn_locate(generation));
            if let Some(payer) = state.payer.clone() {
                state.send_task = Some(self.inner.spawn_send(generation, payer));
            }
            self.inner.snapshot_locked(&state)
        };
        debug!("request committed; watching for a matching transaction");
        self.inner.notify(&snapshot);
        Ok(())
    }

    /// Discard the current payment and return to `New`, cancelling all
    /// outstanding polling tasks. The attached payer, if any, is kept.
    pub fn reset(&self) {
        let snapshot = {
            let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
            state.generation += 1;
            if let Some(task) = state.stage_task.take() {
                task.abort();
            }
            if let Some(task) = state.send_task.take() {
                task.abort();
            }
            state.status = PaymentStatus::New;
            state.amount = None;
            state.message = None;
            state.memo = None;
            state.reference = None;
            state.signature = None;
            state.confirmations = 0;
            state.invalid_reason = None;
            self.inner.snapshot_locked(&state)
        };
        debug!("lifecycle reset");
        self.inner.notify(&snapshot);
    }
}

impl Inner {
    fn request_locked(&self, state: &State) -> PaymentRequest {
        PaymentRequest {
            recipient: self.config.recipient.clone(),
            amount: state.amount,
            token: self.config.token.clone(),
            reference: state.reference.clone(),
            label: self.config.label.clone(),
            message: state.message.clone(),
            memo: state.memo.clone(),
        }
    }

    fn snapshot_locked(&self, state: &State) -> PaymentSnapshot {
        let required = self.config.required_confirmations.max(1);
        let progress = (state.confirmations as f64 / required as f64).clamp(0.0, 1.0);
        PaymentSnapshot {
            status: state.status,
            reference: state.reference.clone(),
            signature: state.signature.clone(),
            confirmations: state.confirmations,
            progress,
            url: uri::encode_url(&self.request_locked(state)),
            invalid_reason: state.invalid_reason.clone(),
        }
    }

    fn notify(&self, snapshot: &PaymentSnapshot) {
        let callbacks = self.callbacks.read().unwrap_or_else(|e| e.into_inner());
        for callback in callbacks.iter() {
            callback(snapshot);
        }
    }

    /// Poll locate-by-reference while `Pending`. One network call in flight
    /// at a time: poll, await, reschedule.
    fn spawn_locate(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.config.locate_interval).await;
                let reference = {
                    let state = inner.state.read().unwrap_or_else(|e| e.into_inner());
                    if state.generation != generation || state.status != PaymentStatus::Pending {
                        return;
                    }
                    match &state.reference {
                        Some(reference) => reference.clone(),
                        None => return,
                    }
                };
                match inner
                    .gateway
                    .locate_by_reference(&reference, None, inner.config.commitment)
                    .await
                {
                    Ok(signature) => {
                        inner.on_located(generation, signature);
                        return;
                    }
                    Err(err) if err.is_pending() => {
                        trace!("no matching transaction yet");
                    }
                    Err(err) => {
                        warn!(%err, "locate poll failed; retrying");
                    }
                }
            }
        })
    }

    /// Validate the located signature while `Confirmed`. First attempt is
    /// immediate; retryable failures are reattempted on a short delay.
    fn spawn_validate(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let (signature, expected) = {
                    let state = inner.state.read().unwrap_or_else(|e| e.into_inner());
                    if state.generation != generation || state.status != PaymentStatus::Confirmed
                    {
                        return;
                    }
                    let Some(signature) = state.signature.clone() else {
                        return;
                    };
                    (signature, inner.request_locked(&state))
                };
                match inner
                    .gateway
                    .validate(&signature, &expected, inner.config.commitment)
                    .await
                {
                    Ok(()) => {
                        inner.on_validated(generation);
                        return;
                    }
                    Err(GatewayError::Invalid(reason)) => {
                        inner.on_invalid(generation, reason);
                        return;
                    }
                    Err(err) if err.is_pending() => {
                        trace!(%err, "transaction not yet visible to validation");
                    }
                    Err(err) => {
                        warn!(%err, "validation attempt failed; retrying");
                    }
                }
                tokio::time::sleep(inner.config.validate_retry).await;
            }
        })
    }

    /// Poll confirmation depth while `Valid` until the threshold is reached
    /// or the ledger reports the transaction finalized. An on-chain
    /// execution failure of the tracked signature is terminal and moves the
    /// lifecycle to `Invalid`.
    fn spawn_status(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(inner.config.status_interval).await;
                let signature = {
                    let state = inner.state.read().unwrap_or_else(|e| e.into_inner());
                    if state.generation != generation || state.status != PaymentStatus::Valid {
                        return;
                    }
                    let Some(signature) = state.signature.clone() else {
                        return;
                    };
                    signature
                };
                match inner.gateway.fetch_status(&signature).await {
                    Ok(status) => {
                        let done = status.finalized
                            || status.confirmations >= inner.config.required_confirmations;
                        if done {
                            inner.on_finalized(generation, status.confirmations);
                            return;
                        }
                        inner.on_confirmations(generation, status.confirmations);
                    }
                    Err(GatewayError::NotFound) => {
                        trace!("signature not indexed yet");
                    }
                    Err(GatewayError::TransactionFailed(reason)) => {
                        inner.on_invalid(generation, reason);
                        return;
                    }
                    Err(err) => {
                        warn!(%err, "confirmation poll failed; retrying");
                    }
                }
            }
        })
    }

    /// While `Pending` with a payer attached, try to build and send the
    /// transaction on the payer's behalf. Declined or unreachable sends are
    /// retried on a fixed backoff until the state changes; a successful send
    /// is picked up by the locate polling like any other payment.
    fn spawn_send(self: &Arc<Self>, generation: u64, payer: Address) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let request = {
                    let state = inner.state.read().unwrap_or_else(|e| e.into_inner());
                    if state.generation != generation || state.status != PaymentStatus::Pending {
                        return;
                    }
                    if state.amount.is_none() {
                        return;
                    }
                    inner.request_locked(&state)
                };
                match inner.gateway.build_and_send(&payer, &request).await {
                    Ok(signature) => {
                        debug!(%signature, "payer transaction submitted");
                        return;
                    }
                    Err(err) => {
                        warn!(%err, "send attempt failed; retrying");
                    }
                }
                tokio::time::sleep(inner.config.send_retry).await;
            }
        })
    }

    /// Pending -> Confirmed.
    fn on_located(self: &Arc<Self>, generation: u64, signature: Signature) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation || state.status != PaymentStatus::Pending {
                return;
            }
            state.signature = Some(signature);
            state.status = PaymentStatus::Confirmed;
            state.generation += 1;
            let next = state.generation;
            // The buyer paid; stop trying to send on their behalf.
            if let Some(task) = state.send_task.take() {
                task.abort();
            }
            state.stage_task = Some(self.spawn_validate(next));
            self.snapshot_locked(&state)
        };
        debug!(signature = ?snapshot.signature, "transaction located; validating");
        self.notify(&snapshot);
    }

    /// Confirmed -> Valid.
    fn on_validated(self: &Arc<Self>, generation: u64) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation || state.status != PaymentStatus::Confirmed {
                return;
            }
            state.status = PaymentStatus::Valid;
            state.generation += 1;
            let next = state.generation;
            state.stage_task = Some(self.spawn_status(next));
            self.snapshot_locked(&state)
        };
        debug!("transaction validated; tracking confirmation depth");
        self.notify(&snapshot);
    }

    /// Any in-progress state -> Invalid (terminal).
    fn on_invalid(self: &Arc<Self>, generation: u64, reason: String) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation {
                return;
            }
            state.status = PaymentStatus::Invalid;
            state.invalid_reason = Some(reason.clone());
            state.generation += 1;
            if let Some(task) = state.send_task.take() {
                task.abort();
            }
            state.stage_task = None;
            self.snapshot_locked(&state)
        };
        warn!(%reason, "payment is invalid");
        self.notify(&snapshot);
    }

    /// Depth update within `Valid`; not a transition, so the generation is
    /// checked but not bumped.
    fn on_confirmations(self: &Arc<Self>, generation: u64, confirmations: u64) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation || state.status != PaymentStatus::Valid {
                return;
            }
            if state.confirmations == confirmations {
                return;
            }
            state.confirmations = confirmations;
            self.snapshot_locked(&state)
        };
        trace!(confirmations, "confirmation depth advanced");
        self.notify(&snapshot);
    }

    /// Valid -> Finalized (terminal).
    fn on_finalized(self: &Arc<Self>, generation: u64, confirmations: u64) {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if state.generation != generation || state.status != PaymentStatus::Valid {
                return;
            }
            state.confirmations = confirmations.max(state.confirmations);
            state.status = PaymentStatus::Finalized;
            state.generation += 1;
            state.stage_task = None;
            self.snapshot_locked(&state)
        };
        debug!(confirmations, "payment finalized");
        self.notify(&snapshot);
    }
}
