//! Scriptable in-memory ledger gateway for lifecycle tests.
//!
//! Each operation pops the next scripted response from its queue; an empty
//! queue yields the operation's steady-state answer (`NotFound` for queries,
//! `Unreachable` for sends), which is exactly what a quiet ledger looks like
//! to the engine.

use async_trait::async_trait;
use chargekit_lib::gateway::{
    Commitment, GatewayError, GatewayResult, LedgerGateway, Signature, SignatureStatus,
};
use chargekit_lib::{Address, PaymentRequest, Reference};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockGateway {
    locate_script: Mutex<VecDeque<GatewayResult<Signature>>>,
    validate_script: Mutex<VecDeque<GatewayResult<()>>>,
    status_script: Mutex<VecDeque<GatewayResult<SignatureStatus>>>,
    send_script: Mutex<VecDeque<GatewayResult<Signature>>>,
    pub locate_calls: AtomicU64,
    pub validate_calls: AtomicU64,
    pub status_calls: AtomicU64,
    pub send_calls: AtomicU64,
    inflight: AtomicU64,
    max_inflight: AtomicU64,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_locate(&self, result: GatewayResult<Signature>) {
        self.locate_script.lock().unwrap().push_back(result);
    }

    pub fn push_validate(&self, result: GatewayResult<()>) {
        self.validate_script.lock().unwrap().push_back(result);
    }

    pub fn push_status(&self, result: GatewayResult<SignatureStatus>) {
        self.status_script.lock().unwrap().push_back(result);
    }

    pub fn push_send(&self, result: GatewayResult<Signature>) {
        self.send_script.lock().unwrap().push_back(result);
    }

    /// Highest number of gateway calls ever in flight at once.
    pub fn max_inflight(&self) -> u64 {
        self.max_inflight.load(Ordering::SeqCst)
    }

    fn enter(&self, counter: &AtomicU64) -> InflightGuard<'_> {
        counter.fetch_add(1, Ordering::SeqCst);
        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(current, Ordering::SeqCst);
        InflightGuard { inflight: &self.inflight }
    }
}

struct InflightGuard<'a> {
    inflight: &'a AtomicU64,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn locate_by_reference(
        &self,
        _reference: &Reference,
        _until: Option<&Signature>,
        _commitment: Commitment,
    ) -> GatewayResult<Signature> {
        let _guard = self.enter(&self.locate_calls);
        self.locate_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::NotFound))
    }

    async fn fetch_status(&self, _signature: &Signature) -> GatewayResult<SignatureStatus> {
        let _guard = self.enter(&self.status_calls);
        self.status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::NotFound))
    }

    async fn build_and_send(
        &self,
        _from: &Address,
        _request: &PaymentRequest,
    ) -> GatewayResult<Signature> {
        let _guard = self.enter(&self.send_calls);
        self.send_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::Unreachable("no wallet scripted".into())))
    }

    async fn validate(
        &self,
        _signature: &Signature,
        _expected: &PaymentRequest,
        _commitment: Commitment,
    ) -> GatewayResult<()> {
        let _guard = self.enter(&self.validate_calls);
        self.validate_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GatewayError::NotFound))
    }
}
