//! The network seam. Real deployments plug an RPC-backed provider and a
//! wallet-backed sender in here; tests plug a simulated chain. Clients are
//! generic over both, so the orchestration logic never sees the transport.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::address::{StateInit, TonAddress};
use crate::cell::Cell;
use crate::error::ProviderError;

/// Read-only chain access.
pub trait TonProvider: Clone + Send + Sync {
    /// Execute a read-only getter on a deployed account.
    fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: Vec<StackValue>,
    ) -> impl Future<Output = Result<Vec<StackValue>, ProviderError>> + Send;

    fn is_deployed(
        &self,
        address: &TonAddress,
    ) -> impl Future<Output = Result<bool, ProviderError>> + Send;

    /// The chain's view of the current unix time, in seconds.
    fn now(&self) -> u64;
}

/// An account able to sign and emit internal messages — on a live chain, a
/// wallet contract driven by an external signer.
pub trait Sender: Clone + Send + Sync {
    fn address(&self) -> TonAddress;

    fn send(
        &self,
        message: InternalMessage,
    ) -> impl Future<Output = Result<SendOutcome, ProviderError>> + Send;
}

/// One outbound internal message.
#[derive(Debug, Clone)]
pub struct InternalMessage {
    pub to: TonAddress,
    /// Attached native coin, nanocoin.
    pub value: u128,
    pub bounce: bool,
    /// Present on deploying sends.
    pub state_init: Option<StateInit>,
    pub body: Cell,
}

impl InternalMessage {
    pub fn new(to: TonAddress, value: u128, body: Cell) -> Self {
        InternalMessage {
            to,
            value,
            bounce: true,
            state_init: None,
            body,
        }
    }

    pub fn non_bounceable(mut self) -> Self {
        self.bounce = false;
        self
    }

    pub fn with_state_init(mut self, state_init: StateInit) -> Self {
        self.state_init = Some(state_init);
        self
    }
}

/// What became observable after a send. Providers that can trace the full
/// message cascade (sandboxes, indexers) fill `transactions`; fire-and-forget
/// transports leave it empty and callers fall back to polling getters.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub transactions: Vec<TxSummary>,
}

impl SendOutcome {
    /// The first failed hop, if the cascade is visible and any hop failed.
    pub fn first_failure(&self) -> Option<&TxSummary> {
        self.transactions.iter().find(|tx| !tx.success)
    }

    /// The failed hop at a specific account, if visible.
    pub fn failure_at(&self, address: &TonAddress) -> Option<&TxSummary> {
        self.transactions
            .iter()
            .find(|tx| !tx.success && tx.to == *address)
    }

    pub fn succeeded(&self) -> bool {
        self.first_failure().is_none()
    }
}

/// One hop of an observed message cascade.
#[derive(Debug, Clone)]
pub struct TxSummary {
    pub from: Option<TonAddress>,
    pub to: TonAddress,
    pub value: u128,
    pub success: bool,
    pub exit_code: i32,
    pub deployed: bool,
}

/// A value on the TVM getter stack.
#[derive(Debug, Clone)]
pub enum StackValue {
    Int(i128),
    Cell(Cell),
    /// A slice result; addresses come back this way.
    Slice(Cell),
    Null,
}

impl StackValue {
    /// Helper for address-typed getter arguments.
    pub fn address(address: &TonAddress) -> Result<StackValue, ProviderError> {
        let mut b = crate::cell::CellBuilder::new();
        b.store_address(address)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(StackValue::Slice(
            b.build().map_err(|e| ProviderError::Malformed(e.to_string()))?,
        ))
    }
}

/// Ordered reader over a getter's result stack.
pub struct TupleReader {
    items: VecDeque<StackValue>,
}

impl TupleReader {
    pub fn new(items: Vec<StackValue>) -> Self {
        TupleReader {
            items: items.into(),
        }
    }

    fn next(&mut self) -> Result<StackValue, ProviderError> {
        self.items
            .pop_front()
            .ok_or_else(|| ProviderError::Malformed("getter stack exhausted".into()))
    }

    pub fn read_int(&mut self) -> Result<i128, ProviderError> {
        match self.next()? {
            StackValue::Int(value) => Ok(value),
            other => Err(ProviderError::Malformed(format!(
                "expected int, found {other:?}"
            ))),
        }
    }

    pub fn read_u64(&mut self) -> Result<u64, ProviderError> {
        u64::try_from(self.read_int()?)
            .map_err(|_| ProviderError::Malformed("int out of u64 range".into()))
    }

    pub fn read_coins(&mut self) -> Result<u128, ProviderError> {
        u128::try_from(self.read_int()?)
            .map_err(|_| ProviderError::Malformed("negative coin amount".into()))
    }

    pub fn read_bool(&mut self) -> Result<bool, ProviderError> {
        Ok(self.read_int()? != 0)
    }

    pub fn read_cell(&mut self) -> Result<Cell, ProviderError> {
        match self.next()? {
            StackValue::Cell(cell) => Ok(cell),
            other => Err(ProviderError::Malformed(format!(
                "expected cell, found {other:?}"
            ))),
        }
    }

    pub fn read_address(&mut self) -> Result<TonAddress, ProviderError> {
        match self.read_address_opt()? {
            Some(address) => Ok(address),
            None => Err(ProviderError::Malformed("expected address, found none".into())),
        }
    }

    pub fn read_address_opt(&mut self) -> Result<Option<TonAddress>, ProviderError> {
        match self.next()? {
            StackValue::Null => Ok(None),
            StackValue::Slice(cell) => {
                let address = cell
                    .parse()
                    .load_address_opt()
                    .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                Ok(address)
            }
            other => Err(ProviderError::Malformed(format!(
                "expected address slice, found {other:?}"
            ))),
        }
    }
}

/// Shared handle helper: providers are cloned into every sub-client, so a
/// cheap `Arc` wrapper keeps custom implementations simple.
impl<P: TonProvider> TonProvider for Arc<P> {
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: Vec<StackValue>,
    ) -> Result<Vec<StackValue>, ProviderError> {
        self.as_ref().run_get_method(address, method, args).await
    }

    async fn is_deployed(&self, address: &TonAddress) -> Result<bool, ProviderError> {
        self.as_ref().is_deployed(address).await
    }

    fn now(&self) -> u64 {
        self.as_ref().now()
    }
}
