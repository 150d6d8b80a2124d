use thiserror::Error;

use crate::address::TonAddress;

/// Failures while building or reading cells.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CellError {
    #[error("cell data overflow: {over} bits over the 1023-bit budget")]
    DataOverflow { over: usize },

    #[error("cell reference overflow: a cell holds at most 4 references")]
    RefOverflow,

    #[error("value {value} does not fit into {bits} bits")]
    ValueOutOfRange { value: String, bits: usize },

    #[error("cell data underflow: wanted {wanted} bits, {available} available")]
    DataUnderflow { wanted: usize, available: usize },

    #[error("cell reference underflow")]
    RefUnderflow,

    #[error("malformed address prefix {tag:#04b}")]
    BadAddressTag { tag: u8 },

    #[error("malformed dictionary: {0}")]
    BadDictionary(String),
}

/// Failures while encoding or decoding typed protocol messages.
///
/// Encoding failures are fatal to the current operation and must not be
/// retried with the same input; decoding failures mirror the on-chain
/// contract's own rejection of a structurally short or mistagged body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding failed: {0}")]
    Encode(#[source] CellError),

    #[error("decoding failed: {0}")]
    Decode(#[source] CellError),

    #[error("opcode mismatch: expected {expected:#010x}, found {found:#010x}")]
    OpcodeMismatch { expected: u32, found: u32 },

    #[error("invalid field: {0}")]
    InvalidField(String),
}

/// Failures at the network seam.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("get method `{method}` on {address} timed out")]
    Timeout { address: TonAddress, method: String },

    #[error("get method `{method}` on {address} rejected: {detail}")]
    Rejected {
        address: TonAddress,
        method: String,
        detail: String,
    },

    #[error("account {0} is not deployed")]
    NotDeployed(TonAddress),

    #[error("malformed getter result: {0}")]
    Malformed(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Whether the failure is worth another attempt with the same inputs.
    /// On-chain rejections are authoritative; timeouts and transport hiccups
    /// are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::Transport(_)
        )
    }
}

/// Exit codes surfaced by the order and router contracts. The numbering is
/// contract API surface and differs between the native-coin and token legs
/// on purpose.
pub mod exit_code {
    /// Message body carried an opcode the contract does not accept.
    pub const INVALID_MESSAGE: i32 = 130;
    /// Sender is not the recorded seller / owner.
    pub const ACCESS_DENIED: i32 = 132;
    /// The current lifecycle stage forbids the operation.
    pub const WRONG_STAGE: i32 = 133;
    /// Notification arrived from an account that is not the expected
    /// escrow sub-wallet (or NFT item).
    pub const WRONG_NOTIFIER: i32 = 136;
    /// Attached native-coin value does not match the requested leg amount.
    pub const TON_AMOUNT_MISMATCH: i32 = 37;
    /// Notified token amount does not match the requested leg amount.
    pub const JETTON_AMOUNT_MISMATCH: i32 = 39;
    /// Buy-side funding arrived before the sell leg was funded.
    pub const SELL_LEG_NOT_FUNDED: i32 = 40;
    /// Sell-side funding arrived when the sell leg was already funded.
    pub const ALREADY_FUNDED: i32 = 41;
    /// The request's expiration time has passed.
    pub const EXPIRED: i32 = 42;
}

/// Classified on-chain rejection. Raw exit codes are kept reachable so
/// failures stay diagnosable without re-deriving the trade by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownMessage,
    NotSeller,
    WrongStage,
    WrongNotifier,
    TonAmountMismatch,
    JettonAmountMismatch,
    SellLegNotFunded,
    AlreadyFunded,
    Expired,
    Other(i32),
}

/// What a caller may do about a classified rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAdvice {
    /// The payload itself is wrong; rebuild it before any retry.
    RebuildPayload,
    /// The instance is not in the right stage yet; re-read state and retry
    /// once the prerequisite transition is observed.
    RetryAfterStateChange,
    /// The instance is spent; a fresh nonce and a new deploy are required.
    NewInstance,
    /// Retrying can never succeed with any payload from this sender.
    NeverRetry,
}

impl Rejection {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            exit_code::INVALID_MESSAGE => Rejection::UnknownMessage,
            exit_code::ACCESS_DENIED => Rejection::NotSeller,
            exit_code::WRONG_STAGE => Rejection::WrongStage,
            exit_code::WRONG_NOTIFIER => Rejection::WrongNotifier,
            exit_code::TON_AMOUNT_MISMATCH => Rejection::TonAmountMismatch,
            exit_code::JETTON_AMOUNT_MISMATCH => Rejection::JettonAmountMismatch,
            exit_code::SELL_LEG_NOT_FUNDED => Rejection::SellLegNotFunded,
            exit_code::ALREADY_FUNDED => Rejection::AlreadyFunded,
            exit_code::EXPIRED => Rejection::Expired,
            other => Rejection::Other(other),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Rejection::UnknownMessage => exit_code::INVALID_MESSAGE,
            Rejection::NotSeller => exit_code::ACCESS_DENIED,
            Rejection::WrongStage => exit_code::WRONG_STAGE,
            Rejection::WrongNotifier => exit_code::WRONG_NOTIFIER,
            Rejection::TonAmountMismatch => exit_code::TON_AMOUNT_MISMATCH,
            Rejection::JettonAmountMismatch => exit_code::JETTON_AMOUNT_MISMATCH,
            Rejection::SellLegNotFunded => exit_code::SELL_LEG_NOT_FUNDED,
            Rejection::AlreadyFunded => exit_code::ALREADY_FUNDED,
            Rejection::Expired => exit_code::EXPIRED,
            Rejection::Other(code) => *code,
        }
    }

    pub fn advice(&self) -> RetryAdvice {
        match self {
            Rejection::TonAmountMismatch | Rejection::JettonAmountMismatch => {
                RetryAdvice::RebuildPayload
            }
            Rejection::SellLegNotFunded => RetryAdvice::RetryAfterStateChange,
            Rejection::Expired => RetryAdvice::NewInstance,
            Rejection::UnknownMessage
            | Rejection::NotSeller
            | Rejection::WrongStage
            | Rejection::WrongNotifier
            | Rejection::AlreadyFunded
            | Rejection::Other(_) => RetryAdvice::NeverRetry,
        }
    }
}

/// A message the contract refused, with enough context to diagnose the
/// failure without replaying the trade.
#[derive(Debug, Error)]
#[error(
    "{operation} rejected by {address} with exit code {exit_code} ({rejection:?}, advice {advice:?})"
)]
pub struct OnChainRejection {
    pub address: TonAddress,
    pub operation: &'static str,
    pub exit_code: i32,
    pub rejection: Rejection,
    pub advice: RetryAdvice,
}

impl OnChainRejection {
    pub fn new(address: TonAddress, operation: &'static str, exit_code: i32) -> Self {
        let rejection = Rejection::from_exit_code(exit_code);
        OnChainRejection {
            address,
            operation,
            exit_code,
            rejection,
            advice: rejection.advice(),
        }
    }
}

/// A router send whose attached forward budget cannot cover deploy,
/// forward and fee. On-chain this fails as a silent bounce; the client
/// refuses it up front instead.
#[derive(Debug, Error)]
#[error("forward budget {provided} below the configured minimum {required} for {variant}")]
pub struct UnderfundedForward {
    pub provided: u128,
    pub required: u128,
    pub variant: &'static str,
}
