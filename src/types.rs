//! Domain model: trade legs, requests, instance identity and the read-only
//! escrow state projection.

use crate::address::TonAddress;
use crate::error::CodecError;

/// Nanocoin granularity of the native coin.
pub const ONE_TON: u128 = 1_000_000_000;

/// The asset a seller locks into an escrow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellLeg {
    /// Fungible tokens. `escrow_wallet` is the escrow instance's own
    /// sub-wallet for this token master — part of the request so the
    /// contract can authenticate its funding notification.
    Jetton {
        master: TonAddress,
        escrow_wallet: TonAddress,
        amount: u128,
    },
    /// Native coin, attached to the deploy message itself.
    Ton { amount: u128 },
    /// A single NFT item, delivered by ownership transfer.
    Nft { item: TonAddress },
}

/// The asset the buyer must deliver to fill the trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyLeg {
    Jetton {
        master: TonAddress,
        escrow_wallet: TonAddress,
        amount: u128,
    },
    Ton { amount: u128 },
}

/// The five deployed contract shapes, one per leg combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscrowVariant {
    JettonForJetton,
    JettonForTon,
    TonForJetton,
    NftForJetton,
    NftForTon,
}

impl EscrowVariant {
    pub fn name(&self) -> &'static str {
        match self {
            EscrowVariant::JettonForJetton => "jetton-for-jetton",
            EscrowVariant::JettonForTon => "jetton-for-ton",
            EscrowVariant::TonForJetton => "ton-for-jetton",
            EscrowVariant::NftForJetton => "nft-for-jetton",
            EscrowVariant::NftForTon => "nft-for-ton",
        }
    }

    /// Whether deploy itself carries the sell-side funding, skipping the
    /// awaiting-sell-funding stage entirely.
    pub fn funds_on_deploy(&self) -> bool {
        matches!(self, EscrowVariant::TonForJetton)
    }
}

/// One trade: what the seller offers, what they want for it, and until when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub sell: SellLeg,
    pub buy: BuyLeg,
    /// Unix seconds. Buy-side funding after this instant is rejected.
    pub expiration_time: u64,
}

impl TradeRequest {
    /// Maps the leg pair onto the deployed contract shape. Combinations no
    /// contract exists for are encoding errors, caught before anything is
    /// sent.
    pub fn variant(&self) -> Result<EscrowVariant, CodecError> {
        match (&self.sell, &self.buy) {
            (SellLeg::Jetton { .. }, BuyLeg::Jetton { .. }) => Ok(EscrowVariant::JettonForJetton),
            (SellLeg::Jetton { .. }, BuyLeg::Ton { .. }) => Ok(EscrowVariant::JettonForTon),
            (SellLeg::Ton { .. }, BuyLeg::Jetton { .. }) => Ok(EscrowVariant::TonForJetton),
            (SellLeg::Nft { .. }, BuyLeg::Jetton { .. }) => Ok(EscrowVariant::NftForJetton),
            (SellLeg::Nft { .. }, BuyLeg::Ton { .. }) => Ok(EscrowVariant::NftForTon),
            (SellLeg::Ton { .. }, BuyLeg::Ton { .. }) => Err(CodecError::InvalidField(
                "native coin on both legs is not a trade".into(),
            )),
        }
    }

    /// Field-level validity: strictly positive amounts and an expiration in
    /// the future relative to `now`.
    pub fn validate(&self, now: u64) -> Result<(), CodecError> {
        self.variant()?;
        if self.sell_amount() == Some(0) {
            return Err(CodecError::InvalidField(
                "sell amount must be positive".into(),
            ));
        }
        if self.buy_amount() == 0 {
            return Err(CodecError::InvalidField(
                "buy amount must be positive".into(),
            ));
        }
        if self.expiration_time <= now {
            return Err(CodecError::InvalidField(format!(
                "expiration {} is not after now {}",
                self.expiration_time, now
            )));
        }
        Ok(())
    }

    /// The sell leg's amount, `None` for NFT legs.
    pub fn sell_amount(&self) -> Option<u128> {
        match &self.sell {
            SellLeg::Jetton { amount, .. } | SellLeg::Ton { amount } => Some(*amount),
            SellLeg::Nft { .. } => None,
        }
    }

    pub fn buy_amount(&self) -> u128 {
        match &self.buy {
            BuyLeg::Jetton { amount, .. } | BuyLeg::Ton { amount } => *amount,
        }
    }
}

/// The immutable identity of one escrow instance. Together with the
/// variant's code cell this fixes the instance's address.
///
/// The nonce is a caller-supplied uniqueness token (conventionally a
/// millisecond timestamp). Two deploys by the same seller with the same
/// nonce derive the same address — the second one silently targets the
/// first instance, so callers that may deploy twice within a millisecond
/// must salt the nonce themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pub seller: TonAddress,
    pub nonce: i128,
    /// Present only for the native-coin-sell variant, whose deployed
    /// contract routes its service fee through a dedicated wallet.
    pub fee_recipient: Option<TonAddress>,
}

impl InitData {
    pub fn new(seller: TonAddress, nonce: i128) -> Self {
        InitData {
            seller,
            nonce,
            fee_recipient: None,
        }
    }

    pub fn with_fee_recipient(seller: TonAddress, fee_recipient: TonAddress, nonce: i128) -> Self {
        InitData {
            seller,
            nonce,
            fee_recipient: Some(fee_recipient),
        }
    }
}

/// Lifecycle stage as projected from the on-chain `state` getter. The
/// chain is authoritative; this is rebuilt from getter reads, never cached
/// across sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Deployed, sell leg not yet funded.
    AwaitingSellFunding,
    /// Sell leg funded; waiting for the buy side.
    Open,
    /// Both legs settled. Terminal.
    Filled,
}

/// Read-only projection of one deployed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowState {
    pub seller: TonAddress,
    pub router: Option<TonAddress>,
    pub request: TradeRequest,
    pub open: bool,
    pub filled: bool,
}

impl EscrowState {
    pub fn stage(&self) -> Stage {
        if self.filled {
            Stage::Filled
        } else if self.open {
            Stage::Open
        } else {
            Stage::AwaitingSellFunding
        }
    }
}

/// Router contract configuration as read back from its getters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterState {
    pub owner: TonAddress,
    pub fee: u128,
}

/// `get_jetton_data` projection of a token master.
#[derive(Debug, Clone)]
pub struct JettonMasterData {
    pub total_supply: u128,
    pub mintable: bool,
    pub admin: TonAddress,
    pub content: crate::cell::Cell,
    pub wallet_code: crate::cell::Cell,
}

/// `get_nft_data` projection of an NFT item.
#[derive(Debug, Clone)]
pub struct NftItemData {
    pub initialized: bool,
    pub index: u64,
    pub collection: TonAddress,
    pub owner: TonAddress,
    pub content: crate::cell::Cell,
}
