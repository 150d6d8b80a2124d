//! Explicit configuration objects. Nothing here is process-global: every
//! client receives its piece at construction, so two clients with different
//! books can coexist in one process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::TonAddress;
use crate::cell::Cell;
use crate::types::{EscrowVariant, ONE_TON};

/// Named contract addresses for one deployment environment, loadable from
/// JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Token symbol → master address book.
    #[serde(default)]
    pub jetton_masters: BTreeMap<String, TonAddress>,
    /// Router address per escrow variant, where one is deployed.
    #[serde(default)]
    pub routers: RouterBook,
    #[serde(default)]
    pub forward_budgets: ForwardBudgets,
}

impl AddressConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn jetton_master(&self, symbol: &str) -> Option<TonAddress> {
        self.jetton_masters.get(symbol).copied()
    }

    pub fn router(&self, variant: EscrowVariant) -> Option<TonAddress> {
        self.routers.get(variant)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterBook {
    pub jetton_for_jetton: Option<TonAddress>,
    pub jetton_for_ton: Option<TonAddress>,
    pub ton_for_jetton: Option<TonAddress>,
    pub nft_for_jetton: Option<TonAddress>,
    pub nft_for_ton: Option<TonAddress>,
}

impl RouterBook {
    pub fn get(&self, variant: EscrowVariant) -> Option<TonAddress> {
        match variant {
            EscrowVariant::JettonForJetton => self.jetton_for_jetton,
            EscrowVariant::JettonForTon => self.jetton_for_ton,
            EscrowVariant::TonForJetton => self.ton_for_jetton,
            EscrowVariant::NftForJetton => self.nft_for_jetton,
            EscrowVariant::NftForTon => self.nft_for_ton,
        }
    }
}

/// Minimum forward-coin budgets for router-mediated sends, per variant.
/// A budget below the variant's minimum cannot cover the router's deploy +
/// forward + fee chain and would die as a silent bounce; clients refuse such
/// sends up front. The defaults are calibrated against the deployed
/// contracts and deliberately configuration, not literals in client code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForwardBudgets {
    pub jetton_for_jetton: u128,
    pub jetton_for_ton: u128,
    pub ton_for_jetton: u128,
    pub nft_for_jetton: u128,
    pub nft_for_ton: u128,
    /// Budget a direct (non-routed) funding transfer must attach so the
    /// escrow can process its notification.
    pub direct_funding: u128,
    /// Native coin attached on top of any forward budget to carry a send
    /// through the wallet chain's own gas.
    pub funding_attach: u128,
}

impl Default for ForwardBudgets {
    fn default() -> Self {
        ForwardBudgets {
            jetton_for_jetton: ONE_TON * 8 / 100,
            jetton_for_ton: ONE_TON * 8 / 100,
            ton_for_jetton: ONE_TON / 10,
            nft_for_jetton: ONE_TON / 5,
            nft_for_ton: ONE_TON * 24 / 100,
            direct_funding: ONE_TON / 100,
            funding_attach: ONE_TON / 10,
        }
    }
}

impl ForwardBudgets {
    pub fn min_for(&self, variant: EscrowVariant) -> u128 {
        match variant {
            EscrowVariant::JettonForJetton => self.jetton_for_jetton,
            EscrowVariant::JettonForTon => self.jetton_for_ton,
            EscrowVariant::TonForJetton => self.ton_for_jetton,
            EscrowVariant::NftForJetton => self.nft_for_jetton,
            EscrowVariant::NftForTon => self.nft_for_ton,
        }
    }
}

/// Compiled escrow code per variant. The cells come from the contract build
/// artifacts; with one of these plus an [`crate::types::InitData`] the
/// instance address is fixed without touching the network.
#[derive(Debug, Clone)]
pub struct EscrowCodes {
    pub jetton_for_jetton: Cell,
    pub jetton_for_ton: Cell,
    pub ton_for_jetton: Cell,
    pub nft_for_jetton: Cell,
    pub nft_for_ton: Cell,
}

impl EscrowCodes {
    pub fn code_for(&self, variant: EscrowVariant) -> &Cell {
        match variant {
            EscrowVariant::JettonForJetton => &self.jetton_for_jetton,
            EscrowVariant::JettonForTon => &self.jetton_for_ton,
            EscrowVariant::TonForJetton => &self.ton_for_jetton,
            EscrowVariant::NftForJetton => &self.nft_for_jetton,
            EscrowVariant::NftForTon => &self.nft_for_ton,
        }
    }
}
