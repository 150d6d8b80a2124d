//! Rust SDK to a family of escrow ("order") contracts and their router
//! counterparts on a TON-family chain: deterministic address derivation,
//! the cell wire codec, trade lifecycle orchestration and state inspection.
//!
//! The on-chain contracts are external collaborators reached through the
//! [`provider`] seam; this crate replicates their observable wire behavior
//! — opcodes, cell layouts, getter shapes, exit codes — so off-chain
//! validation agrees with on-chain acceptance.

use clients::{
    escrow::EscrowClient, jetton::JettonClient, nft::NftClient, router::RouterClient,
};
use config::{AddressConfig, EscrowCodes};
use provider::{Sender, TonProvider};
use types::EscrowVariant;

pub mod address;
pub mod cell;
pub mod clients;
pub mod config;
pub mod error;
pub mod messages;
pub mod metadata;
pub mod provider;
pub mod types;
pub mod utils;

/// One handle per participant: the sub-clients share the participant's
/// provider and sender, plus the explicit address book — no process-global
/// registry anywhere.
#[derive(Clone)]
pub struct TondealClient<P, S> {
    pub provider: P,
    pub sender: S,

    pub config: AddressConfig,
    codes: EscrowCodes,

    pub jetton: JettonClient<P, S>,
    pub nft: NftClient<P, S>,
    pub escrow: EscrowClient<P, S>,
}

impl<P: TonProvider, S: Sender> TondealClient<P, S> {
    /// Builds a client bundle for one participant.
    ///
    /// # Arguments
    /// * `provider` - Read-only chain access
    /// * `sender` - The participant's signing/sending account
    /// * `config` - Named addresses and forward budgets for the environment
    /// * `codes` - Compiled escrow code per variant, for address derivation
    pub fn new(provider: P, sender: S, config: AddressConfig, codes: EscrowCodes) -> Self {
        let budgets = config.forward_budgets;
        TondealClient {
            jetton: JettonClient::new(provider.clone(), sender.clone(), budgets),
            nft: NftClient::new(provider.clone(), sender.clone(), budgets),
            escrow: EscrowClient::new(
                provider.clone(),
                sender.clone(),
                codes.clone(),
                budgets,
            ),
            provider,
            sender,
            config,
            codes,
        }
    }

    /// The participant's own account address.
    pub fn address(&self) -> address::TonAddress {
        self.sender.address()
    }

    /// A client for the environment's router of the given variant, if one
    /// is configured.
    pub fn router(&self, variant: EscrowVariant) -> eyre::Result<RouterClient<P, S>> {
        let address = self.config.router(variant).ok_or_else(|| {
            eyre::eyre!("no {} router in the address config", variant.name())
        })?;
        Ok(RouterClient::new(
            self.provider.clone(),
            self.sender.clone(),
            address,
            variant,
            self.config.forward_budgets,
        ))
    }

    /// Compiled escrow code for a variant, as configured.
    pub fn escrow_code(&self, variant: EscrowVariant) -> &cell::Cell {
        self.codes.code_for(variant)
    }
}
