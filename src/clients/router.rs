use std::time::Duration;

use crate::address::TonAddress;
use crate::cell::Cell;
use crate::config::ForwardBudgets;
use crate::error::UnderfundedForward;
use crate::messages::{
    JettonTransfer, NewFee, NewOwner, NftTransfer, TonFundingNotification, Withdraw,
    build_create_order_payload,
};
use crate::provider::{InternalMessage, SendOutcome, Sender, StackValue, TonProvider, TupleReader};
use crate::types::{EscrowVariant, InitData, RouterState, SellLeg, TradeRequest};

/// Client for one deployed router: the contract that derives an escrow
/// instance's address from init data, deploys it if absent and forwards
/// the first leg's funds — all in the single hop of one inbound transfer.
#[derive(Clone)]
pub struct RouterClient<P, S> {
    provider: P,
    sender: S,
    pub address: TonAddress,
    pub variant: EscrowVariant,
    budgets: ForwardBudgets,
}

impl<P: TonProvider, S: Sender> RouterClient<P, S> {
    pub fn new(
        provider: P,
        sender: S,
        address: TonAddress,
        variant: EscrowVariant,
        budgets: ForwardBudgets,
    ) -> Self {
        RouterClient {
            provider,
            sender,
            address,
            variant,
            budgets,
        }
    }

    /// Asks the router which address it would deploy an instance at. Must
    /// agree with [`crate::clients::escrow::EscrowClient::derive_address`];
    /// both hash the same (code, init) pair.
    pub async fn calculate_order(&self, init: &InitData) -> eyre::Result<TonAddress> {
        let args = vec![
            StackValue::address(&init.seller)?,
            StackValue::Int(init.nonce),
        ];
        let stack = self
            .provider
            .run_get_method(&self.address, "calculate_order", args)
            .await?;
        Ok(TupleReader::new(stack).read_address()?)
    }

    /// Single-hop create-and-fund for token sell legs: a transfer to the
    /// router whose forward payload carries the encoded request and init
    /// data. The forward budget must clear the configured per-variant
    /// minimum, else the send is refused before it can die as a silent
    /// bounce on-chain.
    ///
    /// # Arguments
    /// * `from_wallet` - The seller-owned sub-wallet to debit
    /// * `request` - The trade to open
    /// * `init` - The instance identity
    /// * `forward_budget` - Native coin forwarded for deploy + forward + fee
    ///
    /// # Returns
    /// * `Result<SendOutcome>` - Whatever of the cascade the provider observed
    pub async fn fund_with_jetton(
        &self,
        from_wallet: TonAddress,
        request: &TradeRequest,
        init: &InitData,
        forward_budget: u128,
    ) -> eyre::Result<SendOutcome> {
        self.check_budget(forward_budget)?;
        let SellLeg::Jetton { amount, .. } = &request.sell else {
            eyre::bail!("router variant {} takes a token sell leg", self.variant.name());
        };
        let transfer = JettonTransfer {
            query_id: 0,
            amount: *amount,
            destination: self.address,
            response_destination: self.address,
            custom_payload: None,
            forward_ton_amount: forward_budget,
            forward_payload: build_create_order_payload(request, init)?,
        };
        tracing::info!(
            router = %self.address.to_raw(),
            forward_budget,
            "routed create-and-fund (token sell leg)"
        );
        let attach = forward_budget + self.budgets.funding_attach;
        let outcome = self
            .sender
            .send(InternalMessage::new(from_wallet, attach, transfer.encode()?))
            .await?;
        Ok(outcome)
    }

    /// Single-hop create-and-fund for NFT sell legs: the item is
    /// transferred to the router, which deploys the instance and hands the
    /// item on.
    pub async fn fund_with_nft(
        &self,
        request: &TradeRequest,
        init: &InitData,
        forward_budget: u128,
    ) -> eyre::Result<SendOutcome> {
        self.check_budget(forward_budget)?;
        let SellLeg::Nft { item } = &request.sell else {
            eyre::bail!("router variant {} takes an NFT sell leg", self.variant.name());
        };
        let transfer = NftTransfer {
            query_id: 0,
            new_owner: self.address,
            response_destination: self.address,
            custom_payload: None,
            forward_ton_amount: forward_budget,
            forward_payload: build_create_order_payload(request, init)?,
        };
        tracing::info!(
            router = %self.address.to_raw(),
            forward_budget,
            "routed create-and-fund (NFT sell leg)"
        );
        let attach = forward_budget + self.budgets.funding_attach;
        let outcome = self
            .sender
            .send(InternalMessage::new(*item, attach, transfer.encode()?))
            .await?;
        Ok(outcome)
    }

    /// Create-and-fund for native-coin sell legs: a value-carrying funding
    /// notification; the attached coin covers the sell amount, the router's
    /// fee and the forward budget.
    pub async fn fund_with_ton(
        &self,
        request: &TradeRequest,
        init: &InitData,
        forward_budget: u128,
    ) -> eyre::Result<SendOutcome> {
        self.check_budget(forward_budget)?;
        let SellLeg::Ton { amount } = &request.sell else {
            eyre::bail!(
                "router variant {} takes a native-coin sell leg",
                self.variant.name()
            );
        };
        let fee = self.fee().await?;
        let body = TonFundingNotification {
            init: init.clone(),
            request: request.clone(),
        }
        .encode()?;
        let value = *amount + fee + forward_budget;
        tracing::info!(
            router = %self.address.to_raw(),
            value,
            "routed create-and-fund (native-coin sell leg)"
        );
        let outcome = self
            .sender
            .send(InternalMessage::new(self.address, value, body))
            .await?;
        Ok(outcome)
    }

    /// Confirms that a routed send actually materialized the instance. An
    /// accepted-but-underfunded forward dies as a silent bounce; from off
    /// chain that is observable only as "deploy never happened".
    pub async fn verify_forward(
        &self,
        escrow: TonAddress,
        attempts: u32,
        poll_delay: Duration,
    ) -> eyre::Result<()> {
        for _ in 0..attempts {
            if self.provider.is_deployed(&escrow).await? {
                return Ok(());
            }
            tokio::time::sleep(poll_delay).await;
        }
        Err(eyre::eyre!(
            "escrow {escrow:?} never appeared after the routed send; \
             the forward budget likely failed to cover deploy + forward + fee \
             and the transfer bounced"
        ))
    }

    pub async fn fee(&self) -> eyre::Result<u128> {
        let stack = self
            .provider
            .run_get_method(&self.address, "fee", vec![])
            .await?;
        Ok(TupleReader::new(stack).read_coins()?)
    }

    pub async fn owner(&self) -> eyre::Result<TonAddress> {
        let stack = self
            .provider
            .run_get_method(&self.address, "owner", vec![])
            .await?;
        Ok(TupleReader::new(stack).read_address()?)
    }

    pub async fn state(&self) -> eyre::Result<RouterState> {
        let stack = self
            .provider
            .run_get_method(&self.address, "state", vec![])
            .await?;
        let mut reader = TupleReader::new(stack);
        Ok(RouterState {
            owner: reader.read_address()?,
            fee: reader.read_coins()?,
        })
    }

    /// Owner-only fee change.
    pub async fn set_fee(&self, new_fee: u128) -> eyre::Result<SendOutcome> {
        self.send_admin(NewFee { new_fee }.encode()?).await
    }

    /// Owner-only ownership handover.
    pub async fn set_owner(&self, new_owner: TonAddress) -> eyre::Result<SendOutcome> {
        self.send_admin(NewOwner { new_owner }.encode()?).await
    }

    /// Owner-only withdrawal of accumulated fees.
    pub async fn withdraw(&self) -> eyre::Result<SendOutcome> {
        self.send_admin(Withdraw.encode()?).await
    }

    async fn send_admin(&self, body: Cell) -> eyre::Result<SendOutcome> {
        let outcome = self
            .sender
            .send(InternalMessage::new(
                self.address,
                self.budgets.direct_funding,
                body,
            ))
            .await?;
        Ok(outcome)
    }

    fn check_budget(&self, forward_budget: u128) -> Result<(), UnderfundedForward> {
        let required = self.budgets.min_for(self.variant);
        if forward_budget < required {
            return Err(UnderfundedForward {
                provided: forward_budget,
                required,
                variant: self.variant.name(),
            });
        }
        Ok(())
    }
}
