use std::time::Duration;

use eyre::WrapErr;

use crate::address::{StateInit, TonAddress};
use crate::cell::Cell;
use crate::config::{EscrowCodes, ForwardBudgets};
use crate::error::{OnChainRejection, ProviderError};
use crate::messages::{Cancel, JettonTransfer, NftTransfer, TextComment};
use crate::provider::{InternalMessage, SendOutcome, Sender, TonProvider, TupleReader};
use crate::types::{BuyLeg, EscrowState, EscrowVariant, InitData, SellLeg, Stage, TradeRequest};

/// Client driving escrow instances through their lifecycle:
/// deploy → fund (sell leg) → fund (buy leg) → settle, or cancel.
///
/// The on-chain contract is authoritative over every transition; this
/// client only builds the right message for the intended transition and
/// reads the resulting state back. It never assumes two of its own sends
/// are atomic — callers read state between dependent sends.
#[derive(Clone)]
pub struct EscrowClient<P, S> {
    provider: P,
    sender: S,
    codes: EscrowCodes,
    budgets: ForwardBudgets,
}

impl<P: TonProvider, S: Sender> EscrowClient<P, S> {
    pub fn new(provider: P, sender: S, codes: EscrowCodes, budgets: ForwardBudgets) -> Self {
        EscrowClient {
            provider,
            sender,
            codes,
            budgets,
        }
    }

    /// The instance's state-init for a variant: the variant's code plus the
    /// identity data cell.
    pub fn state_init(
        &self,
        variant: EscrowVariant,
        init: &InitData,
    ) -> eyre::Result<StateInit> {
        Ok(StateInit::new(
            self.codes.code_for(variant).clone(),
            init.data_cell()?,
        ))
    }

    /// Deterministic instance address, computed without any network round
    /// trip. Same (seller, nonce) under the same code always lands here.
    pub fn derive_address(
        &self,
        variant: EscrowVariant,
        init: &InitData,
    ) -> eyre::Result<TonAddress> {
        Ok(self.state_init(variant, init)?.derive_address(0)?)
    }

    /// Deploys one instance with its request body. For native-coin sell
    /// legs the attached value also carries the sell amount, funding the
    /// instance atomically with its deploy.
    ///
    /// # Arguments
    /// * `request` - The trade being opened
    /// * `init` - The instance identity (seller + caller-supplied nonce)
    ///
    /// # Returns
    /// * `Result<(TonAddress, SendOutcome)>` - The instance address and the
    ///   observed cascade
    pub async fn deploy(
        &self,
        request: &TradeRequest,
        init: &InitData,
    ) -> eyre::Result<(TonAddress, SendOutcome)> {
        request.validate(self.provider.now())?;
        let variant = request.variant()?;
        let state_init = self.state_init(variant, init)?;
        let address = state_init.derive_address(0)?;

        let mut value = self.budgets.funding_attach;
        if variant.funds_on_deploy() {
            value += request.sell_amount().unwrap_or(0);
        }

        tracing::info!(
            escrow = %address.to_raw(),
            variant = variant.name(),
            "deploying escrow instance"
        );
        let outcome = self
            .sender
            .send(
                InternalMessage::new(address, value, request.encode()?)
                    .non_bounceable()
                    .with_state_init(state_init),
            )
            .await?;
        Ok((address, outcome))
    }

    /// Funds the sell leg of a token trade: a transfer from the seller's
    /// own sub-wallet into the escrow's, whose notification flips the
    /// instance open.
    pub async fn fund_sell_jetton(
        &self,
        escrow: TonAddress,
        request: &TradeRequest,
        from_wallet: TonAddress,
    ) -> eyre::Result<SendOutcome> {
        let SellLeg::Jetton { amount, .. } = &request.sell else {
            eyre::bail!("sell leg is not a token leg");
        };
        let transfer = JettonTransfer {
            query_id: 0,
            amount: *amount,
            destination: escrow,
            response_destination: escrow,
            custom_payload: None,
            forward_ton_amount: self.budgets.direct_funding,
            forward_payload: Cell::empty(),
        };
        let attach = self.budgets.direct_funding + self.budgets.funding_attach;
        self.send_funding(from_wallet, attach, transfer.encode()?, escrow)
            .await
    }

    /// Funds the sell leg of an NFT trade by transferring the item into the
    /// escrow's custody.
    pub async fn fund_sell_nft(
        &self,
        escrow: TonAddress,
        request: &TradeRequest,
    ) -> eyre::Result<SendOutcome> {
        let SellLeg::Nft { item } = &request.sell else {
            eyre::bail!("sell leg is not an NFT leg");
        };
        let transfer = NftTransfer {
            query_id: 0,
            new_owner: escrow,
            response_destination: escrow,
            custom_payload: None,
            forward_ton_amount: self.budgets.direct_funding,
            forward_payload: Cell::empty(),
        };
        let attach = self.budgets.direct_funding + self.budgets.funding_attach;
        self.send_funding(*item, attach, transfer.encode()?, escrow)
            .await
    }

    /// Funds the buy leg with tokens from the buyer's sub-wallet.
    pub async fn fund_buy_jetton(
        &self,
        escrow: TonAddress,
        request: &TradeRequest,
        from_wallet: TonAddress,
    ) -> eyre::Result<SendOutcome> {
        let BuyLeg::Jetton { amount, .. } = &request.buy else {
            eyre::bail!("buy leg is not a token leg");
        };
        let transfer = JettonTransfer {
            query_id: 0,
            amount: *amount,
            destination: escrow,
            response_destination: escrow,
            custom_payload: None,
            forward_ton_amount: self.budgets.direct_funding,
            forward_payload: Cell::empty(),
        };
        let attach = self.budgets.direct_funding + self.budgets.funding_attach;
        self.send_funding(from_wallet, attach, transfer.encode()?, escrow)
            .await
    }

    /// Pays a native-coin buy leg: a plain value transfer with the funding
    /// comment, carrying exactly the requested amount.
    pub async fn fund_buy_ton(
        &self,
        escrow: TonAddress,
        request: &TradeRequest,
    ) -> eyre::Result<SendOutcome> {
        let BuyLeg::Ton { amount } = &request.buy else {
            eyre::bail!("buy leg is not a native-coin leg");
        };
        let body = TextComment::new(TextComment::FUND_BUY_TON).encode()?;
        self.send_funding(escrow, *amount, body, escrow).await
    }

    /// Cancels an open instance. Seller-only; refunds the sell-side asset.
    pub async fn cancel(&self, escrow: TonAddress) -> eyre::Result<SendOutcome> {
        tracing::info!(escrow = %escrow.to_raw(), "cancelling escrow instance");
        let outcome = self
            .sender
            .send(InternalMessage::new(
                escrow,
                self.budgets.funding_attach,
                Cancel.encode()?,
            ))
            .await?;
        Ok(outcome)
    }

    async fn send_funding(
        &self,
        to: TonAddress,
        value: u128,
        body: Cell,
        escrow: TonAddress,
    ) -> eyre::Result<SendOutcome> {
        let outcome = self.sender.send(InternalMessage::new(to, value, body)).await?;
        if let Some(tx) = outcome.failure_at(&escrow) {
            let rejection = OnChainRejection::new(escrow, "funding", tx.exit_code);
            tracing::warn!(
                escrow = %escrow.to_raw(),
                exit_code = tx.exit_code,
                advice = ?rejection.advice,
                "funding rejected on-chain"
            );
        }
        Ok(outcome)
    }

    /// Classify an observed cascade into an error if the escrow itself
    /// rejected the message. Hops failing elsewhere are left to the caller.
    pub fn ensure_accepted(
        &self,
        outcome: &SendOutcome,
        escrow: TonAddress,
        operation: &'static str,
    ) -> eyre::Result<()> {
        if let Some(tx) = outcome.failure_at(&escrow) {
            return Err(OnChainRejection::new(escrow, operation, tx.exit_code).into());
        }
        Ok(())
    }

    /// Reads the instance's full state tuple back.
    ///
    /// Getter layout: seller, optional router, the request's leg fields in
    /// wire order, then the `open` and `filled` flags.
    pub async fn state(
        &self,
        escrow: TonAddress,
        variant: EscrowVariant,
    ) -> eyre::Result<EscrowState> {
        let stack = self
            .provider
            .run_get_method(&escrow, "state", vec![])
            .await?;
        let mut reader = TupleReader::new(stack);
        let seller = reader.read_address()?;
        let router = reader.read_address_opt()?;
        let request = read_request(&mut reader, variant)?;
        let open = reader.read_bool()?;
        let filled = reader.read_bool()?;
        Ok(EscrowState {
            seller,
            router,
            request,
            open,
            filled,
        })
    }

    /// Reads state and verifies the expected stage, reporting expected vs
    /// observed on mismatch so a failed choreography is diagnosable from
    /// the error alone.
    pub async fn expect_stage(
        &self,
        escrow: TonAddress,
        variant: EscrowVariant,
        expected: Stage,
    ) -> eyre::Result<EscrowState> {
        let state = self
            .state(escrow, variant)
            .await
            .wrap_err_with(|| format!("reading state of {escrow:?}"))?;
        let observed = state.stage();
        if observed != expected {
            eyre::bail!(
                "escrow {escrow:?}: expected stage {expected:?}, observed {observed:?} \
                 (open={}, filled={})",
                state.open,
                state.filled
            );
        }
        Ok(state)
    }

    /// Polls until the instance reaches a stage or attempts run out. Every
    /// on-chain hop is asynchronous; this is the feedback path between
    /// dependent sends.
    pub async fn wait_for_stage(
        &self,
        escrow: TonAddress,
        variant: EscrowVariant,
        expected: Stage,
        attempts: u32,
        poll_delay: Duration,
    ) -> eyre::Result<EscrowState> {
        let mut last: Option<Stage> = None;
        for _ in 0..attempts {
            match self.state(escrow, variant).await {
                Ok(state) => {
                    let stage = state.stage();
                    if stage == expected {
                        return Ok(state);
                    }
                    last = Some(stage);
                }
                Err(e)
                    if e.downcast_ref::<ProviderError>()
                        .is_some_and(|p| matches!(p, ProviderError::NotDeployed(_))) => {}
                Err(e) => return Err(e),
            }
            tokio::time::sleep(poll_delay).await;
        }
        eyre::bail!(
            "escrow {escrow:?} never reached {expected:?} (last observed {last:?})"
        )
    }
}

fn read_request(
    reader: &mut TupleReader,
    variant: EscrowVariant,
) -> Result<TradeRequest, ProviderError> {
    Ok(match variant {
        EscrowVariant::JettonForJetton => {
            let sell_wallet = reader.read_address()?;
            let buy_wallet = reader.read_address()?;
            let sell_master = reader.read_address()?;
            let buy_master = reader.read_address()?;
            let amount_sell = reader.read_coins()?;
            let amount_buy = reader.read_coins()?;
            let expiration_time = reader.read_u64()?;
            TradeRequest {
                sell: SellLeg::Jetton {
                    master: sell_master,
                    escrow_wallet: sell_wallet,
                    amount: amount_sell,
                },
                buy: BuyLeg::Jetton {
                    master: buy_master,
                    escrow_wallet: buy_wallet,
                    amount: amount_buy,
                },
                expiration_time,
            }
        }
        EscrowVariant::JettonForTon => {
            let sell_wallet = reader.read_address()?;
            let sell_master = reader.read_address()?;
            let amount_sell = reader.read_coins()?;
            let amount_buy = reader.read_coins()?;
            let expiration_time = reader.read_u64()?;
            TradeRequest {
                sell: SellLeg::Jetton {
                    master: sell_master,
                    escrow_wallet: sell_wallet,
                    amount: amount_sell,
                },
                buy: BuyLeg::Ton { amount: amount_buy },
                expiration_time,
            }
        }
        EscrowVariant::TonForJetton => {
            let buy_wallet = reader.read_address()?;
            let buy_master = reader.read_address()?;
            let amount_sell = reader.read_coins()?;
            let amount_buy = reader.read_coins()?;
            let expiration_time = reader.read_u64()?;
            TradeRequest {
                sell: SellLeg::Ton { amount: amount_sell },
                buy: BuyLeg::Jetton {
                    master: buy_master,
                    escrow_wallet: buy_wallet,
                    amount: amount_buy,
                },
                expiration_time,
            }
        }
        EscrowVariant::NftForJetton => {
            let item = reader.read_address()?;
            let buy_wallet = reader.read_address()?;
            let buy_master = reader.read_address()?;
            let amount_buy = reader.read_coins()?;
            let expiration_time = reader.read_u64()?;
            TradeRequest {
                sell: SellLeg::Nft { item },
                buy: BuyLeg::Jetton {
                    master: buy_master,
                    escrow_wallet: buy_wallet,
                    amount: amount_buy,
                },
                expiration_time,
            }
        }
        EscrowVariant::NftForTon => {
            let item = reader.read_address()?;
            let amount_buy = reader.read_coins()?;
            let expiration_time = reader.read_u64()?;
            TradeRequest {
                sell: SellLeg::Nft { item },
                buy: BuyLeg::Ton { amount: amount_buy },
                expiration_time,
            }
        }
    })
}
