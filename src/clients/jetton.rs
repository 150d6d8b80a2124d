use std::time::Duration;

use eyre::WrapErr;

use crate::address::TonAddress;
use crate::cell::Cell;
use crate::config::ForwardBudgets;
use crate::messages::{JettonMint, JettonTransfer, JettonTransferInternal};
use crate::metadata;
use crate::provider::{InternalMessage, SendOutcome, Sender, StackValue, TonProvider, TupleReader};
use crate::types::JettonMasterData;
use crate::utils::retry_with_backoff;

const RESOLVE_ATTEMPTS: u32 = 3;
const RESOLVE_BACKOFF: Duration = Duration::from_millis(250);

/// Client for fungible-token masters and their per-owner sub-wallets.
///
/// This client provides methods for:
/// - Resolving an owner's token sub-wallet address from the master
/// - Sending transfers and reading balances
/// - Reading master state and on-chain metadata
#[derive(Clone)]
pub struct JettonClient<P, S> {
    provider: P,
    sender: S,
    budgets: ForwardBudgets,
}

impl<P: TonProvider, S: Sender> JettonClient<P, S> {
    pub fn new(provider: P, sender: S, budgets: ForwardBudgets) -> Self {
        JettonClient {
            provider,
            sender,
            budgets,
        }
    }

    /// Resolves `owner`'s sub-wallet address for a token master via the
    /// master's `get_wallet_address` getter.
    ///
    /// This is a network read and a retryable external dependency: timeouts
    /// are retried with bounded backoff, a rejection by the master is not.
    ///
    /// # Arguments
    /// * `master` - The token master address
    /// * `owner` - The wallet owner
    ///
    /// # Returns
    /// * `Result<TonAddress>` - The sub-wallet address
    pub async fn resolve_wallet_address(
        &self,
        master: TonAddress,
        owner: TonAddress,
    ) -> eyre::Result<TonAddress> {
        let address = retry_with_backoff(RESOLVE_ATTEMPTS, RESOLVE_BACKOFF, || async move {
            let args = vec![StackValue::address(&owner)?];
            let stack = self
                .provider
                .run_get_method(&master, "get_wallet_address", args)
                .await?;
            TupleReader::new(stack).read_address()
        })
        .await
        .wrap_err_with(|| format!("resolving wallet of {owner:?} under master {master:?}"))?;
        Ok(address)
    }

    /// The sending account's own sub-wallet for a token master.
    pub async fn my_wallet(&self, master: TonAddress) -> eyre::Result<TonAddress> {
        self.resolve_wallet_address(master, self.sender.address())
            .await
    }

    /// Both of an escrow instance's sub-wallets, resolved concurrently.
    /// Requests embed these so the contract can authenticate its funding
    /// notifications.
    pub async fn resolve_escrow_wallets(
        &self,
        sell_master: TonAddress,
        buy_master: TonAddress,
        escrow: TonAddress,
    ) -> eyre::Result<(TonAddress, TonAddress)> {
        futures::future::try_join(
            self.resolve_wallet_address(sell_master, escrow),
            self.resolve_wallet_address(buy_master, escrow),
        )
        .await
    }

    /// Token balance held by a sub-wallet. A wallet that was never deployed
    /// holds nothing.
    pub async fn balance(&self, wallet: TonAddress) -> eyre::Result<u128> {
        use crate::error::ProviderError;
        match self
            .provider
            .run_get_method(&wallet, "get_wallet_data", vec![])
            .await
        {
            Ok(stack) => Ok(TupleReader::new(stack).read_coins()?),
            Err(ProviderError::NotDeployed(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Full `get_jetton_data` projection of a master.
    pub async fn master_data(&self, master: TonAddress) -> eyre::Result<JettonMasterData> {
        let stack = self
            .provider
            .run_get_method(&master, "get_jetton_data", vec![])
            .await?;
        let mut reader = TupleReader::new(stack);
        Ok(JettonMasterData {
            total_supply: reader.read_coins()?,
            mintable: reader.read_bool()?,
            admin: reader.read_address()?,
            content: reader.read_cell()?,
            wallet_code: reader.read_cell()?,
        })
    }

    /// The token's declared decimal granularity, read from its on-chain
    /// content.
    pub async fn decimals(&self, master: TonAddress) -> eyre::Result<u32> {
        let data = self.master_data(master).await?;
        let fields = metadata::parse_onchain_metadata(&data.content, &["decimals"])?;
        let decimals = fields
            .get("decimals")
            .ok_or_else(|| eyre::eyre!("master {master:?} publishes no `decimals` field"))?;
        decimals
            .parse()
            .wrap_err_with(|| format!("non-numeric decimals `{decimals}`"))
    }

    /// Sends a token transfer through the sending account's own sub-wallet.
    ///
    /// # Arguments
    /// * `from_wallet` - The sender-owned sub-wallet to debit
    /// * `transfer` - The transfer envelope
    ///
    /// # Returns
    /// * `Result<SendOutcome>` - Whatever of the cascade the provider observed
    pub async fn transfer(
        &self,
        from_wallet: TonAddress,
        transfer: &JettonTransfer,
    ) -> eyre::Result<SendOutcome> {
        tracing::debug!(
            wallet = %from_wallet.to_raw(),
            amount = transfer.amount,
            destination = %transfer.destination.to_raw(),
            "sending jetton transfer"
        );
        let attach = transfer.forward_ton_amount + self.budgets.funding_attach;
        let outcome = self
            .sender
            .send(InternalMessage::new(from_wallet, attach, transfer.encode()?))
            .await?;
        Ok(outcome)
    }

    /// Admin-only mint: instructs the master to credit `destination`'s
    /// sub-wallet with freshly minted supply.
    pub async fn mint(
        &self,
        master: TonAddress,
        destination: TonAddress,
        amount: u128,
        forward_payload: Cell,
    ) -> eyre::Result<SendOutcome> {
        let mint = JettonMint {
            query_id: 0,
            destination,
            ton_amount: self.budgets.funding_attach,
            internal: JettonTransferInternal {
                query_id: 0,
                amount,
                from: master,
                response_destination: self.sender.address(),
                forward_ton_amount: 0,
                forward_payload,
            },
        };
        let attach = self.budgets.funding_attach * 2;
        let outcome = self
            .sender
            .send(InternalMessage::new(master, attach, mint.encode()?))
            .await?;
        Ok(outcome)
    }
}
