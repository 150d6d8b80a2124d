use crate::address::TonAddress;
use crate::config::ForwardBudgets;
use crate::messages::NftTransfer;
use crate::provider::{InternalMessage, SendOutcome, Sender, StackValue, TonProvider, TupleReader};
use crate::types::NftItemData;

/// Client for NFT collections and items.
///
/// This client provides methods for:
/// - Resolving an item's address from its collection and index
/// - Reading item state (owner, content)
/// - Transferring item ownership
#[derive(Clone)]
pub struct NftClient<P, S> {
    provider: P,
    sender: S,
    budgets: ForwardBudgets,
}

impl<P: TonProvider, S: Sender> NftClient<P, S> {
    pub fn new(provider: P, sender: S, budgets: ForwardBudgets) -> Self {
        NftClient {
            provider,
            sender,
            budgets,
        }
    }

    /// The item address a collection derives for an index.
    pub async fn item_address(
        &self,
        collection: TonAddress,
        index: u64,
    ) -> eyre::Result<TonAddress> {
        let stack = self
            .provider
            .run_get_method(
                &collection,
                "get_nft_address_by_index",
                vec![StackValue::Int(index as i128)],
            )
            .await?;
        Ok(TupleReader::new(stack).read_address()?)
    }

    /// Full `get_nft_data` projection of an item.
    pub async fn item_data(&self, item: TonAddress) -> eyre::Result<NftItemData> {
        let stack = self
            .provider
            .run_get_method(&item, "get_nft_data", vec![])
            .await?;
        let mut reader = TupleReader::new(stack);
        Ok(NftItemData {
            initialized: reader.read_bool()?,
            index: reader.read_u64()?,
            collection: reader.read_address()?,
            owner: reader.read_address()?,
            content: reader.read_cell()?,
        })
    }

    pub async fn owner(&self, item: TonAddress) -> eyre::Result<TonAddress> {
        Ok(self.item_data(item).await?.owner)
    }

    /// Sends an ownership transfer to the item.
    ///
    /// # Arguments
    /// * `item` - The item to transfer
    /// * `transfer` - The transfer envelope (new owner, forward budget, payload)
    ///
    /// # Returns
    /// * `Result<SendOutcome>` - Whatever of the cascade the provider observed
    pub async fn transfer(
        &self,
        item: TonAddress,
        transfer: &NftTransfer,
    ) -> eyre::Result<SendOutcome> {
        tracing::debug!(
            item = %item.to_raw(),
            new_owner = %transfer.new_owner.to_raw(),
            "sending nft transfer"
        );
        let attach = transfer.forward_ton_amount + self.budgets.funding_attach;
        let outcome = self
            .sender
            .send(InternalMessage::new(item, attach, transfer.encode()?))
            .await?;
        Ok(outcome)
    }
}
