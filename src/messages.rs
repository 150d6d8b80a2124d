//! Typed protocol messages and their canonical cell encodings.
//!
//! Every message starts with a fixed 32-bit opcode, followed by its fields
//! in declared order: addresses in the two-component form, coin amounts as
//! VarUInteger 16, optional cells as a presence bit plus a reference, long
//! byte strings tail-chained through references. Encoding is deterministic;
//! decoding verifies the opcode first and then mirrors the contract's own
//! structural checks, so off-chain validation agrees with on-chain
//! acceptance.

use crate::address::TonAddress;
use crate::cell::{Cell, CellBuilder, CellSlice};
use crate::error::{CellError, CodecError};
use crate::types::{BuyLeg, EscrowVariant, InitData, SellLeg, TradeRequest};

/// Wire opcodes. The token and NFT envelopes are the chain-wide standards;
/// the order/router opcodes are fixed by the deployed contract build and
/// pinned here in one place.
pub mod op {
    pub const JETTON_TRANSFER: u32 = 0x0f8a7ea5;
    pub const JETTON_TRANSFER_NOTIFICATION: u32 = 0x7362d09c;
    pub const JETTON_TRANSFER_INTERNAL: u32 = 0x178d4519;
    pub const JETTON_MINT: u32 = 0x642b7d07;
    pub const NFT_TRANSFER: u32 = 0x5fcc3d14;
    pub const NFT_OWNERSHIP_ASSIGNED: u32 = 0x05138d91;
    /// Four zero bytes followed by a tail-encoded UTF-8 comment.
    pub const TEXT_COMMENT: u32 = 0x00000000;

    pub const REQUEST_JETTON_JETTON: u32 = 0x9e6b2c41;
    pub const REQUEST_JETTON_TON: u32 = 0x4f22cf9e;
    pub const REQUEST_TON_JETTON: u32 = 0xb15aa1b2;
    pub const REQUEST_NFT_JETTON: u32 = 0x25d4157a;
    pub const REQUEST_NFT_TON: u32 = 0x66f8d2c1;
    pub const TON_FUNDING_NOTIFICATION: u32 = 0x1ad4f0aa;
    pub const CANCEL: u32 = 0xc2d7f22a;
    pub const NEW_FEE: u32 = 0x18f6f7c9;
    pub const NEW_OWNER: u32 = 0x93b5433e;
    pub const WITHDRAW: u32 = 0xb5de5f9e;
}

fn enc(e: CellError) -> CodecError {
    CodecError::Encode(e)
}

fn dec(e: CellError) -> CodecError {
    CodecError::Decode(e)
}

/// Read a body's opcode without consuming the rest.
pub fn peek_opcode(body: &Cell) -> Result<u32, CodecError> {
    body.parse().load_uint(32).map(|v| v as u32).map_err(dec)
}

fn expect_opcode(slice: &mut CellSlice, expected: u32) -> Result<(), CodecError> {
    let found = slice.load_uint(32).map_err(dec)? as u32;
    if found != expected {
        return Err(CodecError::OpcodeMismatch { expected, found });
    }
    Ok(())
}

/// Forward payloads travel either inline (cleared bit plus the remaining
/// slice) or as a reference (set bit). Encoding is always inline here;
/// decoding accepts both.
fn store_either_payload(builder: &mut CellBuilder, payload: &Cell) -> Result<(), CellError> {
    builder.store_bit(false)?;
    builder.store_slice(&payload.parse())?;
    Ok(())
}

fn load_either_payload(slice: &mut CellSlice) -> Result<Cell, CellError> {
    if slice.load_bit()? {
        Ok(slice.load_ref()?.as_ref().clone())
    } else {
        slice.to_cell()
    }
}

/// Standard fungible-token transfer envelope, sent to the sender's own
/// token sub-wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransfer {
    pub query_id: u64,
    pub amount: u128,
    pub destination: TonAddress,
    pub response_destination: TonAddress,
    pub custom_payload: Option<Cell>,
    pub forward_ton_amount: u128,
    pub forward_payload: Cell,
}

impl JettonTransfer {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::JETTON_TRANSFER as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_coins(self.amount))
            .and_then(|b| b.store_address(&self.destination))
            .and_then(|b| b.store_address(&self.response_destination))
            .and_then(|b| b.store_maybe_ref(self.custom_payload.clone()))
            .and_then(|b| b.store_coins(self.forward_ton_amount))
            .map_err(enc)?;
        store_either_payload(&mut b, &self.forward_payload).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::JETTON_TRANSFER)?;
        Ok(JettonTransfer {
            query_id: s.load_uint(64).map_err(dec)?,
            amount: s.load_coins().map_err(dec)?,
            destination: s.load_address().map_err(dec)?,
            response_destination: s.load_address().map_err(dec)?,
            custom_payload: s
                .load_maybe_ref()
                .map_err(dec)?
                .map(|c| c.as_ref().clone()),
            forward_ton_amount: s.load_coins().map_err(dec)?,
            forward_payload: load_either_payload(&mut s).map_err(dec)?,
        })
    }
}

/// What a token sub-wallet tells its owner after crediting an inbound
/// transfer. `sender` is the owner of the wallet the tokens came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransferNotification {
    pub query_id: u64,
    pub amount: u128,
    pub sender: TonAddress,
    pub forward_payload: Cell,
}

impl JettonTransferNotification {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::JETTON_TRANSFER_NOTIFICATION as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_coins(self.amount))
            .and_then(|b| b.store_address(&self.sender))
            .map_err(enc)?;
        store_either_payload(&mut b, &self.forward_payload).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::JETTON_TRANSFER_NOTIFICATION)?;
        Ok(JettonTransferNotification {
            query_id: s.load_uint(64).map_err(dec)?,
            amount: s.load_coins().map_err(dec)?,
            sender: s.load_address().map_err(dec)?,
            forward_payload: load_either_payload(&mut s).map_err(dec)?,
        })
    }
}

/// Wallet-to-wallet credit leg of a token transfer; also the body a minter
/// wraps when it credits freshly minted supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonTransferInternal {
    pub query_id: u64,
    pub amount: u128,
    pub from: TonAddress,
    pub response_destination: TonAddress,
    pub forward_ton_amount: u128,
    pub forward_payload: Cell,
}

impl JettonTransferInternal {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::JETTON_TRANSFER_INTERNAL as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_coins(self.amount))
            .and_then(|b| b.store_address(&self.from))
            .and_then(|b| b.store_address(&self.response_destination))
            .and_then(|b| b.store_coins(self.forward_ton_amount))
            .map_err(enc)?;
        store_either_payload(&mut b, &self.forward_payload).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::JETTON_TRANSFER_INTERNAL)?;
        Ok(JettonTransferInternal {
            query_id: s.load_uint(64).map_err(dec)?,
            amount: s.load_coins().map_err(dec)?,
            from: s.load_address().map_err(dec)?,
            response_destination: s.load_address().map_err(dec)?,
            forward_ton_amount: s.load_coins().map_err(dec)?,
            forward_payload: load_either_payload(&mut s).map_err(dec)?,
        })
    }
}

/// Admin-only mint instruction to a token master. The wrapped internal
/// transfer is what the recipient's wallet eventually executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonMint {
    pub query_id: u64,
    pub destination: TonAddress,
    pub ton_amount: u128,
    pub internal: JettonTransferInternal,
}

impl JettonMint {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::JETTON_MINT as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_address(&self.destination))
            .and_then(|b| b.store_coins(self.ton_amount))
            .map_err(enc)?;
        b.store_ref(self.internal.encode()?).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::JETTON_MINT)?;
        Ok(JettonMint {
            query_id: s.load_uint(64).map_err(dec)?,
            destination: s.load_address().map_err(dec)?,
            ton_amount: s.load_coins().map_err(dec)?,
            internal: JettonTransferInternal::decode(s.load_ref().map_err(dec)?.as_ref())?,
        })
    }
}

/// Standard NFT ownership transfer, sent to the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTransfer {
    pub query_id: u64,
    pub new_owner: TonAddress,
    pub response_destination: TonAddress,
    pub custom_payload: Option<Cell>,
    pub forward_ton_amount: u128,
    pub forward_payload: Cell,
}

impl NftTransfer {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::NFT_TRANSFER as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_address(&self.new_owner))
            .and_then(|b| b.store_address(&self.response_destination))
            .and_then(|b| b.store_maybe_ref(self.custom_payload.clone()))
            .and_then(|b| b.store_coins(self.forward_ton_amount))
            .map_err(enc)?;
        store_either_payload(&mut b, &self.forward_payload).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::NFT_TRANSFER)?;
        Ok(NftTransfer {
            query_id: s.load_uint(64).map_err(dec)?,
            new_owner: s.load_address().map_err(dec)?,
            response_destination: s.load_address().map_err(dec)?,
            custom_payload: s
                .load_maybe_ref()
                .map_err(dec)?
                .map(|c| c.as_ref().clone()),
            forward_ton_amount: s.load_coins().map_err(dec)?,
            forward_payload: load_either_payload(&mut s).map_err(dec)?,
        })
    }
}

/// What an NFT item tells its new owner after an ownership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftOwnershipAssigned {
    pub query_id: u64,
    pub prev_owner: TonAddress,
    pub forward_payload: Cell,
}

impl NftOwnershipAssigned {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::NFT_OWNERSHIP_ASSIGNED as u64, 32)
            .and_then(|b| b.store_uint(self.query_id, 64))
            .and_then(|b| b.store_address(&self.prev_owner))
            .map_err(enc)?;
        b.store_slice(&self.forward_payload.parse()).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::NFT_OWNERSHIP_ASSIGNED)?;
        Ok(NftOwnershipAssigned {
            query_id: s.load_uint(64).map_err(dec)?,
            prev_owner: s.load_address().map_err(dec)?,
            forward_payload: s.to_cell().map_err(dec)?,
        })
    }
}

/// Plain text message: four zero bytes, then the comment. The buy-TON
/// funding path and the bare cancel both travel this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextComment {
    pub text: String,
}

impl TextComment {
    pub const FUND_BUY_TON: &'static str = "transfer ton";
    pub const CANCEL: &'static str = "cancel";

    pub fn new(text: impl Into<String>) -> Self {
        TextComment { text: text.into() }
    }

    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::TEXT_COMMENT as u64, 32).map_err(enc)?;
        b.store_string_tail(&self.text).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::TEXT_COMMENT)?;
        Ok(TextComment {
            text: s.load_string_tail().map_err(dec)?,
        })
    }
}

impl TradeRequest {
    /// Wire opcode of this request's contract shape.
    pub fn opcode(&self) -> Result<u32, CodecError> {
        Ok(match self.variant()? {
            EscrowVariant::JettonForJetton => op::REQUEST_JETTON_JETTON,
            EscrowVariant::JettonForTon => op::REQUEST_JETTON_TON,
            EscrowVariant::TonForJetton => op::REQUEST_TON_JETTON,
            EscrowVariant::NftForJetton => op::REQUEST_NFT_JETTON,
            EscrowVariant::NftForTon => op::REQUEST_NFT_TON,
        })
    }

    /// Encode the per-variant request body. Only the token-for-token shape
    /// exceeds one cell's bit budget; its tail (buy master and amounts)
    /// continues in a single chained reference, matching the contract's
    /// static field layout.
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let opcode = self.opcode()?;
        let mut b = CellBuilder::new();
        b.store_uint(opcode as u64, 32).map_err(enc)?;
        match (&self.sell, &self.buy) {
            (
                SellLeg::Jetton {
                    master: sell_master,
                    escrow_wallet: sell_wallet,
                    amount: amount_sell,
                },
                BuyLeg::Jetton {
                    master: buy_master,
                    escrow_wallet: buy_wallet,
                    amount: amount_buy,
                },
            ) => {
                b.store_address(sell_wallet)
                    .and_then(|b| b.store_address(buy_wallet))
                    .and_then(|b| b.store_address(sell_master))
                    .map_err(enc)?;
                let mut tail = CellBuilder::new();
                tail.store_address(buy_master)
                    .and_then(|t| t.store_coins(*amount_sell))
                    .and_then(|t| t.store_coins(*amount_buy))
                    .and_then(|t| t.store_uint(self.expiration_time, 64))
                    .map_err(enc)?;
                b.store_ref(tail.build().map_err(enc)?).map_err(enc)?;
            }
            (
                SellLeg::Jetton {
                    master,
                    escrow_wallet,
                    amount: amount_sell,
                },
                BuyLeg::Ton { amount: amount_buy },
            ) => {
                b.store_address(escrow_wallet)
                    .and_then(|b| b.store_address(master))
                    .and_then(|b| b.store_coins(*amount_sell))
                    .and_then(|b| b.store_coins(*amount_buy))
                    .and_then(|b| b.store_uint(self.expiration_time, 64))
                    .map_err(enc)?;
            }
            (
                SellLeg::Ton { amount: amount_sell },
                BuyLeg::Jetton {
                    master,
                    escrow_wallet,
                    amount: amount_buy,
                },
            ) => {
                b.store_address(escrow_wallet)
                    .and_then(|b| b.store_address(master))
                    .and_then(|b| b.store_coins(*amount_sell))
                    .and_then(|b| b.store_coins(*amount_buy))
                    .and_then(|b| b.store_uint(self.expiration_time, 64))
                    .map_err(enc)?;
            }
            (
                SellLeg::Nft { item },
                BuyLeg::Jetton {
                    master,
                    escrow_wallet,
                    amount: amount_buy,
                },
            ) => {
                b.store_address(item)
                    .and_then(|b| b.store_address(escrow_wallet))
                    .and_then(|b| b.store_address(master))
                    .and_then(|b| b.store_coins(*amount_buy))
                    .and_then(|b| b.store_uint(self.expiration_time, 64))
                    .map_err(enc)?;
            }
            (SellLeg::Nft { item }, BuyLeg::Ton { amount: amount_buy }) => {
                b.store_address(item)
                    .and_then(|b| b.store_coins(*amount_buy))
                    .and_then(|b| b.store_uint(self.expiration_time, 64))
                    .map_err(enc)?;
            }
            (SellLeg::Ton { .. }, BuyLeg::Ton { .. }) => unreachable!("rejected by opcode()"),
        }
        b.build().map_err(enc)
    }

    /// Decode any request body, dispatching on the opcode.
    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        let opcode = s.load_uint(32).map_err(dec)? as u32;
        match opcode {
            op::REQUEST_JETTON_JETTON => {
                let sell_wallet = s.load_address().map_err(dec)?;
                let buy_wallet = s.load_address().map_err(dec)?;
                let sell_master = s.load_address().map_err(dec)?;
                let tail = s.load_ref().map_err(dec)?;
                let mut t = CellSlice::new(tail);
                let buy_master = t.load_address().map_err(dec)?;
                let amount_sell = t.load_coins().map_err(dec)?;
                let amount_buy = t.load_coins().map_err(dec)?;
                let expiration_time = t.load_uint(64).map_err(dec)?;
                Ok(TradeRequest {
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
                })
            }
            op::REQUEST_JETTON_TON => {
                let escrow_wallet = s.load_address().map_err(dec)?;
                let master = s.load_address().map_err(dec)?;
                let amount_sell = s.load_coins().map_err(dec)?;
                let amount_buy = s.load_coins().map_err(dec)?;
                let expiration_time = s.load_uint(64).map_err(dec)?;
                Ok(TradeRequest {
                    sell: SellLeg::Jetton {
                        master,
                        escrow_wallet,
                        amount: amount_sell,
                    },
                    buy: BuyLeg::Ton { amount: amount_buy },
                    expiration_time,
                })
            }
            op::REQUEST_TON_JETTON => {
                let escrow_wallet = s.load_address().map_err(dec)?;
                let master = s.load_address().map_err(dec)?;
                let amount_sell = s.load_coins().map_err(dec)?;
                let amount_buy = s.load_coins().map_err(dec)?;
                let expiration_time = s.load_uint(64).map_err(dec)?;
                Ok(TradeRequest {
                    sell: SellLeg::Ton { amount: amount_sell },
                    buy: BuyLeg::Jetton {
                        master,
                        escrow_wallet,
                        amount: amount_buy,
                    },
                    expiration_time,
                })
            }
            op::REQUEST_NFT_JETTON => {
                let item = s.load_address().map_err(dec)?;
                let escrow_wallet = s.load_address().map_err(dec)?;
                let master = s.load_address().map_err(dec)?;
                let amount_buy = s.load_coins().map_err(dec)?;
                let expiration_time = s.load_uint(64).map_err(dec)?;
                Ok(TradeRequest {
                    sell: SellLeg::Nft { item },
                    buy: BuyLeg::Jetton {
                        master,
                        escrow_wallet,
                        amount: amount_buy,
                    },
                    expiration_time,
                })
            }
            op::REQUEST_NFT_TON => {
                let item = s.load_address().map_err(dec)?;
                let amount_buy = s.load_coins().map_err(dec)?;
                let expiration_time = s.load_uint(64).map_err(dec)?;
                Ok(TradeRequest {
                    sell: SellLeg::Nft { item },
                    buy: BuyLeg::Ton { amount: amount_buy },
                    expiration_time,
                })
            }
            found => Err(CodecError::OpcodeMismatch {
                expected: op::REQUEST_JETTON_JETTON,
                found,
            }),
        }
    }
}

impl InitData {
    /// Bare field encoding: seller, optional fee recipient, 257-bit nonce.
    /// This is the form embedded in router payloads.
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_address(&self.seller).map_err(enc)?;
        if let Some(fee_recipient) = &self.fee_recipient {
            b.store_address(fee_recipient).map_err(enc)?;
        }
        b.store_int(self.nonce, 257).map_err(enc)?;
        b.build().map_err(enc)
    }

    /// Inverse of [`InitData::encode`]. The optional fee recipient is
    /// detected structurally: without it exactly the 257 nonce bits remain
    /// after the seller.
    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        let seller = s.load_address().map_err(dec)?;
        let fee_recipient = if s.remaining_bits() > 257 {
            Some(s.load_address().map_err(dec)?)
        } else {
            None
        };
        let nonce = s.load_int(257).map_err(dec)?;
        Ok(InitData {
            seller,
            nonce,
            fee_recipient,
        })
    }

    /// The contract's initial storage cell: a cleared lazy-init flag, then
    /// the identity fields. Hashing this with the variant's code fixes the
    /// instance address.
    pub fn data_cell(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_bit(false).map_err(enc)?;
        b.store_slice(&self.encode()?.parse()).map_err(enc)?;
        b.build().map_err(enc)
    }
}

/// Value-carrying funding notification for the native-coin-sell variant
/// routed path: the router derives the instance from the init data, deploys
/// it if absent and forwards the attached coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonFundingNotification {
    pub init: InitData,
    pub request: TradeRequest,
}

impl TonFundingNotification {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::TON_FUNDING_NOTIFICATION as u64, 32)
            .map_err(enc)?;
        b.store_ref(self.init.encode()?).map_err(enc)?;
        b.store_ref(self.request.encode()?).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::TON_FUNDING_NOTIFICATION)?;
        let init = InitData::decode(s.load_ref().map_err(dec)?.as_ref())?;
        let request = TradeRequest::decode(s.load_ref().map_err(dec)?.as_ref())?;
        Ok(TonFundingNotification { init, request })
    }
}

/// Seller-only order cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancel;

impl Cancel {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::CANCEL as u64, 32).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::CANCEL)?;
        Ok(Cancel)
    }
}

/// Router fee change, owner only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFee {
    pub new_fee: u128,
}

impl NewFee {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::NEW_FEE as u64, 32)
            .and_then(|b| b.store_coins(self.new_fee))
            .map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::NEW_FEE)?;
        Ok(NewFee {
            new_fee: s.load_coins().map_err(dec)?,
        })
    }
}

/// Router ownership handover, owner only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOwner {
    pub new_owner: TonAddress,
}

impl NewOwner {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::NEW_OWNER as u64, 32)
            .and_then(|b| b.store_address(&self.new_owner))
            .map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::NEW_OWNER)?;
        Ok(NewOwner {
            new_owner: s.load_address().map_err(dec)?,
        })
    }
}

/// Withdraw accumulated router fees to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdraw;

impl Withdraw {
    pub fn encode(&self) -> Result<Cell, CodecError> {
        let mut b = CellBuilder::new();
        b.store_uint(op::WITHDRAW as u64, 32).map_err(enc)?;
        b.build().map_err(enc)
    }

    pub fn decode(body: &Cell) -> Result<Self, CodecError> {
        let mut s = body.parse();
        expect_opcode(&mut s, op::WITHDRAW)?;
        Ok(Withdraw)
    }
}

/// The create-and-fund forward payload a router expects: one cell whose two
/// references carry the encoded request and the encoded init data.
pub fn build_create_order_payload(
    request: &TradeRequest,
    init: &InitData,
) -> Result<Cell, CodecError> {
    let mut b = CellBuilder::new();
    b.store_ref(request.encode()?).map_err(enc)?;
    b.store_ref(init.encode()?).map_err(enc)?;
    b.build().map_err(enc)
}

/// Inverse of [`build_create_order_payload`].
pub fn parse_create_order_payload(
    payload: &Cell,
) -> Result<(TradeRequest, InitData), CodecError> {
    let mut s = payload.parse();
    let request = TradeRequest::decode(s.load_ref().map_err(dec)?.as_ref())?;
    let init = InitData::decode(s.load_ref().map_err(dec)?.as_ref())?;
    Ok((request, init))
}
