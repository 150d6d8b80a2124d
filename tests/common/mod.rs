//! In-process chain simulation used by the scenario tests. It implements
//! the observable behavior of every collaborator contract — token masters
//! and wallets, NFT collections and items, the five escrow shapes and their
//! routers — including the exit codes the deployed contracts answer with,
//! so lifecycle tests exercise the real choreography end to end.
//!
//! Accounting is exact and gas-free: value moves only when a hop succeeds,
//! so a failed hop leaves the attached coin with its source (a bounce,
//! minus nothing).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tondeal_rs::TondealClient;
use tondeal_rs::config::AddressConfig;

use tondeal_rs::address::{StateInit, TonAddress};
use tondeal_rs::cell::{Cell, CellBuilder};
use tondeal_rs::config::EscrowCodes;
use tondeal_rs::error::{ProviderError, exit_code};
use tondeal_rs::messages::{
    JettonMint, JettonTransfer, JettonTransferInternal, JettonTransferNotification, NewFee,
    NewOwner, NftOwnershipAssigned, NftTransfer, TextComment, TonFundingNotification, op,
    parse_create_order_payload, peek_opcode,
};
use tondeal_rs::metadata::build_onchain_metadata;
use tondeal_rs::provider::{
    InternalMessage, SendOutcome, Sender, StackValue, TonProvider, TxSummary,
};
use tondeal_rs::types::{BuyLeg, EscrowVariant, InitData, SellLeg, TradeRequest};

/// Gas floor the simulated router needs per routed create-and-fund, on top
/// of its fee.
pub const ROUTER_GAS_MIN: u128 = 30_000_000;
/// Action-phase failure code: the silent bounce an underfunded forward
/// dies with.
pub const EXIT_OUT_OF_GAS: i32 = -14;
/// Value attached to contract-initiated sub-messages.
const CARRY: u128 = 10_000_000;

const START_TIME: u64 = 1_750_000_000;
const TREASURY_FUNDS: u128 = 1_000_000_000_000;

fn tagged_cell(tag: u64, seed: u64) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(tag, 32).unwrap().store_uint(seed, 64).unwrap();
    b.build().unwrap()
}

fn derive(code: &Cell, data: &Cell) -> TonAddress {
    StateInit::new(code.clone(), data.clone())
        .derive_address(0)
        .unwrap()
}

fn address_cell(address: &TonAddress) -> Cell {
    let mut b = CellBuilder::new();
    b.store_address(address).unwrap();
    b.build().unwrap()
}

fn wallet_data_cell(owner: &TonAddress, master: &TonAddress) -> Cell {
    let mut b = CellBuilder::new();
    b.store_address(owner)
        .unwrap()
        .store_address(master)
        .unwrap();
    b.build().unwrap()
}

fn item_data_cell(index: u64, collection: &TonAddress) -> Cell {
    let mut b = CellBuilder::new();
    b.store_uint(index, 64)
        .unwrap()
        .store_address(collection)
        .unwrap();
    b.build().unwrap()
}

#[derive(Debug, Clone)]
struct EscrowAccount {
    variant: EscrowVariant,
    seller: TonAddress,
    #[allow(dead_code)]
    fee_recipient: Option<TonAddress>,
    router: Option<TonAddress>,
    request: Option<TradeRequest>,
    open: bool,
    filled: bool,
    cancelled: bool,
}

#[derive(Debug, Clone)]
enum AccountKind {
    /// Value-holding account with no contract state of interest.
    Treasury,
    JettonMinter {
        total_supply: u128,
        admin: TonAddress,
        content: Cell,
        wallet_code: Cell,
    },
    JettonWallet {
        balance: u128,
        owner: TonAddress,
        master: TonAddress,
    },
    NftCollection {
        item_code: Cell,
    },
    NftItem {
        index: u64,
        collection: TonAddress,
        owner: TonAddress,
        content: Cell,
    },
    Escrow(EscrowAccount),
    Router {
        variant: EscrowVariant,
        owner: TonAddress,
        fee: u128,
        collected: u128,
        escrow_code: Cell,
    },
}

#[derive(Debug, Clone)]
struct Account {
    balance: u128,
    kind: AccountKind,
}

impl Account {
    fn new(kind: AccountKind) -> Self {
        Account { balance: 0, kind }
    }
}

struct ChainState {
    now: u64,
    accounts: HashMap<TonAddress, Account>,
    /// Escrow code hash → variant, so a deploy carrying a known code cell
    /// becomes an escrow account.
    escrow_codes: HashMap<[u8; 32], EscrowVariant>,
    next_seed: u64,
}

type Queue = VecDeque<(TonAddress, InternalMessage)>;

/// The simulated chain. Cheap to clone; all handles share one state.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

/// A funded user account able to send messages into the simulation.
#[derive(Clone)]
pub struct MockSender {
    chain: MockChain,
    address: TonAddress,
}

const VARIANTS: [EscrowVariant; 5] = [
    EscrowVariant::JettonForJetton,
    EscrowVariant::JettonForTon,
    EscrowVariant::TonForJetton,
    EscrowVariant::NftForJetton,
    EscrowVariant::NftForTon,
];

fn escrow_code_cell(variant: EscrowVariant) -> Cell {
    let tag = VARIANTS.iter().position(|v| *v == variant).unwrap() as u64 + 1;
    tagged_cell(0xe5c0de, tag)
}

impl MockChain {
    pub fn new() -> Self {
        let escrow_codes = VARIANTS
            .iter()
            .map(|&v| (escrow_code_cell(v).repr_hash(), v))
            .collect();
        MockChain {
            state: Arc::new(Mutex::new(ChainState {
                now: START_TIME,
                accounts: HashMap::new(),
                escrow_codes,
                next_seed: 1,
            })),
        }
    }

    /// Compiled-code stand-ins, one unique cell per variant, recognized by
    /// the simulation's deploy path.
    pub fn escrow_codes(&self) -> EscrowCodes {
        EscrowCodes {
            jetton_for_jetton: escrow_code_cell(EscrowVariant::JettonForJetton),
            jetton_for_ton: escrow_code_cell(EscrowVariant::JettonForTon),
            ton_for_jetton: escrow_code_cell(EscrowVariant::TonForJetton),
            nft_for_jetton: escrow_code_cell(EscrowVariant::NftForJetton),
            nft_for_ton: escrow_code_cell(EscrowVariant::NftForTon),
        }
    }

    pub fn chain_now(&self) -> u64 {
        self.state.lock().unwrap().now
    }

    pub fn advance_time(&self, seconds: u64) {
        self.state.lock().unwrap().now += seconds;
    }

    /// A fresh, generously funded user account.
    pub fn treasury(&self, name: &str) -> MockSender {
        let mut hash = [0u8; 32];
        let bytes = name.as_bytes();
        let len = bytes.len().min(32);
        hash[..len].copy_from_slice(&bytes[..len]);
        let address = TonAddress::new(0, hash);
        self.state.lock().unwrap().accounts.insert(
            address,
            Account {
                balance: TREASURY_FUNDS,
                kind: AccountKind::Treasury,
            },
        );
        MockSender {
            chain: self.clone(),
            address,
        }
    }

    pub fn balance(&self, address: TonAddress) -> u128 {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    /// Deploys a token master with on-chain metadata and its own wallet
    /// code.
    pub fn deploy_jetton(&self, symbol: &str, admin: &MockSender) -> TonAddress {
        let fields = HashMap::from([
            ("name".to_string(), format!("test {symbol}")),
            ("symbol".to_string(), symbol.to_string()),
            (
                "description".to_string(),
                format!("This is description for test {symbol}"),
            ),
            ("decimals".to_string(), "9".to_string()),
        ]);
        let content = build_onchain_metadata(&fields).expect("metadata");
        let mut state = self.state.lock().unwrap();
        let seed = state.next_seed;
        state.next_seed += 1;
        let wallet_code = tagged_cell(0x3a11e7, seed);
        let address = derive(&tagged_cell(0x31f7e4, seed), &content);
        state.accounts.insert(
            address,
            Account::new(AccountKind::JettonMinter {
                total_supply: 0,
                admin: admin.address(),
                content,
                wallet_code,
            }),
        );
        address
    }

    pub fn deploy_router(
        &self,
        variant: EscrowVariant,
        owner: &MockSender,
        fee: u128,
    ) -> TonAddress {
        let mut state = self.state.lock().unwrap();
        let seed = state.next_seed;
        state.next_seed += 1;
        let address = derive(&tagged_cell(0xd0a7e4, seed), &Cell::empty());
        state.accounts.insert(
            address,
            Account::new(AccountKind::Router {
                variant,
                owner: owner.address(),
                fee,
                collected: 0,
                escrow_code: escrow_code_cell(variant),
            }),
        );
        address
    }

    pub fn deploy_nft_collection(&self) -> TonAddress {
        let mut state = self.state.lock().unwrap();
        let seed = state.next_seed;
        state.next_seed += 1;
        let item_code = tagged_cell(0x17e9, seed);
        let address = derive(&item_code, &Cell::empty());
        state.accounts.insert(
            address,
            Account::new(AccountKind::NftCollection { item_code }),
        );
        address
    }

    pub fn mint_nft(&self, collection: TonAddress, index: u64, owner: TonAddress) -> TonAddress {
        let mut state = self.state.lock().unwrap();
        let item_code = match &state.accounts[&collection].kind {
            AccountKind::NftCollection { item_code } => item_code.clone(),
            _ => panic!("not a collection"),
        };
        let address = derive(&item_code, &item_data_cell(index, &collection));
        state.accounts.insert(
            address,
            Account::new(AccountKind::NftItem {
                index,
                collection,
                owner,
                content: tagged_cell(0xc0a7e97, index),
            }),
        );
        address
    }

    pub fn nft_owner(&self, item: TonAddress) -> Option<TonAddress> {
        match &self.state.lock().unwrap().accounts.get(&item)?.kind {
            AccountKind::NftItem { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    /// Deterministic sub-wallet address for (master, owner).
    pub fn jetton_wallet(&self, master: TonAddress, owner: TonAddress) -> TonAddress {
        let state = self.state.lock().unwrap();
        state.jetton_wallet_address(&master, &owner).unwrap()
    }

    pub fn jetton_balance(&self, master: TonAddress, owner: TonAddress) -> u128 {
        let state = self.state.lock().unwrap();
        let wallet = state.jetton_wallet_address(&master, &owner).unwrap();
        match state.accounts.get(&wallet).map(|a| &a.kind) {
            Some(AccountKind::JettonWallet { balance, .. }) => *balance,
            _ => 0,
        }
    }

    fn process(&self, from: TonAddress, message: InternalMessage) -> SendOutcome {
        let mut state = self.state.lock().unwrap();
        let mut queue: Queue = VecDeque::new();
        queue.push_back((from, message));
        let mut transactions = Vec::new();
        while let Some((hop_from, hop_msg)) = queue.pop_front() {
            transactions.push(state.deliver(hop_from, hop_msg, &mut queue));
        }
        SendOutcome { transactions }
    }
}

impl ChainState {
    fn wallet_code_of(&self, master: &TonAddress) -> Option<Cell> {
        match &self.accounts.get(master)?.kind {
            AccountKind::JettonMinter { wallet_code, .. } => Some(wallet_code.clone()),
            _ => None,
        }
    }

    fn jetton_wallet_address(
        &self,
        master: &TonAddress,
        owner: &TonAddress,
    ) -> Option<TonAddress> {
        let code = self.wallet_code_of(master)?;
        Some(derive(&code, &wallet_data_cell(owner, master)))
    }

    fn ensure_jetton_wallet(&mut self, master: TonAddress, owner: TonAddress) -> TonAddress {
        let address = self
            .jetton_wallet_address(&master, &owner)
            .expect("known master");
        self.accounts.entry(address).or_insert_with(|| {
            Account::new(AccountKind::JettonWallet {
                balance: 0,
                owner,
                master,
            })
        });
        address
    }

    fn escrow_from_state_init(
        &self,
        from: &TonAddress,
        init: &StateInit,
    ) -> Option<AccountKind> {
        let variant = *self.escrow_codes.get(&init.code.repr_hash())?;
        let mut slice = init.data.parse();
        slice.load_bit().ok()?;
        let seller = slice.load_address().ok()?;
        let fee_recipient = if slice.remaining_bits() > 257 {
            Some(slice.load_address().ok()?)
        } else {
            None
        };
        let _nonce = slice.load_int(257).ok()?;
        let router = match self.accounts.get(from).map(|a| &a.kind) {
            Some(AccountKind::Router { .. }) => Some(*from),
            _ => None,
        };
        Some(AccountKind::Escrow(EscrowAccount {
            variant,
            seller,
            fee_recipient,
            router,
            request: None,
            open: false,
            filled: false,
            cancelled: false,
        }))
    }

    fn deliver(&mut self, from: TonAddress, msg: InternalMessage, queue: &mut Queue) -> TxSummary {
        if let Some(source) = self.accounts.get_mut(&from) {
            source.balance = source.balance.saturating_sub(msg.value);
        }

        let mut deployed = false;
        if !self.accounts.contains_key(&msg.to) {
            let kind = msg
                .state_init
                .as_ref()
                .and_then(|init| self.escrow_from_state_init(&from, init))
                .unwrap_or(AccountKind::Treasury);
            self.accounts.insert(msg.to, Account::new(kind));
            deployed = true;
        }

        let result = self.dispatch(from, &msg, queue);
        let (success, exit) = match result {
            Ok(()) => {
                self.accounts.get_mut(&msg.to).unwrap().balance += msg.value;
                (true, 0)
            }
            Err(code) => {
                // Bounce: the value returns whence it came.
                if let Some(source) = self.accounts.get_mut(&from) {
                    source.balance += msg.value;
                }
                (false, code)
            }
        };

        TxSummary {
            from: Some(from),
            to: msg.to,
            value: msg.value,
            success,
            exit_code: exit,
            deployed,
        }
    }

    fn dispatch(
        &mut self,
        from: TonAddress,
        msg: &InternalMessage,
        queue: &mut Queue,
    ) -> Result<(), i32> {
        let kind = self.accounts.get(&msg.to).unwrap().kind.clone();
        match kind {
            AccountKind::Treasury => Ok(()),
            AccountKind::JettonMinter { .. } => self.minter_dispatch(from, msg),
            AccountKind::JettonWallet { .. } => self.wallet_dispatch(from, msg, queue),
            AccountKind::NftItem { .. } => self.item_dispatch(from, msg, queue),
            AccountKind::NftCollection { .. } => Err(exit_code::INVALID_MESSAGE),
            AccountKind::Escrow(escrow) => {
                let updated = self.escrow_dispatch(from, msg, queue, escrow)?;
                match &mut self.accounts.get_mut(&msg.to).unwrap().kind {
                    AccountKind::Escrow(slot) => *slot = updated,
                    _ => unreachable!(),
                }
                Ok(())
            }
            AccountKind::Router { .. } => self.router_dispatch(from, msg, queue),
        }
    }

    fn minter_dispatch(&mut self, from: TonAddress, msg: &InternalMessage) -> Result<(), i32> {
        match peek_opcode(&msg.body) {
            Ok(op::JETTON_MINT) => {
                let mint = JettonMint::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                let master = msg.to;
                let admin = match &self.accounts[&master].kind {
                    AccountKind::JettonMinter { admin, .. } => *admin,
                    _ => unreachable!(),
                };
                if from != admin {
                    return Err(73);
                }
                let wallet = self.ensure_jetton_wallet(master, mint.destination);
                match &mut self.accounts.get_mut(&wallet).unwrap().kind {
                    AccountKind::JettonWallet { balance, .. } => *balance += mint.internal.amount,
                    _ => unreachable!(),
                }
                match &mut self.accounts.get_mut(&master).unwrap().kind {
                    AccountKind::JettonMinter { total_supply, .. } => {
                        *total_supply += mint.internal.amount
                    }
                    _ => unreachable!(),
                }
                Ok(())
            }
            _ => Err(exit_code::INVALID_MESSAGE),
        }
    }

    fn wallet_dispatch(
        &mut self,
        from: TonAddress,
        msg: &InternalMessage,
        queue: &mut Queue,
    ) -> Result<(), i32> {
        let (balance, owner, master) = match &self.accounts[&msg.to].kind {
            AccountKind::JettonWallet {
                balance,
                owner,
                master,
            } => (*balance, *owner, *master),
            _ => unreachable!(),
        };
        match peek_opcode(&msg.body) {
            Ok(op::JETTON_TRANSFER) => {
                let transfer =
                    JettonTransfer::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                if from != owner {
                    return Err(705);
                }
                if balance < transfer.amount {
                    return Err(706);
                }
                match &mut self.accounts.get_mut(&msg.to).unwrap().kind {
                    AccountKind::JettonWallet { balance, .. } => *balance -= transfer.amount,
                    _ => unreachable!(),
                }
                let dest_wallet = self.ensure_jetton_wallet(master, transfer.destination);
                let internal = JettonTransferInternal {
                    query_id: transfer.query_id,
                    amount: transfer.amount,
                    from: owner,
                    response_destination: transfer.response_destination,
                    forward_ton_amount: transfer.forward_ton_amount,
                    forward_payload: transfer.forward_payload.clone(),
                };
                queue.push_back((
                    msg.to,
                    InternalMessage::new(dest_wallet, msg.value, internal.encode().unwrap()),
                ));
                Ok(())
            }
            Ok(op::JETTON_TRANSFER_INTERNAL) => {
                let internal = JettonTransferInternal::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                match &mut self.accounts.get_mut(&msg.to).unwrap().kind {
                    AccountKind::JettonWallet { balance, .. } => *balance += internal.amount,
                    _ => unreachable!(),
                }
                if internal.forward_ton_amount > 0 {
                    let notification = JettonTransferNotification {
                        query_id: internal.query_id,
                        amount: internal.amount,
                        sender: internal.from,
                        forward_payload: internal.forward_payload.clone(),
                    };
                    queue.push_back((
                        msg.to,
                        InternalMessage::new(
                            owner,
                            internal.forward_ton_amount,
                            notification.encode().unwrap(),
                        ),
                    ));
                }
                Ok(())
            }
            _ => Err(exit_code::INVALID_MESSAGE),
        }
    }

    fn item_dispatch(
        &mut self,
        from: TonAddress,
        msg: &InternalMessage,
        queue: &mut Queue,
    ) -> Result<(), i32> {
        match peek_opcode(&msg.body) {
            Ok(op::NFT_TRANSFER) => {
                let transfer =
                    NftTransfer::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                let prev_owner = match &self.accounts[&msg.to].kind {
                    AccountKind::NftItem { owner, .. } => *owner,
                    _ => unreachable!(),
                };
                if from != prev_owner {
                    return Err(401);
                }
                match &mut self.accounts.get_mut(&msg.to).unwrap().kind {
                    AccountKind::NftItem { owner, .. } => *owner = transfer.new_owner,
                    _ => unreachable!(),
                }
                if transfer.forward_ton_amount > 0 {
                    let assigned = NftOwnershipAssigned {
                        query_id: transfer.query_id,
                        prev_owner,
                        forward_payload: transfer.forward_payload.clone(),
                    };
                    queue.push_back((
                        msg.to,
                        InternalMessage::new(
                            transfer.new_owner,
                            transfer.forward_ton_amount,
                            assigned.encode().unwrap(),
                        ),
                    ));
                }
                Ok(())
            }
            _ => Err(exit_code::INVALID_MESSAGE),
        }
    }

    fn escrow_dispatch(
        &mut self,
        from: TonAddress,
        msg: &InternalMessage,
        queue: &mut Queue,
        mut escrow: EscrowAccount,
    ) -> Result<EscrowAccount, i32> {
        let opcode = peek_opcode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
        match opcode {
            op::REQUEST_JETTON_JETTON
            | op::REQUEST_JETTON_TON
            | op::REQUEST_TON_JETTON
            | op::REQUEST_NFT_JETTON
            | op::REQUEST_NFT_TON => {
                if escrow.request.is_some() {
                    return Err(exit_code::WRONG_STAGE);
                }
                let request =
                    TradeRequest::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                if request.variant().map_err(|_| exit_code::INVALID_MESSAGE)? != escrow.variant {
                    return Err(exit_code::INVALID_MESSAGE);
                }
                if escrow.variant.funds_on_deploy() {
                    let amount_sell = request.sell_amount().unwrap_or(0);
                    if msg.value < amount_sell {
                        return Err(exit_code::TON_AMOUNT_MISMATCH);
                    }
                    escrow.open = true;
                }
                escrow.request = Some(request);
                Ok(escrow)
            }
            op::JETTON_TRANSFER_NOTIFICATION => {
                let notification = JettonTransferNotification::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                let request = escrow.request.clone().ok_or(exit_code::INVALID_MESSAGE)?;
                let sell_wallet = match &request.sell {
                    SellLeg::Jetton { escrow_wallet, .. } => Some(*escrow_wallet),
                    _ => None,
                };
                let buy_wallet = match &request.buy {
                    BuyLeg::Jetton { escrow_wallet, .. } => Some(*escrow_wallet),
                    _ => None,
                };
                if sell_wallet == Some(from) {
                    if escrow.open {
                        return Err(exit_code::ALREADY_FUNDED);
                    }
                    if notification.sender != escrow.seller
                        && Some(notification.sender) != escrow.router
                    {
                        return Err(exit_code::ACCESS_DENIED);
                    }
                    if Some(notification.amount) != request.sell_amount() {
                        return Err(exit_code::JETTON_AMOUNT_MISMATCH);
                    }
                    escrow.open = true;
                    Ok(escrow)
                } else if buy_wallet == Some(from) {
                    if !escrow.open {
                        return Err(exit_code::SELL_LEG_NOT_FUNDED);
                    }
                    if escrow.filled || escrow.cancelled {
                        return Err(exit_code::WRONG_STAGE);
                    }
                    if self.now > request.expiration_time {
                        return Err(exit_code::EXPIRED);
                    }
                    if notification.amount != request.buy_amount() {
                        return Err(exit_code::JETTON_AMOUNT_MISMATCH);
                    }
                    self.fill(msg.to, &mut escrow, &request, notification.sender, queue);
                    Ok(escrow)
                } else {
                    Err(exit_code::WRONG_NOTIFIER)
                }
            }
            op::NFT_OWNERSHIP_ASSIGNED => {
                let assigned = NftOwnershipAssigned::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                let request = escrow.request.clone().ok_or(exit_code::INVALID_MESSAGE)?;
                let SellLeg::Nft { item } = &request.sell else {
                    return Err(exit_code::INVALID_MESSAGE);
                };
                if escrow.open {
                    return Err(exit_code::ALREADY_FUNDED);
                }
                if from != *item {
                    return Err(exit_code::WRONG_NOTIFIER);
                }
                if assigned.prev_owner != escrow.seller
                    && Some(assigned.prev_owner) != escrow.router
                {
                    return Err(exit_code::ACCESS_DENIED);
                }
                escrow.open = true;
                Ok(escrow)
            }
            op::TEXT_COMMENT => {
                let comment =
                    TextComment::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                match comment.text.as_str() {
                    TextComment::FUND_BUY_TON => {
                        let request = escrow.request.clone().ok_or(exit_code::INVALID_MESSAGE)?;
                        let BuyLeg::Ton { amount } = request.buy else {
                            return Err(exit_code::INVALID_MESSAGE);
                        };
                        if !escrow.open {
                            return Err(exit_code::SELL_LEG_NOT_FUNDED);
                        }
                        if escrow.filled || escrow.cancelled {
                            return Err(exit_code::WRONG_STAGE);
                        }
                        if self.now > request.expiration_time {
                            return Err(exit_code::EXPIRED);
                        }
                        if msg.value < amount {
                            return Err(exit_code::TON_AMOUNT_MISMATCH);
                        }
                        self.fill(msg.to, &mut escrow, &request, from, queue);
                        Ok(escrow)
                    }
                    TextComment::CANCEL => self.cancel(from, msg.to, escrow, queue),
                    _ => Err(exit_code::INVALID_MESSAGE),
                }
            }
            op::CANCEL => self.cancel(from, msg.to, escrow, queue),
            _ => Err(exit_code::INVALID_MESSAGE),
        }
    }

    fn cancel(
        &mut self,
        from: TonAddress,
        escrow_addr: TonAddress,
        mut escrow: EscrowAccount,
        queue: &mut Queue,
    ) -> Result<EscrowAccount, i32> {
        if from != escrow.seller {
            return Err(exit_code::ACCESS_DENIED);
        }
        if !escrow.open || escrow.filled || escrow.cancelled {
            return Err(exit_code::WRONG_STAGE);
        }
        let request = escrow.request.clone().ok_or(exit_code::WRONG_STAGE)?;
        match &request.sell {
            SellLeg::Jetton {
                escrow_wallet,
                amount,
                ..
            } => {
                self.send_jetton(escrow_addr, *escrow_wallet, escrow.seller, *amount, queue);
            }
            SellLeg::Ton { amount } => {
                queue.push_back((
                    escrow_addr,
                    InternalMessage::new(escrow.seller, *amount, Cell::empty()),
                ));
            }
            SellLeg::Nft { item } => {
                self.send_nft(escrow_addr, *item, escrow.seller, queue);
            }
        }
        escrow.cancelled = true;
        escrow.open = false;
        Ok(escrow)
    }

    /// Atomic settlement: buy side to the seller, sell side to the buyer.
    fn fill(
        &mut self,
        escrow_addr: TonAddress,
        escrow: &mut EscrowAccount,
        request: &TradeRequest,
        buyer: TonAddress,
        queue: &mut Queue,
    ) {
        match &request.buy {
            BuyLeg::Jetton {
                escrow_wallet,
                amount,
                ..
            } => {
                self.send_jetton(escrow_addr, *escrow_wallet, escrow.seller, *amount, queue);
            }
            BuyLeg::Ton { amount } => {
                queue.push_back((
                    escrow_addr,
                    InternalMessage::new(escrow.seller, *amount, Cell::empty()),
                ));
            }
        }
        match &request.sell {
            SellLeg::Jetton {
                escrow_wallet,
                amount,
                ..
            } => {
                self.send_jetton(escrow_addr, *escrow_wallet, buyer, *amount, queue);
            }
            SellLeg::Ton { amount } => {
                queue.push_back((
                    escrow_addr,
                    InternalMessage::new(buyer, *amount, Cell::empty()),
                ));
            }
            SellLeg::Nft { item } => {
                self.send_nft(escrow_addr, *item, buyer, queue);
            }
        }
        escrow.filled = true;
    }

    fn send_jetton(
        &mut self,
        owner: TonAddress,
        wallet: TonAddress,
        destination: TonAddress,
        amount: u128,
        queue: &mut Queue,
    ) {
        let transfer = JettonTransfer {
            query_id: 0,
            amount,
            destination,
            response_destination: destination,
            custom_payload: None,
            forward_ton_amount: 0,
            forward_payload: Cell::empty(),
        };
        queue.push_back((
            owner,
            InternalMessage::new(wallet, CARRY, transfer.encode().unwrap()),
        ));
    }

    fn send_nft(
        &mut self,
        owner: TonAddress,
        item: TonAddress,
        new_owner: TonAddress,
        queue: &mut Queue,
    ) {
        let transfer = NftTransfer {
            query_id: 0,
            new_owner,
            response_destination: new_owner,
            custom_payload: None,
            forward_ton_amount: 0,
            forward_payload: Cell::empty(),
        };
        queue.push_back((
            owner,
            InternalMessage::new(item, CARRY, transfer.encode().unwrap()),
        ));
    }

    fn router_dispatch(
        &mut self,
        from: TonAddress,
        msg: &InternalMessage,
        queue: &mut Queue,
    ) -> Result<(), i32> {
        let router_addr = msg.to;
        let (variant, owner, fee, escrow_code) = match &self.accounts[&router_addr].kind {
            AccountKind::Router {
                variant,
                owner,
                fee,
                escrow_code,
                ..
            } => (*variant, *owner, *fee, escrow_code.clone()),
            _ => unreachable!(),
        };
        let opcode = peek_opcode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
        match opcode {
            op::JETTON_TRANSFER_NOTIFICATION => {
                let notification = JettonTransferNotification::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                let (request, init) = parse_create_order_payload(&notification.forward_payload)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                if request.variant().map_err(|_| exit_code::INVALID_MESSAGE)? != variant {
                    return Err(exit_code::INVALID_MESSAGE);
                }
                if msg.value < fee + ROUTER_GAS_MIN {
                    return Err(EXIT_OUT_OF_GAS);
                }
                self.collect_fee(router_addr, fee);
                let escrow_addr = self.deploy_order(router_addr, &escrow_code, &init, &request, queue);
                // Hand the received tokens on: router wallet → escrow wallet,
                // leaving the router's own sub-account at zero.
                let pass = msg.value - fee;
                let transfer = JettonTransfer {
                    query_id: notification.query_id,
                    amount: notification.amount,
                    destination: escrow_addr,
                    response_destination: escrow_addr,
                    custom_payload: None,
                    forward_ton_amount: pass / 2,
                    forward_payload: Cell::empty(),
                };
                queue.push_back((
                    router_addr,
                    InternalMessage::new(from, pass, transfer.encode().unwrap()),
                ));
                Ok(())
            }
            op::NFT_OWNERSHIP_ASSIGNED => {
                let assigned = NftOwnershipAssigned::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                let (request, init) = parse_create_order_payload(&assigned.forward_payload)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                if request.variant().map_err(|_| exit_code::INVALID_MESSAGE)? != variant {
                    return Err(exit_code::INVALID_MESSAGE);
                }
                if msg.value < fee + ROUTER_GAS_MIN {
                    return Err(EXIT_OUT_OF_GAS);
                }
                self.collect_fee(router_addr, fee);
                let escrow_addr = self.deploy_order(router_addr, &escrow_code, &init, &request, queue);
                let pass = msg.value - fee;
                let transfer = NftTransfer {
                    query_id: assigned.query_id,
                    new_owner: escrow_addr,
                    response_destination: escrow_addr,
                    custom_payload: None,
                    forward_ton_amount: pass / 2,
                    forward_payload: Cell::empty(),
                };
                queue.push_back((
                    router_addr,
                    InternalMessage::new(from, pass, transfer.encode().unwrap()),
                ));
                Ok(())
            }
            op::TON_FUNDING_NOTIFICATION => {
                let funding = TonFundingNotification::decode(&msg.body)
                    .map_err(|_| exit_code::INVALID_MESSAGE)?;
                if funding.request.variant().map_err(|_| exit_code::INVALID_MESSAGE)? != variant {
                    return Err(exit_code::INVALID_MESSAGE);
                }
                let amount_sell = funding.request.sell_amount().unwrap_or(0);
                if msg.value < amount_sell + fee + ROUTER_GAS_MIN {
                    return Err(EXIT_OUT_OF_GAS);
                }
                self.collect_fee(router_addr, fee);
                // Deploy carries the coin; the escrow opens on arrival.
                let state_init = StateInit::new(escrow_code, funding.init.data_cell().unwrap());
                let escrow_addr = state_init.derive_address(0).unwrap();
                queue.push_back((
                    router_addr,
                    InternalMessage::new(
                        escrow_addr,
                        msg.value - fee,
                        funding.request.encode().unwrap(),
                    )
                    .non_bounceable()
                    .with_state_init(state_init),
                ));
                Ok(())
            }
            op::NEW_FEE => {
                let new_fee =
                    NewFee::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                if from != owner {
                    return Err(exit_code::ACCESS_DENIED);
                }
                match &mut self.accounts.get_mut(&router_addr).unwrap().kind {
                    AccountKind::Router { fee, .. } => *fee = new_fee.new_fee,
                    _ => unreachable!(),
                }
                Ok(())
            }
            op::NEW_OWNER => {
                let new_owner =
                    NewOwner::decode(&msg.body).map_err(|_| exit_code::INVALID_MESSAGE)?;
                if from != owner {
                    return Err(exit_code::ACCESS_DENIED);
                }
                match &mut self.accounts.get_mut(&router_addr).unwrap().kind {
                    AccountKind::Router { owner, .. } => *owner = new_owner.new_owner,
                    _ => unreachable!(),
                }
                Ok(())
            }
            op::WITHDRAW => {
                if from != owner {
                    return Err(exit_code::ACCESS_DENIED);
                }
                let collected = match &mut self.accounts.get_mut(&router_addr).unwrap().kind {
                    AccountKind::Router { collected, .. } => std::mem::take(collected),
                    _ => unreachable!(),
                };
                if collected > 0 {
                    queue.push_back((
                        router_addr,
                        InternalMessage::new(owner, collected, Cell::empty()),
                    ));
                }
                Ok(())
            }
            _ => Err(exit_code::INVALID_MESSAGE),
        }
    }

    fn collect_fee(&mut self, router_addr: TonAddress, fee: u128) {
        match &mut self.accounts.get_mut(&router_addr).unwrap().kind {
            AccountKind::Router { collected, .. } => *collected += fee,
            _ => unreachable!(),
        }
    }

    /// Router-side instance deploy: state-init plus the request body, the
    /// same two-part deploy a seller would send directly.
    fn deploy_order(
        &mut self,
        router_addr: TonAddress,
        escrow_code: &Cell,
        init: &InitData,
        request: &TradeRequest,
        queue: &mut Queue,
    ) -> TonAddress {
        let state_init = StateInit::new(escrow_code.clone(), init.data_cell().unwrap());
        let escrow_addr = state_init.derive_address(0).unwrap();
        queue.push_back((
            router_addr,
            InternalMessage::new(escrow_addr, CARRY, request.encode().unwrap())
                .non_bounceable()
                .with_state_init(state_init),
        ));
        escrow_addr
    }
}

impl TonProvider for MockChain {
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: Vec<StackValue>,
    ) -> Result<Vec<StackValue>, ProviderError> {
        let state = self.state.lock().unwrap();
        let account = state
            .accounts
            .get(address)
            .ok_or(ProviderError::NotDeployed(*address))?;
        let rejected = |detail: &str| ProviderError::Rejected {
            address: *address,
            method: method.to_string(),
            detail: detail.to_string(),
        };
        match (&account.kind, method) {
            (AccountKind::JettonMinter { wallet_code, .. }, "get_wallet_address") => {
                let arg = args.first().ok_or_else(|| rejected("missing owner"))?;
                let StackValue::Slice(cell) = arg else {
                    return Err(rejected("owner must be a slice"));
                };
                let owner = cell
                    .parse()
                    .load_address()
                    .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                let wallet = derive(wallet_code, &wallet_data_cell(&owner, address));
                Ok(vec![StackValue::Slice(address_cell(&wallet))])
            }
            (
                AccountKind::JettonMinter {
                    total_supply,
                    admin,
                    content,
                    wallet_code,
                },
                "get_jetton_data",
            ) => Ok(vec![
                StackValue::Int(*total_supply as i128),
                StackValue::Int(-1),
                StackValue::Slice(address_cell(admin)),
                StackValue::Cell(content.clone()),
                StackValue::Cell(wallet_code.clone()),
            ]),
            (
                AccountKind::JettonWallet {
                    balance,
                    owner,
                    master,
                },
                "get_wallet_data",
            ) => Ok(vec![
                StackValue::Int(*balance as i128),
                StackValue::Slice(address_cell(owner)),
                StackValue::Slice(address_cell(master)),
                StackValue::Cell(Cell::empty()),
            ]),
            (AccountKind::NftCollection { item_code }, "get_nft_address_by_index") => {
                let StackValue::Int(index) = args.first().ok_or_else(|| rejected("missing index"))?
                else {
                    return Err(rejected("index must be an int"));
                };
                let item = derive(item_code, &item_data_cell(*index as u64, address));
                Ok(vec![StackValue::Slice(address_cell(&item))])
            }
            (
                AccountKind::NftItem {
                    index,
                    collection,
                    owner,
                    content,
                },
                "get_nft_data",
            ) => Ok(vec![
                StackValue::Int(-1),
                StackValue::Int(*index as i128),
                StackValue::Slice(address_cell(collection)),
                StackValue::Slice(address_cell(owner)),
                StackValue::Cell(content.clone()),
            ]),
            (AccountKind::Escrow(escrow), "state") => {
                let request = escrow
                    .request
                    .as_ref()
                    .ok_or_else(|| rejected("uninitialized order"))?;
                let mut stack = vec![
                    StackValue::Slice(address_cell(&escrow.seller)),
                    match &escrow.router {
                        Some(router) => StackValue::Slice(address_cell(router)),
                        None => StackValue::Null,
                    },
                ];
                push_request(&mut stack, request);
                stack.push(StackValue::Int(if escrow.open { -1 } else { 0 }));
                stack.push(StackValue::Int(if escrow.filled { -1 } else { 0 }));
                Ok(stack)
            }
            (
                AccountKind::Router {
                    owner, fee, escrow_code, ..
                },
                method,
            ) => match method {
                "calculate_order" => {
                    let mut reader =
                        tondeal_rs::provider::TupleReader::new(args);
                    let seller = reader
                        .read_address()
                        .map_err(|_| rejected("seller argument"))?;
                    let nonce = reader.read_int().map_err(|_| rejected("nonce argument"))?;
                    let init = InitData::new(seller, nonce);
                    let order = derive(escrow_code, &init.data_cell().unwrap());
                    Ok(vec![StackValue::Slice(address_cell(&order))])
                }
                "fee" => Ok(vec![StackValue::Int(*fee as i128)]),
                "owner" => Ok(vec![StackValue::Slice(address_cell(owner))]),
                "state" => Ok(vec![
                    StackValue::Slice(address_cell(owner)),
                    StackValue::Int(*fee as i128),
                ]),
                _ => Err(rejected("unknown method")),
            },
            _ => Err(rejected("unknown method")),
        }
    }

    async fn is_deployed(&self, address: &TonAddress) -> Result<bool, ProviderError> {
        Ok(self.state.lock().unwrap().accounts.contains_key(address))
    }

    fn now(&self) -> u64 {
        self.state.lock().unwrap().now
    }
}

fn push_request(stack: &mut Vec<StackValue>, request: &TradeRequest) {
    match (&request.sell, &request.buy) {
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
            stack.push(StackValue::Slice(address_cell(sell_wallet)));
            stack.push(StackValue::Slice(address_cell(buy_wallet)));
            stack.push(StackValue::Slice(address_cell(sell_master)));
            stack.push(StackValue::Slice(address_cell(buy_master)));
            stack.push(StackValue::Int(*amount_sell as i128));
            stack.push(StackValue::Int(*amount_buy as i128));
        }
        (
            SellLeg::Jetton {
                master,
                escrow_wallet,
                amount: amount_sell,
            },
            BuyLeg::Ton { amount: amount_buy },
        ) => {
            stack.push(StackValue::Slice(address_cell(escrow_wallet)));
            stack.push(StackValue::Slice(address_cell(master)));
            stack.push(StackValue::Int(*amount_sell as i128));
            stack.push(StackValue::Int(*amount_buy as i128));
        }
        (
            SellLeg::Ton { amount: amount_sell },
            BuyLeg::Jetton {
                master,
                escrow_wallet,
                amount: amount_buy,
            },
        ) => {
            stack.push(StackValue::Slice(address_cell(escrow_wallet)));
            stack.push(StackValue::Slice(address_cell(master)));
            stack.push(StackValue::Int(*amount_sell as i128));
            stack.push(StackValue::Int(*amount_buy as i128));
        }
        (
            SellLeg::Nft { item },
            BuyLeg::Jetton {
                master,
                escrow_wallet,
                amount: amount_buy,
            },
        ) => {
            stack.push(StackValue::Slice(address_cell(item)));
            stack.push(StackValue::Slice(address_cell(escrow_wallet)));
            stack.push(StackValue::Slice(address_cell(master)));
            stack.push(StackValue::Int(*amount_buy as i128));
        }
        (SellLeg::Nft { item }, BuyLeg::Ton { amount: amount_buy }) => {
            stack.push(StackValue::Slice(address_cell(item)));
            stack.push(StackValue::Int(*amount_buy as i128));
        }
        (SellLeg::Ton { .. }, BuyLeg::Ton { .. }) => unreachable!(),
    }
    stack.push(StackValue::Int(request.expiration_time as i128));
}

impl MockSender {
    pub fn chain(&self) -> &MockChain {
        &self.chain
    }
}

impl Sender for MockSender {
    fn address(&self) -> TonAddress {
        self.address
    }

    async fn send(&self, message: InternalMessage) -> Result<SendOutcome, ProviderError> {
        Ok(self.chain.process(self.address, message))
    }
}

/// One participant set with funded token books, shared by the lifecycle
/// scenarios across every variant.
pub struct Env {
    pub chain: MockChain,
    pub deployer: TondealClient<MockChain, MockSender>,
    pub seller: TondealClient<MockChain, MockSender>,
    pub buyer: TondealClient<MockChain, MockSender>,
    pub sell_master: TonAddress,
    pub buy_master: TonAddress,
}

pub const STARTING_TOKENS: u128 = 10_000_000_000;

pub async fn setup_env_with(config: AddressConfig) -> eyre::Result<Env> {
    let chain = MockChain::new();
    let deployer_account = chain.treasury("deployer");
    let seller_account = chain.treasury("seller");
    let buyer_account = chain.treasury("buyer");
    let codes = chain.escrow_codes();

    let client = |account: &MockSender| {
        TondealClient::new(
            chain.clone(),
            account.clone(),
            config.clone(),
            codes.clone(),
        )
    };
    let deployer = client(&deployer_account);
    let seller = client(&seller_account);
    let buyer = client(&buyer_account);

    let sell_master = chain.deploy_jetton("BNK", &deployer_account);
    let buy_master = chain.deploy_jetton("ARC", &deployer_account);
    for (master, holder) in [
        (sell_master, seller.address()),
        (sell_master, deployer.address()),
        (buy_master, buyer.address()),
    ] {
        deployer
            .jetton
            .mint(master, holder, STARTING_TOKENS, Cell::empty())
            .await?;
    }

    Ok(Env {
        chain,
        deployer,
        seller,
        buyer,
        sell_master,
        buy_master,
    })
}

pub async fn setup_env() -> eyre::Result<Env> {
    setup_env_with(AddressConfig::default()).await
}

impl Env {
    /// An expiration comfortably in the future (100 days, as the reference
    /// deployments use).
    pub fn far_expiration(&self) -> u64 {
        self.chain.chain_now() + 100 * 24 * 60 * 60
    }
}

/// Assert that the observed cascade contains a hop matching the original
/// sandbox-test style of expectation.
pub fn assert_transaction(
    outcome: &SendOutcome,
    from: TonAddress,
    to: TonAddress,
    success: bool,
    exit: Option<i32>,
) {
    let found = outcome.transactions.iter().any(|tx| {
        tx.from == Some(from)
            && tx.to == to
            && tx.success == success
            && exit.is_none_or(|code| tx.exit_code == code)
    });
    assert!(
        found,
        "no hop {} -> {} (success={success}, exit={exit:?}) in {:#?}",
        from.to_raw(),
        to.to_raw(),
        outcome.transactions
    );
}
