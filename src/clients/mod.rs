pub mod escrow;
pub mod jetton;
pub mod nft;
pub mod router;
