//! skyward-wallet
//!
//! Client side of the Skyward protocol: mnemonic-derived wallet, blind
//! bundle handling, the booking/access/claim cycles, and the reconstruction
//! driver that rebuilds a lost client from the mnemonic alone.

pub mod client;
pub mod rpc_client;

pub use client::Wallet;
pub use rpc_client::RpcClient;
