// DANS : src/rpc/mod.rs

pub mod resilient_client;
pub mod retry;

pub use resilient_client::ResilientRpcClient;
