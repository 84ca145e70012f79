// DANS : src/feeds/mod.rs

// Entrées / sorties temps réel : le flux Socket.IO des transactions
// et le relais WebSocket des résultats.
pub mod relay;
pub mod socket_client;

pub use socket_client::SocketClient;
