// src/lib.rs

// Tous les modules sont publics : le binaire trade_monitor et les tests
// d'intégration les assemblent.
pub mod communication;
pub mod config;
pub mod data_pipeline;
pub mod error;
pub mod feeds;
pub mod filtering;
pub mod math;
pub mod monitoring;
pub mod notifications;
pub mod rpc;
pub mod state;
