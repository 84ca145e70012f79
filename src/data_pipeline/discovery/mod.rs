// src/data_pipeline/discovery/mod.rs

// Chaque fichier ici représente une source externe (une API) interrogée
// pour trouver les pools d'une paire de mints.
pub mod raydium;

pub use raydium::RaydiumDiscovery;
