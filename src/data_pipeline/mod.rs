// src/data_pipeline/mod.rs

// Du trade admis jusqu'aux résultats par pool :
// découverte des pools -> lecture des soldes -> valorisation -> publication.
pub mod discovery;
pub mod pool_resolver;
pub mod processor;
