// DANS : src/filtering/mod.rs

// Filtrage des trades entrants : qui est admis, et quand.
pub mod admission;
pub mod dispatcher;

pub use admission::AdmissionFilter;
pub use dispatcher::{Admission, TradeDispatcher};
