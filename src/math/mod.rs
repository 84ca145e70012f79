pub mod valuation;

pub use valuation::valuate_usd;
