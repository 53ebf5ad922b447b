pub mod amount;
pub mod currency;
pub mod error;
pub mod pair;
pub mod party;
