pub mod balances;
pub mod client;
pub mod history;
pub mod registration;
pub mod staking;
pub mod status;
