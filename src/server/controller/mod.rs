pub(crate) mod error;
pub(crate) mod loyalty;
pub(crate) mod orders;
pub(crate) mod payment;

pub(crate) const DB_TIMEOUT_SECONDS: u64 = 5;
