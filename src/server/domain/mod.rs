pub(crate) mod loyalty;
pub(crate) mod price;
pub(crate) mod status;
pub(crate) mod totals;
