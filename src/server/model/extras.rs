use crate::server::model::order::RawPrice;
use serde::{Deserialize, Serialize};

/// One selectable add-on inside an extra list. `required` and `multiple`
/// are mutually exclusive per option, enforced at input time by the admin
/// screens rather than structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExtraOption {
    pub name: String,
    #[serde(default)]
    pub price: RawPrice,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExtraList {
    pub id: String,
    pub name: String,
    pub options: Vec<ExtraOption>,
}

/// Catalog entry a line item falls back to when it carries no captured price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: RawPrice,
}
