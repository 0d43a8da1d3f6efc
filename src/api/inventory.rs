use serde::{Deserialize, Serialize};

/// One entry reported back to the platform by an inventory job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryItem {
    /// Certificate name, or listener name for listener-binding stores.
    pub alias: String,

    /// Base64 DER certificates, leaf first.
    pub certificates: Vec<String>,

    pub private_key_entry: bool,

    pub use_chain_level: bool,
}

impl InventoryItem {
    pub fn new(alias: impl Into<String>, certificates: Vec<String>) -> Self {
        InventoryItem {
            alias: alias.into(),
            certificates,
            private_key_entry: true,
            use_chain_level: true,
        }
    }

    /// Copy of this item reported under another alias.
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        InventoryItem {
            alias: alias.into(),
            ..self.clone()
        }
    }
}

/// Result of reading every certificate on a gateway.
///
/// Reading a single certificate's chain can fail without failing the whole listing. Those
/// failures are collected in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryListing {
    pub items: Vec<InventoryItem>,
    pub failures: Vec<String>,
}

impl InventoryListing {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of certificates present on the gateway, readable or not.
    pub fn total(&self) -> usize {
        self.items.len() + self.failures.len()
    }
}
