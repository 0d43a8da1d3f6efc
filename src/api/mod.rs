//! Data exchanged with the gateway client and the calling platform.

use std::collections::BTreeMap;

mod certificate;
mod inventory;
mod request;

pub use self::{
    certificate::Certificate,
    inventory::{InventoryItem, InventoryListing},
    request::{Action, ManagementRequest},
};

/// HTTPS listener name to the name of the certificate bound to it.
///
/// Listeners without a bound certificate are absent.
pub type Bindings = BTreeMap<String, String>;
