//! Inventory of certificates and listener bindings.

use std::collections::HashMap;

use crate::{
    api::{Bindings, InventoryItem, InventoryListing},
    client::GatewayClient,
    error::Result,
    plan::BindingPolicy,
};

/// Inventory read from a gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryReport {
    pub items: Vec<InventoryItem>,

    /// Certificates that could not be read.
    pub failures: Vec<String>,

    /// Certificates whose chains were read.
    pub certificates_read: usize,

    /// Certificates present on the gateway.
    pub certificates_total: usize,
}

impl InventoryReport {
    fn new(items: Vec<InventoryItem>, listing: InventoryListing) -> Self {
        InventoryReport {
            items,
            certificates_read: listing.items.len(),
            certificates_total: listing.total(),
            failures: listing.failures,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Report one entry per bound listener instead of one per certificate.
///
/// Each entry is a copy of the bound certificate's item carrying the listener's name as its
/// alias. A certificate bound to two listeners appears twice; unbound certificates, and
/// bindings to certificates missing from `items`, do not appear.
pub fn reconcile(items: &[InventoryItem], bindings: &Bindings) -> Vec<InventoryItem> {
    let by_name = items
        .iter()
        .map(|item| (item.alias.as_str(), item))
        .collect::<HashMap<_, _>>();

    bindings
        .iter()
        .filter_map(|(listener, certificate)| {
            let item = by_name.get(certificate.as_str())?;
            log::trace!("Certificate \"{certificate}\" is bound to listener \"{listener}\"");
            Some(item.with_alias(listener))
        })
        .collect()
}

/// Read the gateway's inventory the way `policy` reports it.
///
/// Failing to list certificates or bindings at all is an error. Individual certificates that
/// could not be read only end up in [`InventoryReport::failures`].
pub async fn inventory<C: GatewayClient>(
    client: &C,
    policy: BindingPolicy,
) -> Result<InventoryReport> {
    let listing = client.list_certificates().await?;
    log::debug!(
        "Found {} certificates on the gateway ({} unreadable)",
        listing.total(),
        listing.failures.len()
    );

    let items = match policy {
        BindingPolicy::Certificate => listing.items.clone(),

        BindingPolicy::Listener => {
            let bindings = client.bound_listener_certificates().await?;
            log::debug!(
                "There are {} HTTPS listeners with bound certificates",
                bindings.len()
            );

            let items = reconcile(&listing.items, &bindings);
            log::trace!(
                "Of the {} certificates on the gateway, {} are bound to HTTPS listeners (possibly the same certificate bound to multiple listeners)",
                listing.total(),
                items.len()
            );
            items
        }
    };

    Ok(InventoryReport::new(items, listing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::{Call, MemoryGateway},
        error::ErrorKind,
        test::RESOURCE_ID,
    };

    fn item(alias: &str) -> InventoryItem {
        InventoryItem::new(alias, vec![format!("chain-of-{alias}")])
    }

    #[test]
    fn test_reconcile_per_listener() {
        let items = vec![item("shared"), item("solo"), item("unbound")];
        let bindings = Bindings::from([
            ("a".to_owned(), "shared".to_owned()),
            ("b".to_owned(), "shared".to_owned()),
            ("c".to_owned(), "solo".to_owned()),
            ("d".to_owned(), "gone".to_owned()),
        ]);

        let out = reconcile(&items, &bindings);

        let aliases = out.iter().map(|i| i.alias.as_str()).collect::<Vec<_>>();
        assert_eq!(aliases, ["a", "b", "c"]);
        assert_eq!(out[0].certificates, ["chain-of-shared"]);
        assert_eq!(out[1].certificates, ["chain-of-shared"]);
        assert_eq!(out[2].certificates, ["chain-of-solo"]);
    }

    #[test]
    fn test_reconcile_nothing_bound() {
        let items = vec![item("x")];
        assert!(reconcile(&items, &Bindings::new()).is_empty());
    }

    #[tokio::test]
    async fn test_listener_inventory_partial() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        for name in ["a", "b", "c"] {
            gw.insert_certificate(name, name);
            gw.insert_binding(&format!("listener-{name}"), name);
        }
        gw.mark_unreadable("b");

        let report = inventory(&gw, BindingPolicy::Listener).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.certificates_read, 2);
        assert_eq!(report.certificates_total, 3);

        let aliases = report
            .items
            .iter()
            .map(|i| i.alias.as_str())
            .collect::<Vec<_>>();
        assert_eq!(aliases, ["listener-a", "listener-c"]);
    }

    #[tokio::test]
    async fn test_certificate_inventory_skips_bindings() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.insert_certificate("a", "a");
        gw.insert_certificate("b", "b");

        let report = inventory(&gw, BindingPolicy::Certificate).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.items.len(), 2);
        assert_eq!(gw.calls(Call::BoundListenerCertificates), 0);
    }

    #[tokio::test]
    async fn test_binding_read_failure() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.fail(Call::BoundListenerCertificates);

        let err = inventory(&gw, BindingPolicy::Listener).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
    }
}
