use parking_lot::Mutex;

use crate::{
    api::{Bindings, Certificate, InventoryListing},
    client::GatewayClient,
    error::GatewayError,
};

/// Client wrapper that remembers the listener bindings for the life of one job.
///
/// Any create, remove or bind call drops the remembered bindings, whether it succeeded or not,
/// so a read after a mutation always goes to the gateway.
#[derive(Debug)]
pub struct CachedClient<C> {
    client: C,
    bindings: Mutex<Option<Bindings>>,
}

impl<C: GatewayClient> CachedClient<C> {
    pub fn new(client: C) -> Self {
        CachedClient {
            client,
            bindings: Mutex::new(None),
        }
    }

    pub fn invalidate(&self) {
        self.bindings.lock().take();
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: GatewayClient> GatewayClient for CachedClient<C> {
    async fn create_certificate(
        &self,
        name: &str,
        contents: &str,
        password: &str,
    ) -> Result<Certificate, GatewayError> {
        let res = self.client.create_certificate(name, contents, password).await;
        self.invalidate();
        res
    }

    async fn remove_certificate(&self, name: &str) -> Result<(), GatewayError> {
        let res = self.client.remove_certificate(name).await;
        self.invalidate();
        res
    }

    async fn certificate_by_name(&self, name: &str) -> Result<Certificate, GatewayError> {
        self.client.certificate_by_name(name).await
    }

    async fn certificate_exists(&self, name: &str) -> Result<bool, GatewayError> {
        self.client.certificate_exists(name).await
    }

    async fn certificate_is_bound(&self, name: &str) -> Result<bool, GatewayError> {
        self.client.certificate_is_bound(name).await
    }

    async fn bind_certificate(
        &self,
        certificate: &Certificate,
        listener: &str,
    ) -> Result<(), GatewayError> {
        let res = self.client.bind_certificate(certificate, listener).await;
        self.invalidate();
        res
    }

    async fn listener_exists(&self, name: &str) -> Result<bool, GatewayError> {
        self.client.listener_exists(name).await
    }

    async fn bound_listener_certificates(&self) -> Result<Bindings, GatewayError> {
        let cached = self.bindings.lock().clone();

        if let Some(bindings) = cached {
            log::trace!("Using cached listener bindings");
            return Ok(bindings);
        }

        log::debug!("Fetching listener bindings");
        let bindings = self.client.bound_listener_certificates().await?;
        *self.bindings.lock() = Some(bindings.clone());

        Ok(bindings)
    }

    async fn list_certificates(&self) -> Result<InventoryListing, GatewayError> {
        self.client.list_certificates().await
    }

    async fn discover_gateways(&self) -> Result<Vec<String>, GatewayError> {
        self.client.discover_gateways().await
    }
}
