//! The remote gateway contract the engine is written against.
//!
//! Transport, authentication and wire formats live behind [`GatewayClient`]. The engine only
//! ever issues one call at a time and waits for it before deciding on the next.

use crate::{
    api::{Bindings, Certificate, InventoryListing},
    error::GatewayError,
};

mod cache;
mod memory;

pub use self::{
    cache::CachedClient,
    memory::{Call, MemoryGateway, Served},
};

/// Certificate store and HTTPS listener operations of a single gateway.
///
/// Implementations are not expected to coordinate concurrent callers. The calling platform
/// serializes jobs against one gateway.
#[allow(async_fn_in_trait)]
pub trait GatewayClient {
    /// Upload a base64 PKCS#12 certificate under `name`.
    ///
    /// Fails with [`GatewayError::CertificateExists`] if the name is taken.
    async fn create_certificate(
        &self,
        name: &str,
        contents: &str,
        password: &str,
    ) -> Result<Certificate, GatewayError>;

    /// Fails with [`GatewayError::CertificateBound`] while any listener uses the certificate.
    async fn remove_certificate(&self, name: &str) -> Result<(), GatewayError>;

    async fn certificate_by_name(&self, name: &str) -> Result<Certificate, GatewayError>;

    async fn certificate_exists(&self, name: &str) -> Result<bool, GatewayError>;

    /// Returns false for certificates that do not exist.
    async fn certificate_is_bound(&self, name: &str) -> Result<bool, GatewayError>;

    /// Point `listener` at `certificate`, replacing whatever it was bound to.
    async fn bind_certificate(
        &self,
        certificate: &Certificate,
        listener: &str,
    ) -> Result<(), GatewayError>;

    /// Returns true if an HTTPS listener called `name` exists, bound or not.
    async fn listener_exists(&self, name: &str) -> Result<bool, GatewayError>;

    async fn bound_listener_certificates(&self) -> Result<Bindings, GatewayError>;

    /// Read every certificate with its chain.
    ///
    /// A certificate whose chain cannot be read is reported in
    /// [`InventoryListing::failures`] instead of failing the call.
    async fn list_certificates(&self) -> Result<InventoryListing, GatewayError>;

    /// Identifiers of every gateway visible to the client's credentials.
    async fn discover_gateways(&self) -> Result<Vec<String>, GatewayError>;
}

impl<C: GatewayClient> GatewayClient for &C {
    async fn create_certificate(
        &self,
        name: &str,
        contents: &str,
        password: &str,
    ) -> Result<Certificate, GatewayError> {
        (**self).create_certificate(name, contents, password).await
    }

    async fn remove_certificate(&self, name: &str) -> Result<(), GatewayError> {
        (**self).remove_certificate(name).await
    }

    async fn certificate_by_name(&self, name: &str) -> Result<Certificate, GatewayError> {
        (**self).certificate_by_name(name).await
    }

    async fn certificate_exists(&self, name: &str) -> Result<bool, GatewayError> {
        (**self).certificate_exists(name).await
    }

    async fn certificate_is_bound(&self, name: &str) -> Result<bool, GatewayError> {
        (**self).certificate_is_bound(name).await
    }

    async fn bind_certificate(
        &self,
        certificate: &Certificate,
        listener: &str,
    ) -> Result<(), GatewayError> {
        (**self).bind_certificate(certificate, listener).await
    }

    async fn listener_exists(&self, name: &str) -> Result<bool, GatewayError> {
        (**self).listener_exists(name).await
    }

    async fn bound_listener_certificates(&self) -> Result<Bindings, GatewayError> {
        (**self).bound_listener_certificates().await
    }

    async fn list_certificates(&self) -> Result<InventoryListing, GatewayError> {
        (**self).list_certificates().await
    }

    async fn discover_gateways(&self) -> Result<Vec<String>, GatewayError> {
        (**self).discover_gateways().await
    }
}
