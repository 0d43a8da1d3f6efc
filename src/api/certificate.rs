use serde::{Deserialize, Serialize};

/// SSL certificate object held in the gateway's certificate store.
///
/// Certificates are never mutated in place. Replacing one means removing it and creating it
/// again under the same name.
///
/// # Example JSON
///
/// ```json
/// {
///   "id": "/subscriptions/.../applicationGateways/agw/sslCertificates/cert1",
///   "name": "cert1",
///   "publicCertData": "MIIC..."
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Provider-assigned handle.
    ///
    /// Listeners reference certificates by this handle, so it only exists once the certificate
    /// has been created.
    pub id: String,

    /// Name of the certificate, unique per gateway.
    pub name: String,

    /// Public part of the certificate chain as reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_cert_data: Option<String>,

    /// Key vault secret backing the certificate, when it is not stored inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_secret_id: Option<String>,
}
