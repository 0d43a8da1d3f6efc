//! Typed job and store configuration parsed from the platform's JSON.

use std::{collections::HashMap, fmt, str::FromStr};

use base64::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::{
    api::{Action, ManagementRequest},
    error::{Error, Result},
};

/// Job property naming the listener a certificate-store add should also bind to.
const LISTENER_PROPERTY: &str = "HTTPListenerName";

/// Discovery job property listing the tenants to search.
const DIRECTORIES_PROPERTY: &str = "dirs";

/// Sovereign cloud the gateway lives in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AzureCloud {
    #[default]
    Public,
    China,
    Germany,
    Government,
}

impl AzureCloud {
    /// Parse the `AzureCloud` store property. Empty or unknown values mean the public cloud.
    pub fn from_property(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "china" => AzureCloud::China,
            "germany" => AzureCloud::Germany,
            "government" => AzureCloud::Government,
            "" | "public" => AzureCloud::Public,
            other => {
                log::warn!("Unknown cloud \"{other}\", using the public cloud");
                AzureCloud::Public
            }
        }
    }

    /// Identity provider host used to authenticate against this cloud.
    pub fn authority_host(&self) -> &'static str {
        match self {
            AzureCloud::Public => "https://login.microsoftonline.com/",
            AzureCloud::China => "https://login.chinacloudapi.cn/",
            AzureCloud::Germany => "https://login.microsoftonline.de/",
            AzureCloud::Government => "https://login.microsoftonline.us/",
        }
    }
}

/// Resource identifier of an application gateway.
///
/// ```text
/// /subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Network/applicationGateways/{name}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    raw: String,
    subscription_id: String,
    resource_group: String,
    name: String,
}

impl ResourceId {
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Name of the gateway.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::config(format!("invalid application gateway resource ID: \"{s}\""));

        let segments = s.trim().trim_matches('/').split('/').collect::<Vec<_>>();

        let [subs, subscription_id, groups, resource_group, providers, namespace, kind, name] =
            segments.as_slice()
        else {
            return Err(invalid());
        };

        let keys_match = subs.eq_ignore_ascii_case("subscriptions")
            && groups.eq_ignore_ascii_case("resourceGroups")
            && providers.eq_ignore_ascii_case("providers")
            && namespace.eq_ignore_ascii_case("Microsoft.Network")
            && kind.eq_ignore_ascii_case("applicationGateways");

        let values_present = [subscription_id, resource_group, name]
            .iter()
            .all(|value| !value.is_empty());

        if !keys_match || !values_present {
            return Err(invalid());
        }

        Ok(ResourceId {
            raw: s.trim().to_owned(),
            subscription_id: (*subscription_id).to_owned(),
            resource_group: (*resource_group).to_owned(),
            name: (*name).to_owned(),
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// How the client authenticates as the application.
#[derive(Clone)]
pub enum Credential {
    ClientSecret(Zeroizing<String>),
    ClientCertificate {
        /// DER PKCS#12 archive.
        pkcs12: Zeroizing<Vec<u8>>,
        password: Zeroizing<String>,
    },
}

impl Credential {
    /// A client secret wins over a client certificate when both are configured.
    fn resolve(
        secret: Option<&str>,
        certificate: Option<&str>,
        certificate_password: Option<&str>,
    ) -> Result<Self> {
        if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
            return Ok(Credential::ClientSecret(Zeroizing::new(secret.to_owned())));
        }

        if let Some(certificate) = certificate.filter(|c| !c.trim().is_empty()) {
            let pkcs12 = BASE64_STANDARD
                .decode(certificate.trim())
                .map_err(|err| Error::config(format!("client certificate is not base64: {err}")))?;

            return Ok(Credential::ClientCertificate {
                pkcs12: Zeroizing::new(pkcs12),
                password: Zeroizing::new(certificate_password.unwrap_or_default().to_owned()),
            });
        }

        Err(Error::config(
            "Client secret or client certificate must be provided.",
        ))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ClientSecret(_) => f.write_str("ClientSecret(<redacted>)"),
            Credential::ClientCertificate { pkcs12, .. } => {
                write!(f, "ClientCertificate(<{} bytes>)", pkcs12.len())
            }
        }
    }
}

/// Everything needed to construct a gateway client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tenant_id: String,
    pub application_id: String,
    pub credential: Credential,
    pub cloud: AzureCloud,

    /// Gateway the client operates on. Not set for discovery.
    pub resource_id: Option<ResourceId>,
}

/// Certificate store definition as sent by the platform.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreDetails {
    /// Tenant ID.
    pub client_machine: String,

    /// Gateway resource ID.
    pub store_path: String,

    /// JSON object of store properties.
    #[serde(default)]
    pub properties: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoreProperties {
    server_username: Option<String>,
    server_password: Option<String>,
    azure_cloud: Option<String>,
    client_certificate: Option<String>,
    client_certificate_password: Option<String>,
}

impl ClientConfig {
    pub fn from_store(details: &StoreDetails) -> Result<Self> {
        let props = if details.properties.trim().is_empty() {
            StoreProperties::default()
        } else {
            serde_json::from_str::<StoreProperties>(&details.properties)
                .map_err(|err| Error::config(format!("invalid store properties: {err}")))?
        };

        log::trace!("ClientMachine  => TenantId:      {}", details.client_machine);
        log::trace!("StorePath      => ResourceId:    {}", details.store_path);
        log::trace!("ServerUsername => ApplicationId: {:?}", props.server_username);

        let tenant_id = required(&details.client_machine, "ClientMachine (tenant ID)")?;
        let application_id = required(
            props.server_username.as_deref().unwrap_or_default(),
            "ServerUsername (application ID)",
        )?;

        let credential = Credential::resolve(
            props.server_password.as_deref(),
            props.client_certificate.as_deref(),
            props.client_certificate_password.as_deref(),
        )?;

        Ok(ClientConfig {
            tenant_id,
            application_id,
            credential,
            cloud: AzureCloud::from_property(props.azure_cloud.as_deref().unwrap_or_default()),
            resource_id: Some(details.store_path.parse()?),
        })
    }
}

fn required(value: &str, what: &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Error::config(format!("{what} is required.")));
    }

    Ok(value.to_owned())
}

/// Discovery job configuration as sent by the platform.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoveryJobConfig {
    /// Default tenant ID.
    pub client_machine: String,

    #[serde(default)]
    pub server_username: String,

    #[serde(default)]
    pub server_password: String,

    #[serde(default)]
    pub job_properties: HashMap<String, Value>,
}

impl DiscoveryJobConfig {
    /// Tenants to search for gateways.
    ///
    /// Taken from the comma-separated `dirs` job property; empty or `*` means the default
    /// tenant.
    pub fn tenants(&self) -> Vec<String> {
        let dirs = self
            .job_properties
            .get(DIRECTORIES_PROPERTY)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        log::trace!("Directories to search: \"{dirs}\"");

        let tenants = match dirs {
            "" | "*" => Vec::new(),
            dirs => dirs
                .split(',')
                .map(str::trim)
                .filter(|tenant| !tenant.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        };

        if tenants.is_empty() {
            log::trace!("Using default tenant \"{}\"", self.client_machine);
            return vec![self.client_machine.trim().to_owned()];
        }

        tenants
    }

    /// Client configuration for searching `tenant`.
    pub fn client_config(&self, tenant: &str) -> Result<ClientConfig> {
        Ok(ClientConfig {
            tenant_id: required(tenant, "Tenant ID")?,
            application_id: required(&self.server_username, "ServerUsername (application ID)")?,
            credential: Credential::resolve(Some(self.server_password.as_str()), None, None)?,
            cloud: AzureCloud::Public,
            resource_id: None,
        })
    }
}

/// Certificate delivered with a management job.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobCertificate {
    #[serde(default)]
    pub alias: String,

    /// Base64 PKCS#12.
    #[serde(default)]
    pub contents: String,

    #[serde(default)]
    pub private_key_password: Option<String>,
}

impl fmt::Debug for JobCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCertificate")
            .field("alias", &self.alias)
            .field("contents", &format_args!("<{} bytes>", self.contents.len()))
            .finish_non_exhaustive()
    }
}

/// Management job configuration as sent by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagementJobConfig {
    pub operation_type: Action,

    #[serde(default)]
    pub overwrite: bool,

    pub job_certificate: JobCertificate,

    #[serde(default)]
    pub job_properties: HashMap<String, Value>,
}

impl ManagementJobConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| Error::config(format!("invalid management job configuration: {err}")))
    }

    pub fn into_request(self) -> ManagementRequest {
        let listener = self
            .job_properties
            .get(LISTENER_PROPERTY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let cert = self.job_certificate;

        let req = match self.operation_type {
            Action::Add => ManagementRequest::add(
                cert.alias,
                cert.contents,
                cert.private_key_password.unwrap_or_default(),
            ),
            Action::Remove => ManagementRequest::remove(cert.alias),
        };

        req.with_overwrite(self.overwrite).with_listener(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, test::RESOURCE_ID};

    fn store(properties: &str) -> StoreDetails {
        StoreDetails {
            client_machine: "tenant-1".to_owned(),
            store_path: RESOURCE_ID.to_owned(),
            properties: properties.to_owned(),
        }
    }

    #[test]
    fn test_resource_id() {
        let id = RESOURCE_ID.parse::<ResourceId>().unwrap();
        assert_eq!(id.subscription_id(), "00000000-0000-0000-0000-000000000000");
        assert_eq!(id.resource_group(), "rg-edge");
        assert_eq!(id.name(), "agw-edge");
        assert_eq!(id.to_string(), RESOURCE_ID);

        let bad = "/subscriptions/abc/resourceGroups/rg/providers/Microsoft.Web/sites/x";
        let err = bad.parse::<ResourceId>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        assert!("".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_cloud() {
        assert_eq!(AzureCloud::from_property("China"), AzureCloud::China);
        assert_eq!(AzureCloud::from_property(""), AzureCloud::Public);
        assert_eq!(AzureCloud::from_property("mars"), AzureCloud::Public);
        assert_eq!(
            AzureCloud::Government.authority_host(),
            "https://login.microsoftonline.us/"
        );
    }

    #[test]
    fn test_store_with_secret() {
        let details = store(
            r#"{"ServerUsername": "app-1", "ServerPassword": "s3cret", "AzureCloud": "germany"}"#,
        );

        let config = ClientConfig::from_store(&details).unwrap();
        assert_eq!(config.tenant_id, "tenant-1");
        assert_eq!(config.application_id, "app-1");
        assert_eq!(config.cloud, AzureCloud::Germany);
        assert!(matches!(config.credential, Credential::ClientSecret(_)));
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_store_with_client_certificate() {
        let details = store(
            r#"{"ServerUsername": "app-1", "ClientCertificate": "AQID", "ClientCertificatePassword": "pw"}"#,
        );

        let config = ClientConfig::from_store(&details).unwrap();
        let Credential::ClientCertificate { pkcs12, password } = config.credential else {
            panic!("expected client certificate credential");
        };
        assert_eq!(*pkcs12, vec![1u8, 2, 3]);
        assert_eq!(password.as_str(), "pw");
    }

    #[test]
    fn test_store_without_credential() {
        let details = store(r#"{"ServerUsername": "app-1"}"#);
        let err = ClientConfig::from_store(&details).unwrap_err();
        assert!(err.to_string().contains("Client secret or client certificate"));
    }

    #[test]
    fn test_store_missing_fields() {
        let mut details = store(r#"{"ServerPassword": "s3cret"}"#);
        let err = ClientConfig::from_store(&details).unwrap_err();
        assert!(err.to_string().contains("ServerUsername"));

        details.properties = r#"{"ServerUsername": "app-1", "ServerPassword": "s3cret"}"#.into();
        details.store_path = "agw-edge".to_owned();
        let err = ClientConfig::from_store(&details).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        details.properties = "not json".to_owned();
        assert!(ClientConfig::from_store(&details).is_err());
    }

    #[test]
    fn test_discovery_tenants() {
        let config = serde_json::from_str::<DiscoveryJobConfig>(
            r#"{
                "ClientMachine": "default",
                "ServerUsername": "app-1",
                "ServerPassword": "s3cret",
                "JobProperties": { "dirs": " t1, t2 ,,t3 " }
            }"#,
        )
        .unwrap();
        assert_eq!(config.tenants(), ["t1", "t2", "t3"]);

        let config = DiscoveryJobConfig {
            client_machine: "default".to_owned(),
            job_properties: HashMap::from([("dirs".to_owned(), Value::from("*"))]),
            ..Default::default()
        };
        assert_eq!(config.tenants(), ["default"]);

        let config = DiscoveryJobConfig {
            client_machine: "default".to_owned(),
            ..Default::default()
        };
        assert_eq!(config.tenants(), ["default"]);
    }

    #[test]
    fn test_management_job_config() {
        let config = ManagementJobConfig::from_json(
            r#"{
                "OperationType": "Add",
                "Overwrite": true,
                "JobCertificate": {
                    "Alias": "cert1",
                    "Contents": "MIIK",
                    "PrivateKeyPassword": "pw"
                },
                "JobProperties": { "HTTPListenerName": "https-443" }
            }"#,
        )
        .unwrap();

        let req = config.into_request();
        assert_eq!(req.action, Action::Add);
        assert!(req.overwrite);
        assert_eq!(req.alias, "cert1");
        assert_eq!(req.password.as_str(), "pw");
        assert_eq!(req.listener.as_deref(), Some("https-443"));

        let req = ManagementJobConfig::from_json(
            r#"{"OperationType": "Remove", "JobCertificate": {"Alias": "cert1"}}"#,
        )
        .unwrap()
        .into_request();
        assert_eq!(req.action, Action::Remove);
        assert_eq!(req.listener, None);

        let err = ManagementJobConfig::from_json(r#"{"OperationType": "Inventory"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
