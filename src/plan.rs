//! Choosing which operation a management request turns into.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    api::{Action, ManagementRequest},
    client::GatewayClient,
    error::{Error, GatewayError, Result},
};

/// How a request's alias relates to the gateway's certificates and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingPolicy {
    /// The alias is the certificate's name.
    ///
    /// Binding to a listener only happens when the request names one explicitly.
    Certificate,

    /// The alias is the name of an HTTPS listener.
    ///
    /// The certificate bound to it is kept under the same name as the listener.
    Listener,
}

impl BindingPolicy {
    /// Platform store type implementing this policy.
    pub fn store_type(&self) -> &'static str {
        match self {
            BindingPolicy::Certificate => "AzureAppGW",
            BindingPolicy::Listener => "AzureAppGwBin",
        }
    }

    /// Store types are matched case-insensitively.
    pub fn from_store_type(store_type: &str) -> Option<Self> {
        [BindingPolicy::Certificate, BindingPolicy::Listener]
            .into_iter()
            .find(|policy| policy.store_type().eq_ignore_ascii_case(store_type))
    }
}

/// Planned operation for a management request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Replace,
    Remove,

    /// The certificate is bound and being renewed; the listener-binding store owns this renewal.
    DoNothing,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => f.write_str("Add"),
            Operation::Replace => f.write_str("Replace"),
            Operation::Remove => f.write_str("Remove"),
            Operation::DoNothing => f.write_str("DoNothing"),
        }
    }
}

/// Check a request before any remote call is made.
pub fn validate(policy: BindingPolicy, req: &ManagementRequest) -> Result<()> {
    if req.alias.trim().is_empty() {
        return Err(Error::config("Certificate alias is required."));
    }

    match req.action {
        Action::Remove if policy == BindingPolicy::Listener => Err(Error::config(format!(
            "Remove is not supported by {} stores; unbind the certificate from listener \"{}\" on the gateway instead.",
            policy.store_type(),
            req.alias
        ))),

        // a missing password means the platform did not deliver PKCS#12
        Action::Add if req.password.trim().is_empty() => Err(Error::config(
            "Certificate must be in PKCS#12 format - no private key password provided.",
        )),

        _ => Ok(()),
    }
}

/// Validate `req` and decide which operation carries it out against the current gateway state.
pub async fn plan<C: GatewayClient>(
    client: &C,
    policy: BindingPolicy,
    req: &ManagementRequest,
) -> Result<Operation> {
    validate(policy, req)?;

    match policy {
        BindingPolicy::Certificate => plan_certificate(client, req).await,
        BindingPolicy::Listener => plan_listener(client, req).await,
    }
}

async fn plan_certificate<C: GatewayClient>(
    client: &C,
    req: &ManagementRequest,
) -> Result<Operation> {
    if let (Action::Add, Some(listener)) = (req.action, &req.listener) {
        require_listener(client, listener).await?;
    }

    match req.action {
        Action::Remove => Ok(Operation::Remove),

        Action::Add if req.overwrite => {
            // A renewal of a bound certificate arrives here as well. Replacing it would mean
            // removing a certificate a listener depends on, and the listener-binding store
            // already renews it with a temporary swap.
            if client.certificate_is_bound(&req.alias).await? {
                log::debug!(
                    "Certificate \"{}\" is bound to an HTTPS listener; leaving renewal to the listener-binding store",
                    req.alias
                );
                return Ok(Operation::DoNothing);
            }

            Ok(Operation::Replace)
        }

        Action::Add => Ok(Operation::Add),
    }
}

async fn plan_listener<C: GatewayClient>(
    client: &C,
    req: &ManagementRequest,
) -> Result<Operation> {
    let bindings = client.bound_listener_certificates().await?;

    match bindings.get(&req.alias) {
        Some(bound) if *bound == req.alias => Ok(Operation::Replace),

        Some(bound) => {
            log::debug!(
                "Listener \"{}\" is bound to certificate \"{bound}\"; a certificate named after the listener will be added",
                req.alias
            );
            Ok(Operation::Add)
        }

        None => {
            require_listener(client, &req.alias).await?;
            Ok(Operation::Add)
        }
    }
}

/// Fail before anything is created for a listener that is not there to bind to.
async fn require_listener<C: GatewayClient>(client: &C, listener: &str) -> Result<()> {
    if client.listener_exists(listener).await? {
        return Ok(());
    }

    Err(GatewayError::ListenerNotFound(listener.to_owned()).into())
}
