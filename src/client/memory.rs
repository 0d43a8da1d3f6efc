use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{
    api::{Bindings, Certificate, InventoryItem, InventoryListing},
    client::GatewayClient,
    error::GatewayError,
};

/// Gateway client calls, used to count calls and inject failures on [`MemoryGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Call {
    CreateCertificate,
    RemoveCertificate,
    CertificateByName,
    CertificateExists,
    CertificateIsBound,
    BindCertificate,
    ListenerExists,
    BoundListenerCertificates,
    ListCertificates,
    DiscoverGateways,
}

/// Certificate serving a listener at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub certificate: String,
    pub contents: String,
}

#[derive(Debug)]
struct Stored {
    id: String,
    contents: String,
    readable: bool,
    key_vault_secret_id: Option<String>,
}

#[derive(Debug)]
struct Fault {
    call: Call,
    target: Option<String>,
    skip: usize,
}

#[derive(Debug, Default)]
struct State {
    certificates: BTreeMap<String, Stored>,
    listeners: BTreeMap<String, Option<String>>,
    gateways: Vec<String>,
    faults: Vec<Fault>,
    calls: BTreeMap<Call, usize>,
    history: Vec<BTreeMap<String, Option<Served>>>,
}

impl State {
    fn enter(&mut self, call: Call, target: &str) -> Result<(), GatewayError> {
        *self.calls.entry(call).or_default() += 1;

        for fault in &mut self.faults {
            if fault.call != call {
                continue;
            }

            if fault.target.as_deref().is_some_and(|t| t != target) {
                continue;
            }

            if fault.skip > 0 {
                fault.skip -= 1;
                continue;
            }

            log::trace!("Injecting failure into {call:?} for \"{target}\"");
            return Err(GatewayError::remote(format!(
                "injected failure in {call:?} for \"{target}\""
            )));
        }

        Ok(())
    }

    fn served(&self) -> BTreeMap<String, Option<Served>> {
        self.listeners
            .iter()
            .map(|(listener, bound)| {
                let served = bound.as_ref().and_then(|name| {
                    self.certificates.get(name).map(|stored| Served {
                        certificate: name.clone(),
                        contents: stored.contents.clone(),
                    })
                });

                (listener.clone(), served)
            })
            .collect()
    }

    fn record(&mut self) {
        let snapshot = self.served();
        self.history.push(snapshot);
    }

    fn listener_of(&self, name: &str) -> Option<&String> {
        self.listeners
            .iter()
            .find(|(_, bound)| bound.as_deref() == Some(name))
            .map(|(listener, _)| listener)
    }

    fn certificate(&self, name: &str) -> Result<Certificate, GatewayError> {
        let stored = self
            .certificates
            .get(name)
            .ok_or_else(|| GatewayError::CertificateNotFound(name.to_owned()))?;

        Ok(Certificate {
            id: stored.id.clone(),
            name: name.to_owned(),
            public_cert_data: stored.readable.then(|| stored.contents.clone()),
            key_vault_secret_id: stored.key_vault_secret_id.clone(),
        })
    }
}

/// In-memory gateway implementing [`GatewayClient`].
///
/// Holds certificates and HTTPS listeners, and enforces the same rules a real gateway does:
/// unique certificate names, one certificate per listener, and no removal of bound
/// certificates. Every successful mutation appends a snapshot of what each listener serves to
/// [`history`](Self::history).
#[derive(Debug)]
pub struct MemoryGateway {
    resource_id: String,
    state: Mutex<State>,
}

impl MemoryGateway {
    pub fn new(resource_id: impl Into<String>) -> Self {
        MemoryGateway {
            resource_id: resource_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn id_prefix(&self) -> String {
        format!("{}/sslCertificates/", self.resource_id)
    }

    /// Add an HTTPS listener with no certificate bound.
    pub fn add_listener(&self, name: &str) {
        self.state.lock().listeners.entry(name.to_owned()).or_default();
    }

    /// Seed a certificate without going through the client contract.
    pub fn insert_certificate(&self, name: &str, contents: &str) {
        let id = format!("{}{name}", self.id_prefix());

        self.state.lock().certificates.insert(
            name.to_owned(),
            Stored {
                id,
                contents: contents.to_owned(),
                readable: true,
                key_vault_secret_id: None,
            },
        );
    }

    /// Seed a binding, creating the listener if needed.
    ///
    /// # Panics
    ///
    /// Panics if the certificate has not been inserted.
    pub fn insert_binding(&self, listener: &str, certificate: &str) {
        let mut state = self.state.lock();
        assert!(
            state.certificates.contains_key(certificate),
            "unknown certificate {certificate}"
        );
        state
            .listeners
            .insert(listener.to_owned(), Some(certificate.to_owned()));
    }

    /// Make a certificate's chain unreadable for inventory listings.
    pub fn mark_unreadable(&self, name: &str) {
        if let Some(stored) = self.state.lock().certificates.get_mut(name) {
            stored.readable = false;
        }
    }

    /// Store a certificate's public data in Key Vault instead of inline.
    ///
    /// The gateway cannot read it back, so inventory listings report it as a failure naming
    /// the secret.
    pub fn move_to_key_vault(&self, name: &str, secret_id: &str) {
        if let Some(stored) = self.state.lock().certificates.get_mut(name) {
            stored.readable = false;
            stored.key_vault_secret_id = Some(secret_id.to_owned());
        }
    }

    pub fn set_gateways(&self, gateways: Vec<String>) {
        self.state.lock().gateways = gateways;
    }

    /// Fail every `call`.
    pub fn fail(&self, call: Call) {
        self.push_fault(call, None, 0);
    }

    /// Fail `call` when it targets `target`.
    ///
    /// The target is the name of the certificate the call operates on, or the listener's name
    /// for [`Call::ListenerExists`].
    pub fn fail_for(&self, call: Call, target: &str) {
        self.push_fault(call, Some(target.to_owned()), 0);
    }

    /// Let `skip` calls through, then fail every following `call`.
    pub fn fail_after(&self, call: Call, skip: usize) {
        self.push_fault(call, None, skip);
    }

    fn push_fault(&self, call: Call, target: Option<String>, skip: usize) {
        self.state.lock().faults.push(Fault { call, target, skip });
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// How many times `call` was issued, including failed calls.
    pub fn calls(&self, call: Call) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or_default()
    }

    pub fn certificate_names(&self) -> Vec<String> {
        self.state.lock().certificates.keys().cloned().collect()
    }

    pub fn contents_of(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .certificates
            .get(name)
            .map(|stored| stored.contents.clone())
    }

    pub fn binding_of(&self, listener: &str) -> Option<String> {
        self.state.lock().listeners.get(listener).cloned().flatten()
    }

    /// What every listener serves right now.
    pub fn served(&self) -> BTreeMap<String, Option<Served>> {
        self.state.lock().served()
    }

    /// What every listener served after each successful mutation, oldest first.
    pub fn history(&self) -> Vec<BTreeMap<String, Option<Served>>> {
        self.state.lock().history.clone()
    }
}

impl GatewayClient for MemoryGateway {
    async fn create_certificate(
        &self,
        name: &str,
        contents: &str,
        _password: &str,
    ) -> Result<Certificate, GatewayError> {
        let prefix = self.id_prefix();
        let mut state = self.state.lock();
        state.enter(Call::CreateCertificate, name)?;

        if state.certificates.contains_key(name) {
            return Err(GatewayError::CertificateExists(name.to_owned()));
        }

        log::debug!("Adding certificate \"{name}\" to {}", self.resource_id);

        state.certificates.insert(
            name.to_owned(),
            Stored {
                id: format!("{prefix}{name}"),
                contents: contents.to_owned(),
                readable: true,
                key_vault_secret_id: None,
            },
        );
        state.record();

        state.certificate(name)
    }

    async fn remove_certificate(&self, name: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::RemoveCertificate, name)?;

        if !state.certificates.contains_key(name) {
            return Err(GatewayError::CertificateNotFound(name.to_owned()));
        }

        if let Some(listener) = state.listener_of(name) {
            return Err(GatewayError::CertificateBound {
                certificate: name.to_owned(),
                listener: Some(listener.clone()),
            });
        }

        log::debug!("Removing certificate \"{name}\" from {}", self.resource_id);

        state.certificates.remove(name);
        state.record();

        Ok(())
    }

    async fn certificate_by_name(&self, name: &str) -> Result<Certificate, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::CertificateByName, name)?;
        state.certificate(name)
    }

    async fn certificate_exists(&self, name: &str) -> Result<bool, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::CertificateExists, name)?;
        Ok(state.certificates.contains_key(name))
    }

    async fn certificate_is_bound(&self, name: &str) -> Result<bool, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::CertificateIsBound, name)?;
        Ok(state.listener_of(name).is_some())
    }

    async fn bind_certificate(
        &self,
        certificate: &Certificate,
        listener: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::BindCertificate, &certificate.name)?;

        match state.certificates.get(&certificate.name) {
            Some(stored) if stored.id == certificate.id => {}
            _ => return Err(GatewayError::CertificateNotFound(certificate.name.clone())),
        }

        let Some(bound) = state.listeners.get_mut(listener) else {
            return Err(GatewayError::ListenerNotFound(listener.to_owned()));
        };

        log::debug!(
            "Updating listener \"{listener}\" to use certificate \"{}\"",
            certificate.name
        );

        *bound = Some(certificate.name.clone());
        state.record();

        Ok(())
    }

    async fn listener_exists(&self, name: &str) -> Result<bool, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::ListenerExists, name)?;
        Ok(state.listeners.contains_key(name))
    }

    async fn bound_listener_certificates(&self) -> Result<Bindings, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::BoundListenerCertificates, "")?;

        Ok(state
            .listeners
            .iter()
            .filter_map(|(listener, bound)| Some((listener.clone(), bound.clone()?)))
            .collect())
    }

    async fn list_certificates(&self) -> Result<InventoryListing, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::ListCertificates, "")?;

        let mut listing = InventoryListing::default();

        for (name, stored) in &state.certificates {
            if stored.readable {
                listing
                    .items
                    .push(InventoryItem::new(name, vec![stored.contents.clone()]));
            } else if let Some(secret_id) = &stored.key_vault_secret_id {
                listing.failures.push(format!(
                    "Failed to download certificate from Azure Key Vault with ID {secret_id}"
                ));
            } else {
                listing.failures.push(format!(
                    "Certificate called \"{name}\" ({}) does not have any public certificate data or Key Vault secret ID.",
                    stored.id
                ));
            }
        }

        Ok(listing)
    }

    async fn discover_gateways(&self) -> Result<Vec<String>, GatewayError> {
        let mut state = self.state.lock();
        state.enter(Call::DiscoverGateways, "")?;
        Ok(state.gateways.clone())
    }
}
