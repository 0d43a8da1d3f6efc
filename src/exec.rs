//! Carrying out planned operations as ordered sequences of gateway calls.
//!
//! Every call is awaited before the next one is issued; later steps depend on what earlier
//! steps left behind on the gateway.

use uuid::Uuid;

use crate::{
    api::{Certificate, ManagementRequest},
    client::GatewayClient,
    error::{Error, GatewayError, Result},
    observe::{Observer, Step},
    plan::{BindingPolicy, Operation},
};

/// Attempts at drawing a temporary certificate name that is not in use.
const TEMPORARY_NAME_ATTEMPTS: usize = 5;

/// Executes [`Operation`]s against one gateway.
#[derive(Debug)]
pub struct Executor<'a, C, O> {
    client: &'a C,
    policy: BindingPolicy,
    observer: &'a O,
}

impl<'a, C: GatewayClient, O: Observer> Executor<'a, C, O> {
    pub fn new(client: &'a C, policy: BindingPolicy, observer: &'a O) -> Self {
        Executor {
            client,
            policy,
            observer,
        }
    }

    pub async fn execute(&self, operation: Operation, req: &ManagementRequest) -> Result<()> {
        match (self.policy, operation) {
            (_, Operation::DoNothing) => Ok(()),

            (BindingPolicy::Certificate, Operation::Add) => self.add(req).await,
            (BindingPolicy::Certificate, Operation::Replace) => self.replace(req).await,
            (BindingPolicy::Certificate, Operation::Remove) => self.remove(&req.alias).await,

            (BindingPolicy::Listener, Operation::Add) => self.add_and_bind(req).await,
            (BindingPolicy::Listener, Operation::Replace) => self.replace_and_rebind(req).await,
            (BindingPolicy::Listener, Operation::Remove) => Err(Error::config(format!(
                "Remove is not supported by {} stores",
                self.policy.store_type()
            ))),
        }
    }

    /// Create the certificate named by the alias, binding it to the request's listener if one
    /// is given.
    ///
    /// Duplicate names are left to the gateway to reject.
    async fn add(&self, req: &ManagementRequest) -> Result<()> {
        log::debug!("Adding certificate \"{}\"", req.alias);

        let cert = self.create(&req.alias, req).await?;

        if let Some(listener) = &req.listener {
            log::debug!("Also binding \"{}\" to listener \"{listener}\"", req.alias);
            self.bind_or_compensate(&cert, listener, true).await?;
        }

        Ok(())
    }

    /// Remove then add. Only reached for certificates no listener uses.
    async fn replace(&self, req: &ManagementRequest) -> Result<()> {
        log::debug!("Replacing certificate \"{}\"", req.alias);

        if self.client.certificate_exists(&req.alias).await? {
            self.remove(&req.alias).await?;
        } else {
            log::debug!("Certificate \"{}\" not present, nothing to remove", req.alias);
        }

        self.add(req).await
    }

    /// Listeners are never unbound implicitly, so a bound certificate is not removed.
    async fn remove(&self, name: &str) -> Result<()> {
        log::debug!("Removing certificate \"{name}\"");

        let cert = self.client.certificate_by_name(name).await?;

        if self.client.certificate_is_bound(&cert.name).await? {
            return Err(GatewayError::CertificateBound {
                certificate: cert.name,
                listener: None,
            }
            .into());
        }

        self.delete(&cert.name).await?;
        Ok(())
    }

    /// Make sure a certificate named after the listener exists and bind it.
    ///
    /// An existing certificate with that name is bound as is. Whatever the listener was bound
    /// to before stays on the gateway.
    async fn add_and_bind(&self, req: &ManagementRequest) -> Result<()> {
        let listener = &req.alias;

        let (cert, created) = if !self.client.certificate_exists(listener).await? {
            log::trace!("Adding certificate \"{listener}\"");
            (self.create(listener, req).await?, true)
        } else {
            log::trace!("Certificate \"{listener}\" already exists");
            (self.client.certificate_by_name(listener).await?, false)
        };

        self.bind_or_compensate(&cert, listener, created).await?;

        log::debug!("Bound certificate \"{listener}\" to listener \"{listener}\"");
        Ok(())
    }

    /// Replace the certificate bound to the listener without the listener ever going unbound.
    ///
    /// 1. note the certificate currently bound to the listener
    /// 2. create a temporary certificate with the new contents
    /// 3. bind the temporary certificate; the listener now serves the new contents
    /// 4. remove the original certificate
    /// 5. recreate the certificate under the listener's name
    /// 6. bind the recreated certificate
    /// 7. remove the temporary certificate
    ///
    /// Failures after step 3 are not rolled back, since that would risk the live binding.
    async fn replace_and_rebind(&self, req: &ManagementRequest) -> Result<()> {
        let listener = &req.alias;

        let bindings = self.client.bound_listener_certificates().await?;
        let original = bindings.get(listener).cloned().ok_or_else(|| {
            Error::precondition(format!(
                "HTTPS listener called \"{listener}\" does not exist on the gateway or has no bound certificate"
            ))
        })?;

        let temporary = self.temporary_name().await?;

        log::trace!("Creating temporary certificate \"{temporary}\"");
        let temp_cert = self.create(&temporary, req).await?;

        log::trace!("Binding temporary certificate \"{temporary}\" to listener \"{listener}\"");
        self.bind_or_compensate(&temp_cert, listener, true).await?;

        let incomplete = |stage: &'static str| {
            let listener = listener.clone();
            let original = original.clone();
            let temporary = temporary.clone();

            move |source: GatewayError| Error::Incomplete {
                listener,
                original,
                temporary,
                stage,
                source,
            }
        };

        log::trace!("Removing original certificate \"{original}\"");
        self.delete(&original)
            .await
            .map_err(incomplete("removing the original certificate"))?;

        log::trace!("Recreating certificate \"{listener}\"");
        let cert = self
            .create(listener, req)
            .await
            .map_err(incomplete("recreating the certificate"))?;

        log::trace!("Binding recreated certificate \"{listener}\" to listener \"{listener}\"");
        self.bind(&cert, listener)
            .await
            .map_err(incomplete("binding the recreated certificate"))?;

        log::trace!("Removing temporary certificate \"{temporary}\"");
        self.delete(&temporary)
            .await
            .map_err(incomplete("removing the temporary certificate"))?;

        log::debug!("Replaced certificate bound to listener \"{listener}\"");
        Ok(())
    }

    /// Bind `cert`, deleting it again if the bind fails and this operation created it.
    async fn bind_or_compensate(
        &self,
        cert: &Certificate,
        listener: &str,
        created: bool,
    ) -> Result<()> {
        let Err(err) = self.bind(cert, listener).await else {
            return Ok(());
        };

        if !created {
            return Err(err.into());
        }

        log::warn!(
            "Failed to bind certificate \"{}\" to listener \"{listener}\"; removing it from the gateway",
            cert.name
        );

        match self.client.remove_certificate(&cert.name).await {
            Ok(()) => {
                self.observer.step(Step::Compensated { name: &cert.name });
                Err(err.into())
            }

            Err(cleanup) => {
                log::warn!(
                    "Could not remove orphaned certificate \"{}\": {cleanup}",
                    cert.name
                );

                Err(Error::Orphaned {
                    certificate: cert.name.clone(),
                    source: err,
                    cleanup,
                })
            }
        }
    }

    async fn create(
        &self,
        name: &str,
        req: &ManagementRequest,
    ) -> Result<Certificate, GatewayError> {
        let cert = self
            .client
            .create_certificate(name, &req.contents, &req.password)
            .await?;

        self.observer.step(Step::CertificateCreated { name });
        Ok(cert)
    }

    async fn bind(&self, cert: &Certificate, listener: &str) -> Result<(), GatewayError> {
        self.client.bind_certificate(cert, listener).await?;

        self.observer.step(Step::ListenerBound {
            listener,
            certificate: &cert.name,
        });
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), GatewayError> {
        self.client.remove_certificate(name).await?;

        self.observer.step(Step::CertificateRemoved { name });
        Ok(())
    }

    async fn temporary_name(&self) -> Result<String> {
        for _ in 0..TEMPORARY_NAME_ATTEMPTS {
            let name = random_name();

            if !self.client.certificate_exists(&name).await? {
                return Ok(name);
            }

            log::debug!("Temporary certificate name \"{name}\" is taken");
        }

        Err(Error::precondition(
            "could not find an unused temporary certificate name",
        ))
    }
}

fn random_name() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::{Call, MemoryGateway},
        error::ErrorKind,
        observe::tests::Recorder,
        test::{gateway_with_bound_listener, RESOURCE_ID},
    };

    fn exec<'a>(
        gw: &'a MemoryGateway,
        policy: BindingPolicy,
        rec: &'a Recorder,
    ) -> Executor<'a, MemoryGateway, Recorder> {
        Executor::new(gw, policy, rec)
    }

    #[test]
    fn test_random_name_shape() {
        let name = random_name();
        let uuid = name.parse::<Uuid>().unwrap();
        assert_eq!(uuid.get_version_num(), 4);
        assert_ne!(name, random_name());
    }

    #[tokio::test]
    async fn test_add_with_listener_binds() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.add_listener("https-443");
        let rec = Recorder::default();

        let req = ManagementRequest::add("cert1", "data", "pw").with_listener("https-443");
        exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Add, &req)
            .await
            .unwrap();

        assert_eq!(gw.binding_of("https-443").as_deref(), Some("cert1"));
    }

    #[tokio::test]
    async fn test_add_compensates_failed_bind() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        let rec = Recorder::default();

        // listener does not exist
        let req = ManagementRequest::add("cert1", "data", "pw").with_listener("missing");
        let err = exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Add, &req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(gw.certificate_names().is_empty());
        assert_eq!(
            rec.take(),
            [
                "created certificate \"cert1\"",
                "deleted orphaned certificate \"cert1\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_add_reports_certificate_left_behind() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.fail_for(Call::RemoveCertificate, "cert1");
        let rec = Recorder::default();

        let req = ManagementRequest::add("cert1", "data", "pw").with_listener("missing");
        let err = exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Add, &req)
            .await
            .unwrap_err();

        let Error::Orphaned { certificate, .. } = &err else {
            panic!("expected orphaned certificate, got {err:?}");
        };
        assert_eq!(certificate, "cert1");
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let msg = err.to_string();
        assert!(msg.contains("\"missing\""));
        assert!(msg.contains("\"cert1\""));

        assert_eq!(gw.certificate_names(), ["cert1"]);
        assert_eq!(rec.take(), ["created certificate \"cert1\""]);
    }

    #[tokio::test]
    async fn test_replace_without_existing_certificate() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        let rec = Recorder::default();

        let req = ManagementRequest::add("cert1", "data", "pw").with_overwrite(true);
        exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap();

        assert_eq!(gw.contents_of("cert1").as_deref(), Some("data"));
        assert_eq!(gw.calls(Call::RemoveCertificate), 0);
    }

    #[tokio::test]
    async fn test_replace_swaps_contents() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.insert_certificate("cert1", "old");
        let rec = Recorder::default();

        let req = ManagementRequest::add("cert1", "new", "pw").with_overwrite(true);
        exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap();

        assert_eq!(gw.contents_of("cert1").as_deref(), Some("new"));
        assert_eq!(
            rec.take(),
            [
                "removed certificate \"cert1\"",
                "created certificate \"cert1\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_missing_certificate() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        let rec = Recorder::default();

        let err = exec(&gw, BindingPolicy::Certificate, &rec)
            .execute(Operation::Remove, &ManagementRequest::remove("nope"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn test_add_and_bind_reuses_existing_certificate() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.add_listener("L");
        gw.insert_certificate("L", "existing");
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Add, &req)
            .await
            .unwrap();

        assert_eq!(gw.binding_of("L").as_deref(), Some("L"));
        assert_eq!(gw.contents_of("L").as_deref(), Some("existing"));
        assert_eq!(gw.calls(Call::CreateCertificate), 0);
    }

    #[tokio::test]
    async fn test_add_and_bind_missing_listener_leaves_nothing_behind() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Add, &req)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Gateway(GatewayError::ListenerNotFound(_))
        ));
        assert!(gw.certificate_names().is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_rebind_step_order() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap();

        let steps = rec.take();
        assert_eq!(steps.len(), 6);

        let temporary = steps[0]
            .strip_prefix("created certificate \"")
            .and_then(|s| s.strip_suffix('"'))
            .unwrap()
            .to_owned();

        assert_eq!(
            steps,
            [
                format!("created certificate \"{temporary}\""),
                format!("bound certificate \"{temporary}\" to listener \"L\""),
                "removed certificate \"L\"".to_owned(),
                "created certificate \"L\"".to_owned(),
                "bound certificate \"L\" to listener \"L\"".to_owned(),
                format!("removed certificate \"{temporary}\""),
            ]
        );
    }

    #[tokio::test]
    async fn test_replace_and_rebind_never_unbinds() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap();

        let history = gw.history();
        assert_eq!(history.len(), 6);

        for snapshot in &history {
            let served = snapshot["L"].as_ref().expect("listener went unbound");
            assert!(served.contents == "old" || served.contents == "new");
        }

        assert_eq!(gw.certificate_names(), ["L"]);
        assert_eq!(gw.contents_of("L").as_deref(), Some("new"));
        assert_eq!(gw.binding_of("L").as_deref(), Some("L"));
    }

    #[tokio::test]
    async fn test_replace_and_rebind_temp_bind_failure_removes_temporary() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        gw.fail(Call::BindCertificate);
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(gw.certificate_names(), ["L"]);
        assert_eq!(gw.contents_of("L").as_deref(), Some("old"));
        assert_eq!(gw.binding_of("L").as_deref(), Some("L"));
    }

    #[tokio::test]
    async fn test_replace_and_rebind_reports_temporary_left_behind() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        gw.fail(Call::BindCertificate);
        gw.fail(Call::RemoveCertificate);
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap_err();

        let Error::Orphaned { certificate, .. } = &err else {
            panic!("expected orphaned certificate, got {err:?}");
        };
        assert_ne!(certificate, "L");
        assert!(gw.certificate_names().contains(certificate));
        assert_eq!(gw.binding_of("L").as_deref(), Some("L"));
        assert_eq!(gw.contents_of("L").as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_replace_and_rebind_failure_after_swap_is_incomplete() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        gw.fail_for(Call::RemoveCertificate, "L");
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap_err();

        let Error::Incomplete {
            original,
            temporary,
            ..
        } = &err
        else {
            panic!("expected incomplete replacement, got {err:?}");
        };

        assert_eq!(original, "L");

        // listener still served, by the temporary certificate with the new contents
        let served = gw.served()["L"].clone().unwrap();
        assert_eq!(&served.certificate, temporary);
        assert_eq!(served.contents, "new");

        assert_eq!(gw.certificate_names().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_and_rebind_final_cleanup_failure() {
        let gw = gateway_with_bound_listener("L", "L", "old");
        // step 4 removes the original, step 7 the temporary
        gw.fail_after(Call::RemoveCertificate, 1);
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Incomplete);
        assert_eq!(gw.binding_of("L").as_deref(), Some("L"));
        assert_eq!(gw.contents_of("L").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_replace_and_rebind_requires_binding() {
        let gw = MemoryGateway::new(RESOURCE_ID);
        gw.add_listener("L");
        let rec = Recorder::default();

        let req = ManagementRequest::add("L", "new", "pw");
        let err = exec(&gw, BindingPolicy::Listener, &rec)
            .execute(Operation::Replace, &req)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(gw.calls(Call::CreateCertificate), 0);
    }
}
