//! Jobs invoked by the calling platform.
//!
//! Each job reports a [`JobResult`] instead of an error. Failures are logged and turned into a
//! result message so the platform can show them to an operator.

use serde::Serialize;

use crate::{
    api::{InventoryItem, ManagementRequest},
    client::{CachedClient, GatewayClient},
    config::{ClientConfig, DiscoveryJobConfig, ResourceId},
    error::{GatewayError, Result},
    exec::Executor,
    inventory::{inventory, InventoryReport},
    observe::{LogObserver, Observer, Step},
    plan::{plan, BindingPolicy},
};

/// Outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Success,

    /// The job finished but its output is incomplete.
    Warning,

    Failure,
}

/// Outcome reported to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobResult {
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobResult {
    pub fn success() -> Self {
        JobResult {
            status: JobStatus::Success,
            message: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        JobResult {
            status: JobStatus::Warning,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        JobResult {
            status: JobStatus::Failure,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Adds or removes one certificate.
#[derive(Debug, Clone)]
pub struct ManagementJob<O = LogObserver> {
    policy: BindingPolicy,
    observer: O,
}

impl ManagementJob {
    pub fn new(policy: BindingPolicy) -> Self {
        ManagementJob {
            policy,
            observer: LogObserver,
        }
    }
}

impl<O: Observer> ManagementJob<O> {
    /// Report every step to `observer` instead of the log.
    pub fn with_observer<P: Observer>(self, observer: P) -> ManagementJob<P> {
        ManagementJob {
            policy: self.policy,
            observer,
        }
    }

    pub async fn run<C: GatewayClient>(&self, client: C, req: &ManagementRequest) -> JobResult {
        log::debug!(
            "Beginning {} {} job for \"{}\"",
            self.policy.store_type(),
            req.action,
            req.alias
        );

        match self.execute(client, req).await {
            Ok(()) => {
                log::debug!("{} job for \"{}\" complete", req.action, req.alias);
                JobResult::success()
            }

            Err(err) => {
                log::error!("{} job for \"{}\" failed: {err}", req.action, req.alias);
                JobResult::failure(err.to_string())
            }
        }
    }

    async fn execute<C: GatewayClient>(&self, client: C, req: &ManagementRequest) -> Result<()> {
        let client = CachedClient::new(client);

        let operation = plan(&client, self.policy, req).await?;
        self.observer.step(Step::Planned {
            alias: &req.alias,
            operation,
        });

        Executor::new(&client, self.policy, &self.observer)
            .execute(operation, req)
            .await
    }
}

/// Reports the certificates present on one gateway.
#[derive(Debug, Clone)]
pub struct InventoryJob {
    policy: BindingPolicy,
    gateway: Option<ResourceId>,
}

impl InventoryJob {
    pub fn new(policy: BindingPolicy) -> Self {
        InventoryJob {
            policy,
            gateway: None,
        }
    }

    /// Name the gateway in result messages.
    pub fn with_gateway(mut self, gateway: ResourceId) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Read the inventory and hand it to `sink`.
    ///
    /// Certificates that could not be read are left out of the inventory and turn the result
    /// into a warning. The sink still receives everything that was read.
    pub async fn run<C, F>(&self, client: C, sink: F) -> JobResult
    where
        C: GatewayClient,
        F: FnOnce(Vec<InventoryItem>) -> eyre::Result<()>,
    {
        log::debug!("Beginning {} inventory job", self.policy.store_type());

        let report = match inventory(&client, self.policy).await {
            Ok(report) => report,
            Err(err) => {
                log::error!("Inventory of {} failed: {err}", self.gateway_name());
                return JobResult::failure(format!(
                    "Error getting certificates from {}:\n{err}",
                    self.gateway_name()
                ));
            }
        };

        let warning = (!report.is_complete()).then(|| self.incomplete_message(&report));

        log::debug!(
            "Reporting {} inventory items for {}",
            report.items.len(),
            self.gateway_name()
        );

        if let Err(err) = sink(report.items) {
            log::error!("Could not submit inventory: {err:#}");
            return JobResult::failure(format!("Could not submit inventory: {err:#}"));
        }

        match warning {
            Some(message) => {
                log::warn!("{message}");
                JobResult::warning(message)
            }
            None => JobResult::success(),
        }
    }

    fn gateway_name(&self) -> String {
        match &self.gateway {
            Some(id) => format!("the application gateway called {} ({id})", id.name()),
            None => "the application gateway".to_owned(),
        }
    }

    fn incomplete_message(&self, report: &InventoryReport) -> String {
        let mut message = format!(
            "Certificate inventory may be incomplete. Successfully read {}/{} certificates present in {}.\nError summary:",
            report.certificates_read,
            report.certificates_total,
            self.gateway_name()
        );

        for failure in &report.failures {
            message.push('\n');
            message.push_str(failure);
        }

        message
    }
}

/// Finds the gateways visible in each configured tenant.
#[derive(Clone)]
pub struct DiscoveryJob {
    config: DiscoveryJobConfig,
}

impl DiscoveryJob {
    pub fn new(config: DiscoveryJobConfig) -> Self {
        DiscoveryJob { config }
    }

    /// Connect to every tenant with `connect` and hand the discovered gateway identifiers to
    /// `sink`.
    ///
    /// Tenants are searched one after the other. Any failure fails the whole job.
    pub async fn run<C, F, S>(&self, connect: F, sink: S) -> JobResult
    where
        C: GatewayClient,
        F: FnMut(&ClientConfig) -> Result<C, GatewayError>,
        S: FnOnce(Vec<String>) -> eyre::Result<()>,
    {
        log::debug!("Beginning discovery job");

        let gateways = match self.discover(connect).await {
            Ok(gateways) => gateways,
            Err(err) => {
                log::error!("Discovery failed: {err}");
                return JobResult::failure(err.to_string());
            }
        };

        log::debug!("Discovered {} application gateways", gateways.len());

        match sink(gateways) {
            Ok(()) => JobResult::success(),
            Err(err) => {
                log::error!("Could not submit discovered gateways: {err:#}");
                JobResult::failure(format!("Could not submit discovered gateways: {err:#}"))
            }
        }
    }

    async fn discover<C, F>(&self, mut connect: F) -> Result<Vec<String>>
    where
        C: GatewayClient,
        F: FnMut(&ClientConfig) -> Result<C, GatewayError>,
    {
        let mut gateways = Vec::new();

        for tenant in self.config.tenants() {
            let config = self.config.client_config(&tenant)?;
            let client = connect(&config)?;

            let found = client.discover_gateways().await?;
            log::trace!("Found {} gateways in tenant \"{tenant}\"", found.len());

            gateways.extend(found);
        }

        Ok(gateways)
    }
}
