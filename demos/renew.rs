use appgw::{
    BindingPolicy, ClientConfig, ManagementJob, ManagementJobConfig, MemoryGateway, StoreDetails,
};

const STORE: &str = r#"{
    "ClientMachine": "00000000-0000-0000-0000-000000000001",
    "StorePath": "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-edge/providers/Microsoft.Network/applicationGateways/agw-edge",
    "Properties": "{\"ServerUsername\": \"app-1\", \"ServerPassword\": \"s3cret\"}"
}"#;

const JOB: &str = r#"{
    "OperationType": "Add",
    "Overwrite": true,
    "JobCertificate": {
        "Alias": "https-443",
        "Contents": "MIIK...renewed",
        "PrivateKeyPassword": "password"
    }
}"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));

    // Validate the store definition the way a real client would be configured from it.
    let store = serde_json::from_str::<StoreDetails>(STORE)?;
    let config = ClientConfig::from_store(&store)?;
    let resource_id = config
        .resource_id
        .ok_or_else(|| eyre::eyre!("store has no gateway"))?;

    log::info!(
        "Using gateway {} in resource group {} ({:?} credential)",
        resource_id.name(),
        resource_id.resource_group(),
        config.credential,
    );

    // Stand-in for the real gateway, with a listener already serving a certificate named after it.
    let gateway = MemoryGateway::new(resource_id.as_str());
    gateway.insert_certificate("https-443", "MIIK...current");
    gateway.insert_binding("https-443", "https-443");

    let req = ManagementJobConfig::from_json(JOB)?.into_request();

    let res = ManagementJob::new(BindingPolicy::Listener)
        .run(&gateway, &req)
        .await;
    log::info!("job finished: {res:?}");

    // The listener kept serving either the old or the new certificate throughout.
    for (i, snapshot) in gateway.history().iter().enumerate() {
        for (listener, served) in snapshot {
            match served {
                Some(served) => log::info!(
                    "after step {}: {listener} serves \"{}\" ({})",
                    i + 1,
                    served.certificate,
                    served.contents
                ),
                None => log::warn!("after step {}: {listener} is unbound", i + 1),
            }
        }
    }

    Ok(())
}
