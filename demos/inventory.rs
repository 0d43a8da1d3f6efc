use appgw::{BindingPolicy, InventoryJob, JobStatus, MemoryGateway, ResourceId};

const GATEWAY: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-edge/providers/Microsoft.Network/applicationGateways/agw-edge";

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let resource_id = GATEWAY.parse::<ResourceId>()?;

    let gateway = MemoryGateway::new(resource_id.as_str());
    gateway.insert_certificate("shared", "MIIK...shared");
    gateway.insert_certificate("api", "MIIK...api");
    gateway.insert_certificate("vault-backed", "MIIK...vault");
    gateway.insert_binding("https-443", "shared");
    gateway.insert_binding("https-8443", "shared");
    gateway.insert_binding("api-443", "api");
    gateway.insert_binding("vault-443", "vault-backed");

    // Certificates stored in Key Vault can't be read back through the gateway.
    gateway.move_to_key_vault(
        "vault-backed",
        "https://kv-edge.vault.azure.net/secrets/vault-backed",
    );

    for policy in [BindingPolicy::Certificate, BindingPolicy::Listener] {
        let job = InventoryJob::new(policy).with_gateway(resource_id.clone());

        let res = job
            .run(&gateway, |items| {
                for item in &items {
                    log::info!("{}: {}", policy.store_type(), serde_json::to_string(item)?);
                }
                Ok(())
            })
            .await;

        if res.status != JobStatus::Success {
            log::warn!("{:?}: {}", res.status, res.message.unwrap_or_default());
        }
    }

    Ok(())
}
