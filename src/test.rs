use crate::client::MemoryGateway;

pub(crate) const RESOURCE_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-edge/providers/Microsoft.Network/applicationGateways/agw-edge";

/// Gateway with a single listener serving `certificate`.
pub(crate) fn gateway_with_bound_listener(
    listener: &str,
    certificate: &str,
    contents: &str,
) -> MemoryGateway {
    let gw = MemoryGateway::new(RESOURCE_ID);
    gw.insert_certificate(certificate, contents);
    gw.insert_binding(listener, certificate);
    gw
}
