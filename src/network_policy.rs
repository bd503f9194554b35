//! The built-in all-pods network policy, created through the typed
//! networking client rather than the dynamic client used for
//! operator-configured templates — see DESIGN.md for why the split is kept.

use k8s_openapi::{
    api::networking::v1::{NetworkPolicy, NetworkPolicySpec},
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::api::ObjectMeta;
use snafu::{ResultExt, Snafu};

use crate::{client::ClientFactory, constants::TEMPLATE_PREFIX_ISOLATE_ALL, labels};

#[derive(Debug, Snafu)]
#[snafu(display("{source}"))]
pub struct IsolateAllNetworkPolicyError {
    source: kube::Error,
}

/// Creates the fixed all-pods ingress/egress isolation policy in `namespace`.
/// Every run namespace gets exactly one of these, ahead of any
/// operator-configured network policy.
pub async fn apply_isolate_all(
    client_factory: &dyn ClientFactory,
    namespace: &str,
) -> Result<(), IsolateAllNetworkPolicyError> {
    let mut metadata = ObjectMeta {
        generate_name: Some(TEMPLATE_PREFIX_ISOLATE_ALL.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    labels::mark_system_managed(&mut metadata);

    let policy = NetworkPolicy {
        metadata,
        spec: Some(NetworkPolicySpec {
            pod_selector: LabelSelector::default(),
            policy_types: Some(vec!["Ingress".to_string(), "Egress".to_string()]),
            ..Default::default()
        }),
        status: None,
    };

    client_factory
        .create_network_policy(namespace, policy)
        .await
        .context(IsolateAllNetworkPolicySnafu)?;

    Ok(())
}
