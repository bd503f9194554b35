//! Namespace provisioner: creates the main (and, when enabled, auxiliary)
//! run namespace with a generated name and the system-managed label.

use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use rand::Rng;

use crate::{
    client::ClientFactory,
    constants::{NAMESPACE_PREFIX_MAIN, NAMESPACE_PURPOSE_AUX, NAMESPACE_PURPOSE_MAIN},
    labels,
};

/// Result of provisioning: the always-present main namespace name, and the
/// auxiliary namespace name when the feature flag enabled its creation.
pub struct ProvisionedNamespaces {
    pub main: String,
    pub auxiliary: Option<String>,
}

/// Creates the main namespace, and — if `create_aux_namespace_if_unused` is
/// set — the auxiliary namespace. Both get a generated name of the form
/// `steward-run-<5-char-random>-{main|aux}-<server-suffix>` and the
/// system-managed label.
pub async fn provision(
    client_factory: &dyn ClientFactory,
    create_aux_namespace_if_unused: bool,
) -> Result<ProvisionedNamespaces, kube::Error> {
    let shared_suffix = random_alnum_suffix(5);

    let main = create_namespace(client_factory, &shared_suffix, NAMESPACE_PURPOSE_MAIN).await?;

    let auxiliary = if create_aux_namespace_if_unused {
        Some(create_namespace(client_factory, &shared_suffix, NAMESPACE_PURPOSE_AUX).await?)
    } else {
        None
    };

    Ok(ProvisionedNamespaces { main, auxiliary })
}

async fn create_namespace(
    client_factory: &dyn ClientFactory,
    shared_suffix: &str,
    purpose: &str,
) -> Result<String, kube::Error> {
    let generate_name = format!("{NAMESPACE_PREFIX_MAIN}{shared_suffix}-{purpose}-");

    let mut metadata = ObjectMeta {
        generate_name: Some(generate_name),
        ..Default::default()
    };
    labels::mark_system_managed(&mut metadata);

    let namespace = Namespace {
        metadata,
        ..Default::default()
    };

    let created = client_factory.create_namespace(namespace).await?;

    Ok(created
        .metadata
        .name
        .expect("the API server always assigns a name to a created object"))
}

fn random_alnum_suffix(len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}
