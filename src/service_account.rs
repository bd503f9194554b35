//! Service-account builder: creates the run namespace's `default` service
//! account referencing the copied pull secrets, binds it to the predefined
//! cluster role, and discovers the auto-generated token secret for later use
//! by the task-runner builder.

use std::time::Duration;

use backoff::{future::retry, Error as BackoffError, ExponentialBackoff};
use k8s_openapi::api::{
    core::v1::{LocalObjectReference, ServiceAccount},
    rbac::v1::{RoleBinding, RoleRef, Subject},
};
use kube::api::ObjectMeta;
use snafu::{ResultExt, Snafu};

use crate::{
    client::ClientFactory,
    constants::{PREDEFINED_CLUSTER_ROLE_NAME, SERVICE_ACCOUNT_NAME},
    labels,
};

#[derive(Debug, Snafu)]
pub enum ServiceAccountError {
    #[snafu(display("failed to create service account: {source}"))]
    CreateServiceAccount { source: kube::Error },

    #[snafu(display("failed to create role binding: {source}"))]
    CreateRoleBinding { source: kube::Error },
}

/// Outcome of building the service account + role binding: the name of the
/// auto-generated token secret, when one could be discovered. `None` when
/// the cluster does not auto-populate `ServiceAccount.secrets[]` (Kubernetes
/// >= 1.24) and the short convergence poll did not find a legacy one either
/// — the task-runner builder must still emit a non-empty pod template in
/// that case (see §4.P).
pub struct ServiceAccountSetup {
    pub token_secret_name: Option<String>,
}

/// Builds the `default` service account (with `pull_secret_names` as image
/// pull secrets) and a role binding from [`PREDEFINED_CLUSTER_ROLE_NAME`] to
/// it, in `namespace`.
pub async fn build(
    client_factory: &dyn ClientFactory,
    namespace: &str,
    pull_secret_names: &[String],
) -> Result<ServiceAccountSetup, ServiceAccountError> {
    let mut metadata = ObjectMeta {
        name: Some(SERVICE_ACCOUNT_NAME.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    labels::mark_system_managed(&mut metadata);

    let service_account = ServiceAccount {
        metadata,
        image_pull_secrets: Some(
            pull_secret_names
                .iter()
                .map(|name| LocalObjectReference {
                    name: name.clone(),
                })
                .collect(),
        ),
        ..Default::default()
    };

    client_factory
        .create_service_account(namespace, service_account)
        .await
        .context(CreateServiceAccountSnafu)?;

    let mut rb_metadata = ObjectMeta {
        generate_name: Some(format!("{SERVICE_ACCOUNT_NAME}-")),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    labels::mark_system_managed(&mut rb_metadata);

    let role_binding = RoleBinding {
        metadata: rb_metadata,
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: PREDEFINED_CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: SERVICE_ACCOUNT_NAME.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    };

    client_factory
        .create_role_binding(namespace, role_binding)
        .await
        .context(CreateRoleBindingSnafu)?;

    let token_secret_name = discover_token_secret(client_factory, namespace).await;

    Ok(ServiceAccountSetup { token_secret_name })
}

/// Polls the `default` service account a handful of times, looking for a
/// legacy auto-generated token secret reference. Clusters where the
/// `ServiceAccount` admission controller no longer auto-populates
/// `secrets[]` will simply time out this poll; that is not an error.
async fn discover_token_secret(client_factory: &dyn ClientFactory, namespace: &str) -> Option<String> {
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(800),
        max_elapsed_time: Some(Duration::from_secs(3)),
        ..ExponentialBackoff::default()
    };

    retry(backoff, || async {
        let service_account = client_factory
            .get_service_account(namespace, SERVICE_ACCOUNT_NAME)
            .await
            .map_err(|_| BackoffError::transient(()))?;

        service_account
            .secrets
            .into_iter()
            .flatten()
            .find_map(|reference| reference.name)
            .ok_or_else(|| BackoffError::transient(()))
    })
    .await
    .ok()
}
