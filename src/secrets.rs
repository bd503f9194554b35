//! Secret copier: reads named secrets out of a tenant-scoped source namespace
//! and re-creates them, identity stripped and ownership labels applied, in
//! the run namespace.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use snafu::Snafu;

use crate::{client::ClientFactory, constants::OWNED_BY_PIPELINE_RUN_NAME, labels};

#[derive(Debug, Snafu)]
pub enum SecretCopyError {
    #[snafu(display("secret {name:?} not found"))]
    NotFound { name: String },

    #[snafu(display("a secret named {name:?} already exists in the run namespace"))]
    AlreadyExists { name: String },

    #[snafu(display("{source}"))]
    Transport { source: kube::Error },
}

/// A transform applied to a pull secret's data payload before it is written
/// into the run namespace (e.g. rewriting a `.dockerconfigjson` entry to
/// point at the run's registry credentials). Plain secrets never get one.
pub type PullSecretTransform = fn(BTreeMap<String, ByteString>) -> BTreeMap<String, ByteString>;

/// The transform applied to copied image pull secrets. This core has no
/// registry-rewrite configuration of its own (managing credentials beyond
/// copying them is a non-goal — see DESIGN.md), so the payload is carried
/// through unchanged; the seam exists so a future registry-mirroring
/// requirement has somewhere to attach without touching the copier itself.
pub fn passthrough_pull_secret_transform(
    data: BTreeMap<String, ByteString>,
) -> BTreeMap<String, ByteString> {
    data
}

/// Copies `names` from `source_namespace` into `target_namespace`.
///
/// Server-managed fields (resource version, UID, self-link, owner
/// references, creation timestamp) are stripped; name and annotations are
/// preserved. `transform`, when given, is applied to the secret's data
/// payload (used for the image-pull-secret docker-config rewrite). Returns
/// the names actually created, in input order.
pub async fn copy_secrets(
    client_factory: &dyn ClientFactory,
    source_namespace: &str,
    target_namespace: &str,
    pipeline_run_name: &str,
    names: &[String],
    transform: Option<PullSecretTransform>,
) -> Result<Vec<String>, SecretCopyError> {
    let mut additions = BTreeMap::new();
    additions.insert(
        OWNED_BY_PIPELINE_RUN_NAME.to_string(),
        pipeline_run_name.to_string(),
    );

    let mut created = Vec::with_capacity(names.len());

    for name in names {
        let mut secret = client_factory
            .get_secret(source_namespace, name)
            .await
            .map_err(map_get_error(name))?;

        secret.metadata.resource_version = None;
        secret.metadata.uid = None;
        secret.metadata.self_link = None;
        secret.metadata.owner_references = None;
        secret.metadata.creation_timestamp = None;
        secret.metadata.namespace = Some(target_namespace.to_string());

        labels::mark_system_managed(&mut secret.metadata);
        labels::mark_owned_by_pipeline_run(&mut secret.metadata, &BTreeMap::new(), &additions)
            .expect("a freshly read source secret cannot already carry a conflicting pipeline-run label");

        if let Some(transform) = transform {
            if let Some(data) = secret.data.take() {
                secret.data = Some(transform(data));
            }
        }

        client_factory
            .create_secret(target_namespace, secret)
            .await
            .map_err(map_create_error(name))?;

        created.push(name.clone());
    }

    Ok(created)
}

fn map_get_error(name: &str) -> impl FnOnce(kube::Error) -> SecretCopyError + '_ {
    move |err| {
        if is_not_found(&err) {
            SecretCopyError::NotFound {
                name: name.to_string(),
            }
        } else {
            SecretCopyError::Transport { source: err }
        }
    }
}

fn map_create_error(name: &str) -> impl FnOnce(kube::Error) -> SecretCopyError + '_ {
    move |err| {
        if is_conflict(&err) {
            SecretCopyError::AlreadyExists {
                name: name.to_string(),
            }
        } else {
            SecretCopyError::Transport { source: err }
        }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_is_bare() {
        let err = SecretCopyError::NotFound {
            name: "secret1".to_string(),
        };
        assert_eq!(err.to_string(), "secret \"secret1\" not found");
    }
}
