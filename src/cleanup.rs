//! Cleanup: idempotent deletion of the namespaces a run provisioned.

use snafu::Snafu;

use crate::client::ClientFactory;

#[derive(Debug, Snafu)]
pub enum CleanupError {
    #[snafu(display("failed to delete namespace {namespace:?}: {source}"))]
    DeleteNamespace {
        namespace: String,
        source: kube::Error,
    },
}

/// Deletes `namespace`, treating `404 NotFound` as success rather than an
/// error — this is how idempotent delete is conventionally expressed against
/// the Kubernetes API; there is no separate existence check first.
pub async fn delete_namespace(
    client_factory: &dyn ClientFactory,
    namespace: &str,
) -> Result<(), CleanupError> {
    let result = client_factory.delete_namespace(namespace).await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if is_not_found(&err) => Ok(()),
        Err(source) => Err(CleanupError::DeleteNamespace {
            namespace: namespace.to_string(),
            source,
        }),
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

/// Deletes the main namespace and, if present, the auxiliary namespace.
/// Safe to call more than once and safe to call before `start` has finished.
pub async fn delete_namespaces(
    client_factory: &dyn ClientFactory,
    main_namespace: &str,
    auxiliary_namespace: Option<&str>,
) -> Result<(), CleanupError> {
    delete_namespace(client_factory, main_namespace).await?;

    if let Some(auxiliary_namespace) = auxiliary_namespace {
        delete_namespace(client_factory, auxiliary_namespace).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_an_error_classification() {
        // Exercised end-to-end against a fake ClientFactory in tests/orchestrator.rs;
        // `is_not_found` itself only inspects the error shape.
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert!(is_not_found(&err));
    }

    #[test]
    fn conflict_is_not_treated_as_not_found() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        });
        assert!(!is_not_found(&err));
    }
}
