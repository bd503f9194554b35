//! Fixed names and label keys shared by every component in this crate.
//!
//! These are the stable, cross-version identifiers named in the custom
//! resource contract: label selectors, namespace/template name templates and
//! the predefined RBAC objects this core assumes already exist.

/// Marks every object this core creates. Always set with an empty value.
pub const SYSTEM_MANAGED_LABEL: &str = "steward.sap.com/system-managed";

/// Ownership label keys governed by the label propagator, in the order they
/// are always considered. The order only matters for deterministic iteration
/// in tests; propagation itself treats each key independently.
pub const OWNED_BY_CLIENT_NAME: &str = "steward.sap.com/ownedByClientName";
pub const OWNED_BY_CLIENT_NAMESPACE: &str = "steward.sap.com/ownedByClientNamespace";
pub const OWNED_BY_TENANT_NAME: &str = "steward.sap.com/ownedByTenantName";
pub const OWNED_BY_TENANT_NAMESPACE: &str = "steward.sap.com/ownedByTenantNamespace";
pub const OWNED_BY_PIPELINE_RUN_NAME: &str = "steward.sap.com/ownedByPipelineRunName";

/// `generateName` prefix for the main run namespace.
pub const NAMESPACE_PREFIX_MAIN: &str = "steward-run-";
pub const NAMESPACE_PURPOSE_MAIN: &str = "main";
pub const NAMESPACE_PURPOSE_AUX: &str = "aux";

/// `generateName` prefix applied to operator-supplied policy templates once sanitized.
pub const TEMPLATE_PREFIX_CONFIGURED: &str = "steward.sap.com--configured-";
/// `generateName` prefix applied to the built-in all-pods isolation template.
pub const TEMPLATE_PREFIX_ISOLATE_ALL: &str = "steward.sap.com--isolate-all-";

/// Name of the service account created in every run namespace.
pub const SERVICE_ACCOUNT_NAME: &str = "default";

/// Cluster role bound to the run namespace's service account. Must pre-exist
/// on the cluster; its absence is not actively checked (see DESIGN.md).
pub const PREDEFINED_CLUSTER_ROLE_NAME: &str = "steward-pipeline-run";

/// ClusterTask referenced by every generated task-runner resource.
pub const PREDEFINED_CLUSTER_TASK_NAME: &str = "steward-pipeline-run-task";

/// Task-runner parameter names translating the pipeline-run's logging spec.
pub const PARAM_ELASTICSEARCH_INDEX_URL: &str = "PIPELINE_LOG_ELASTICSEARCH_INDEX_URL";
pub const PARAM_ELASTICSEARCH_RUN_ID_JSON: &str = "PIPELINE_LOG_ELASTICSEARCH_RUN_ID_JSON";

/// Volume name used to mount the service account token into the task-runner pod.
pub const SERVICE_ACCOUNT_TOKEN_VOLUME_NAME: &str = "service-account-token";
/// Default file mode applied to the service account token volume (octal 0644).
pub const SERVICE_ACCOUNT_TOKEN_VOLUME_DEFAULT_MODE: i32 = 0o644;
/// Stand-in secret name referenced by the token volume when no auto-generated
/// token secret could be discovered, so the pod template is never left empty.
pub const PLACEHOLDER_TOKEN_SECRET_NAME: &str = "steward-pipeline-run-token-unavailable";

/// `generateName` prefix for the generated task-runner resource.
pub const TASK_RUNNER_PREFIX: &str = "steward-pipeline-run-";

/// Environment variable read to resolve the tracing filter.
pub const LOG_ENV_VAR: &str = "RUN_MANAGER_LOG";
