//! Custom resource types this core reads (`PipelineRun`) and writes
//! (`PipelineRunTask`). The reconciliation loop that watches these through a
//! generated informer/lister is out of scope here; only the shapes are
//! defined.

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A tenant-submitted pipeline execution request.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, CustomResource)]
#[kube(
    group = "steward.sap.com",
    version = "v1alpha1",
    kind = "PipelineRun",
    namespaced,
    status = "PipelineRunStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub jenkins_file: JenkinsFile,

    #[serde(default)]
    pub secrets: Vec<String>,

    #[serde(default)]
    pub image_pull_secrets: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsFile {
    pub repo_url: String,
    pub revision: String,
    pub relative_path: String,

    /// Name of the secret carrying credentials for fetching `repo_url`. This
    /// is what the run manager calls the "clone secret".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_auth_secret: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Logging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticsearch: Option<Elasticsearch>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Elasticsearch {
    /// Free-form identifier for this run, any JSON value. Passed through
    /// losslessly to the task-runner as canonical, key-sorted JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary_namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PipelineRunResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Result classification written to `status.result`. Owned here because it
/// is part of the CRD's generated schema; [`crate::error::StartError`]
/// classifies into this same type (see `crate::error::ResultClass`).
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, strum::Display,
)]
pub enum PipelineRunResult {
    ResultErrorContent,
    ResultErrorInfra,
    ResultErrorConfig,
}

/// The downstream custom resource that actually runs the pipeline's containers.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, CustomResource)]
#[kube(
    group = "steward.sap.com",
    version = "v1beta1",
    kind = "PipelineRunTask",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunTaskSpec {
    pub cluster_task_ref: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    pub pod_template: PodTemplateSpec,

    #[serde(default)]
    pub params: Vec<TaskParam>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TaskParam {
    pub name: String,
    pub value: String,
}

impl PipelineRun {
    /// Name of this pipeline-run resource, for use in generated names and
    /// ownership labels. Empty when unset, which only happens for an object
    /// not yet persisted by the API server.
    pub fn pipeline_run_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace this pipeline-run was submitted in, used as the source
    /// namespace for the secret copier.
    pub fn tenant_namespace(&self) -> String {
        self.metadata.namespace.clone().unwrap_or_default()
    }
}
