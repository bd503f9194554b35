//! Task-runner builder: translates a pipeline-run's spec and the operator's
//! [`RunConfig`] into a single [`PipelineRunTask`] resource.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PodSecurityContext, PodTemplateSpec, SecretVolumeSource, Volume,
};
use kube::api::ObjectMeta;
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::{
    client::ClientFactory,
    config::RunConfig,
    constants::{
        PARAM_ELASTICSEARCH_INDEX_URL, PARAM_ELASTICSEARCH_RUN_ID_JSON,
        PLACEHOLDER_TOKEN_SECRET_NAME, PREDEFINED_CLUSTER_TASK_NAME,
        SERVICE_ACCOUNT_TOKEN_VOLUME_DEFAULT_MODE, SERVICE_ACCOUNT_TOKEN_VOLUME_NAME,
        TASK_RUNNER_PREFIX,
    },
    crd::{Elasticsearch, PipelineRunTask, PipelineRunTaskSpec, TaskParam},
    labels,
};

#[derive(Debug, Snafu)]
#[snafu(display("failed to create task-runner resource: {source}"))]
pub struct TaskRunnerError {
    source: kube::Error,
}

/// Builds the task-runner's [`PipelineRunTaskSpec`] and submits it to `namespace`.
pub async fn build(
    client_factory: &dyn ClientFactory,
    namespace: &str,
    run_config: &RunConfig,
    token_secret_name: Option<&str>,
    elasticsearch: Option<&Elasticsearch>,
) -> Result<PipelineRunTask, TaskRunnerError> {
    let spec = PipelineRunTaskSpec {
        cluster_task_ref: PREDEFINED_CLUSTER_TASK_NAME.to_string(),
        timeout_seconds: Some(run_config.timeout.as_std().as_secs()),
        pod_template: pod_template(run_config, token_secret_name),
        params: params(elasticsearch),
    };

    let mut metadata = ObjectMeta {
        generate_name: Some(TASK_RUNNER_PREFIX.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    };
    labels::mark_system_managed(&mut metadata);

    let task_runner = PipelineRunTask { metadata, spec };

    client_factory
        .create_task_runner(namespace, task_runner)
        .await
        .context(TaskRunnerSnafu)
}

/// Builds the pod template: security context triple from `run_config`, and
/// the `service-account-token` volume, which is always present even when no
/// token secret could be discovered (see [`PLACEHOLDER_TOKEN_SECRET_NAME`]).
fn pod_template(run_config: &RunConfig, token_secret_name: Option<&str>) -> PodTemplateSpec {
    use k8s_openapi::api::core::v1::PodSpec;

    let security_context = PodSecurityContext {
        fs_group: run_config.fs_group,
        run_as_group: run_config.run_as_group,
        run_as_user: run_config.run_as_user,
        ..Default::default()
    };

    let token_volume = Volume {
        name: SERVICE_ACCOUNT_TOKEN_VOLUME_NAME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(
                token_secret_name
                    .unwrap_or(PLACEHOLDER_TOKEN_SECRET_NAME)
                    .to_string(),
            ),
            default_mode: Some(SERVICE_ACCOUNT_TOKEN_VOLUME_DEFAULT_MODE),
            ..Default::default()
        }),
        ..Default::default()
    };

    PodTemplateSpec {
        spec: Some(PodSpec {
            security_context: Some(security_context),
            volumes: Some(vec![token_volume]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn params(elasticsearch: Option<&Elasticsearch>) -> Vec<TaskParam> {
    match elasticsearch {
        None => vec![TaskParam {
            name: PARAM_ELASTICSEARCH_INDEX_URL.to_string(),
            value: String::new(),
        }],
        Some(elasticsearch) => {
            let run_id = elasticsearch.run_id.clone().unwrap_or(Value::Null);
            vec![TaskParam {
                name: PARAM_ELASTICSEARCH_RUN_ID_JSON.to_string(),
                value: canonical_json(&run_id),
            }]
        }
    }
}

/// Serializes `value` as compact JSON with object keys sorted, regardless of
/// the input's original key order or `serde_json`'s default (insertion-order
/// preserving) map representation.
fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value))
        .expect("a Value rebuilt from another Value always serializes")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_elasticsearch_yields_empty_index_url_param() {
        let params = params(None);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, PARAM_ELASTICSEARCH_INDEX_URL);
        assert_eq!(params[0].value, "");
    }

    #[test]
    fn elasticsearch_with_no_run_id_serializes_to_null() {
        let elasticsearch = Elasticsearch { run_id: None };
        let params = params(Some(&elasticsearch));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, PARAM_ELASTICSEARCH_RUN_ID_JSON);
        assert_eq!(params[0].value, "null");
    }

    #[test]
    fn run_id_object_keys_are_sorted_regardless_of_input_order() {
        let elasticsearch = Elasticsearch {
            run_id: Some(json!({"key2": "v2", "key1": "v1"})),
        };
        let params = params(Some(&elasticsearch));
        assert_eq!(params[0].value, r#"{"key1":"v1","key2":"v2"}"#);
    }

    #[test]
    fn run_id_number_passes_through_losslessly() {
        let elasticsearch = Elasticsearch {
            run_id: Some(json!(-123.45)),
        };
        let params = params(Some(&elasticsearch));
        assert_eq!(params[0].value, "-123.45");
    }

    #[test]
    fn pod_template_is_never_empty() {
        let run_config = RunConfig {
            timeout: "30m".parse().unwrap(),
            ..Default::default()
        };
        let template = pod_template(&run_config, None);
        assert_ne!(template, PodTemplateSpec::default());
        let volumes = template.spec.unwrap().volumes.unwrap();
        assert_eq!(volumes[0].name, SERVICE_ACCOUNT_TOKEN_VOLUME_NAME);
        assert_eq!(
            volumes[0].secret.as_ref().unwrap().secret_name.as_deref(),
            Some(PLACEHOLDER_TOKEN_SECRET_NAME)
        );
    }
}
