//! Error taxonomy and failure classification for the run manager core.
//!
//! Every error variant preserves its cause through `snafu`'s `source`
//! chaining. The outer reconciler is expected to use only [`ResultClass`]
//! plus [`root_cause_message`] to populate `status.message` — the wrapper
//! text produced by [`StartError::Display`] is for logs/tracing only and may
//! change between releases without that being a breaking change for callers.

use std::error::Error as StdError;

use snafu::Snafu;

use crate::{
    labels::LabelConflict, network_policy::IsolateAllNetworkPolicyError,
    secrets::SecretCopyError, service_account::ServiceAccountError,
    task_runner::TaskRunnerError, template::TemplateError,
};

/// Classification written to `pipeline_run.status.result` by the outer reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ResultClass {
    ResultErrorContent,
    ResultErrorInfra,
    ResultErrorConfig,
}

/// Errors surfaced by [`crate::run_manager::RunManager::start`].
///
/// Each variant records the namespace the failure occurred in and a fixed,
/// per-call-site action phrase, rendered as
/// `failed to <action> in namespace "<ns>": <cause>` — except the three
/// secret-copy variants, which render as the bare `failed to <action>:
/// <cause>` with no namespace clause, matching the ground truth this core
/// was distilled from.
#[derive(Debug, Snafu)]
pub enum StartError {
    #[snafu(display("failed to provision the run namespace: {source}"))]
    ProvisionNamespace { source: kube::Error },

    // Unlike the other call sites below, these three render without an
    // `in namespace "<ns>"` clause — matches the ground truth the
    // pipeline-run controller was distilled from. `namespace` is kept on
    // the variant for future use (e.g. structured logging) even though the
    // `Display` impl doesn't reference it.
    #[snafu(display("failed to copy pipeline clone secret: {source}"))]
    CopyCloneSecret {
        namespace: String,
        source: SecretCopyError,
    },

    #[snafu(display("failed to copy pipeline secrets: {source}"))]
    CopyPipelineSecrets {
        namespace: String,
        source: SecretCopyError,
    },

    #[snafu(display("failed to copy image pull secrets: {source}"))]
    CopyImagePullSecrets {
        namespace: String,
        source: SecretCopyError,
    },

    #[snafu(display(
        "failed to set up the service account and role binding in namespace {namespace:?}: {source}"
    ))]
    BuildServiceAccount {
        namespace: String,
        source: ServiceAccountError,
    },

    #[snafu(display(
        "failed to set up the network policy isolating all pods in namespace {namespace:?}: {source}"
    ))]
    ApplyIsolateAllNetworkPolicy {
        namespace: String,
        source: IsolateAllNetworkPolicyError,
    },

    #[snafu(display(
        "failed to set up the configured network policy in namespace {namespace:?}: {source}"
    ))]
    ApplyConfiguredNetworkPolicy {
        namespace: String,
        source: TemplateError,
    },

    #[snafu(display(
        "failed to set up the configured limit range in namespace {namespace:?}: {source}"
    ))]
    ApplyConfiguredLimitRange {
        namespace: String,
        source: TemplateError,
    },

    #[snafu(display(
        "failed to set up the configured resource quota in namespace {namespace:?}: {source}"
    ))]
    ApplyConfiguredResourceQuota {
        namespace: String,
        source: TemplateError,
    },

    #[snafu(display("failed to build the task-runner resource in namespace {namespace:?}: {source}"))]
    BuildTaskRunner {
        namespace: String,
        source: TaskRunnerError,
    },

    #[snafu(display("ownership label propagation failed: {source}"))]
    Labeling { source: LabelConflict },
}

impl StartError {
    /// Classifies this failure for `pipeline_run.status.result`. See §4.R /
    /// §7 of the specification: copy-secret NotFound is a content error,
    /// copy-secret transport and everything else not named here is an infra
    /// error, and any template decode/kind mismatch is a config error.
    pub fn classify(&self) -> ResultClass {
        match self {
            StartError::CopyCloneSecret { source, .. }
            | StartError::CopyPipelineSecrets { source, .. }
            | StartError::CopyImagePullSecrets { source, .. } => match source {
                SecretCopyError::NotFound { .. } => ResultClass::ResultErrorContent,
                SecretCopyError::Transport { .. } | SecretCopyError::AlreadyExists { .. } => {
                    ResultClass::ResultErrorInfra
                }
            },
            StartError::ApplyConfiguredNetworkPolicy { source, .. }
            | StartError::ApplyConfiguredLimitRange { source, .. }
            | StartError::ApplyConfiguredResourceQuota { source, .. } => match source {
                TemplateError::Malformed { .. } | TemplateError::WrongKind { .. } => {
                    ResultClass::ResultErrorConfig
                }
                TemplateError::Submit { .. } => ResultClass::ResultErrorInfra,
            },
            StartError::ProvisionNamespace { .. }
            | StartError::ApplyIsolateAllNetworkPolicy { .. }
            | StartError::BuildServiceAccount { .. }
            | StartError::BuildTaskRunner { .. }
            | StartError::Labeling { .. } => ResultClass::ResultErrorInfra,
        }
    }

    /// The bare, innermost message in this error's cause chain — what the
    /// outer reconciler should write to `status.message`, as opposed to
    /// `Display`'s wrapped `failed to ... in namespace ...: ...` text.
    pub fn root_cause_message(&self) -> String {
        root_cause_message(self)
    }
}

/// Walks an error's `source()` chain to the bottom and returns its `Display` text.
pub fn root_cause_message(err: &(dyn StdError + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_message_unwraps_full_chain() {
        let err = StartError::CopyCloneSecret {
            namespace: "ns".to_string(),
            source: SecretCopyError::NotFound {
                name: "secret1".to_string(),
            },
        };
        assert_eq!(err.root_cause_message(), "secret \"secret1\" not found");
        assert_eq!(err.classify(), ResultClass::ResultErrorContent);
    }

    #[test]
    fn copy_clone_secret_display_has_no_namespace_clause() {
        let err = StartError::CopyCloneSecret {
            namespace: "ns1".to_string(),
            source: SecretCopyError::NotFound {
                name: "secret1".to_string(),
            },
        };
        assert!(err.to_string().starts_with("failed to copy pipeline clone secret:"));
    }

    #[test]
    fn apply_configured_limit_range_display_keeps_namespace_clause() {
        let err = StartError::ApplyConfiguredLimitRange {
            namespace: "ns1".to_string(),
            source: TemplateError::Malformed {
                what: "configured limit range".to_string(),
                source: serde_yaml::from_str::<serde_json::Value>(":").unwrap_err(),
            },
        };
        assert!(err
            .to_string()
            .starts_with("failed to set up the configured limit range in namespace \"ns1\":"));
    }
}
