//! Run manager: the coordinator that drives one pipeline-run through
//! namespace provisioning, secret copying, service-account setup, policy
//! application and task-runner creation, and cleans up on failure.

use std::sync::Arc;

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    client::ClientFactory,
    cleanup,
    config::{FeatureFlags, RunConfig},
    constants::TEMPLATE_PREFIX_CONFIGURED,
    crd::{Elasticsearch, PipelineRun, PipelineRunTask},
    error::{
        ApplyConfiguredLimitRangeSnafu, ApplyConfiguredNetworkPolicySnafu,
        ApplyConfiguredResourceQuotaSnafu, ApplyIsolateAllNetworkPolicySnafu,
        BuildServiceAccountSnafu, BuildTaskRunnerSnafu, CopyCloneSecretSnafu,
        CopyImagePullSecretsSnafu, CopyPipelineSecretsSnafu, ProvisionNamespaceSnafu, StartError,
    },
    namespace, network_policy,
    secrets::{self, PullSecretTransform},
    service_account, task_runner, template,
};

/// Per-invocation state built fresh by [`RunManager`] for one `start` or
/// `cleanup` call. Not `Clone`/`Default`: a new one is built for each call.
pub struct RunContext {
    pub pipeline_run_name: String,
    pub tenant_namespace: String,
    pub feature_flags: FeatureFlags,
    pub namespace: Option<String>,
    pub auxiliary_namespace: Option<String>,
    pub token_secret_name: Option<String>,
}

impl RunContext {
    pub fn new(pipeline_run_name: &str, tenant_namespace: &str, feature_flags: FeatureFlags) -> Self {
        Self {
            pipeline_run_name: pipeline_run_name.to_string(),
            tenant_namespace: tenant_namespace.to_string(),
            feature_flags,
            namespace: None,
            auxiliary_namespace: None,
            token_secret_name: None,
        }
    }

    fn namespace(&self) -> &str {
        self.namespace
            .as_deref()
            .expect("namespaces are provisioned before any later step runs")
    }
}

/// One method per orchestration step, so [`RunManager::start`] stays a thin
/// coordinator and tests substitute a fake implementation instead of
/// monkey-patching the real one.
#[async_trait]
pub trait RunCapabilities: Send + Sync {
    async fn provision_namespaces(
        &self,
        context: &RunContext,
    ) -> Result<namespace::ProvisionedNamespaces, kube::Error>;

    async fn copy_secret_list(
        &self,
        context: &RunContext,
        names: &[String],
        transform: Option<PullSecretTransform>,
    ) -> Result<Vec<String>, secrets::SecretCopyError>;

    async fn build_service_account(
        &self,
        context: &RunContext,
        pull_secret_names: &[String],
    ) -> Result<service_account::ServiceAccountSetup, service_account::ServiceAccountError>;

    async fn apply_isolate_all_network_policy(
        &self,
        context: &RunContext,
    ) -> Result<(), network_policy::IsolateAllNetworkPolicyError>;

    async fn apply_template(
        &self,
        context: &RunContext,
        what: &str,
        document: &str,
        expected_group: &str,
        expected_kind: &str,
        name_prefix: &str,
    ) -> Result<(), template::TemplateError>;

    async fn build_task_runner(
        &self,
        context: &RunContext,
        run_config: &RunConfig,
        elasticsearch: Option<&Elasticsearch>,
    ) -> Result<PipelineRunTask, task_runner::TaskRunnerError>;
}

/// The production [`RunCapabilities`] implementation, backed by one
/// [`ClientFactory`].
pub struct ClusterRunCapabilities {
    client_factory: Arc<dyn ClientFactory>,
}

impl ClusterRunCapabilities {
    pub fn new(client_factory: Arc<dyn ClientFactory>) -> Self {
        Self { client_factory }
    }
}

#[async_trait]
impl RunCapabilities for ClusterRunCapabilities {
    async fn provision_namespaces(
        &self,
        context: &RunContext,
    ) -> Result<namespace::ProvisionedNamespaces, kube::Error> {
        namespace::provision(
            self.client_factory.as_ref(),
            context.feature_flags.create_aux_namespace_if_unused,
        )
        .await
    }

    async fn copy_secret_list(
        &self,
        context: &RunContext,
        names: &[String],
        transform: Option<PullSecretTransform>,
    ) -> Result<Vec<String>, secrets::SecretCopyError> {
        secrets::copy_secrets(
            self.client_factory.as_ref(),
            &context.tenant_namespace,
            context.namespace(),
            &context.pipeline_run_name,
            names,
            transform,
        )
        .await
    }

    async fn build_service_account(
        &self,
        context: &RunContext,
        pull_secret_names: &[String],
    ) -> Result<service_account::ServiceAccountSetup, service_account::ServiceAccountError> {
        service_account::build(self.client_factory.as_ref(), context.namespace(), pull_secret_names).await
    }

    async fn apply_isolate_all_network_policy(
        &self,
        context: &RunContext,
    ) -> Result<(), network_policy::IsolateAllNetworkPolicyError> {
        network_policy::apply_isolate_all(self.client_factory.as_ref(), context.namespace()).await
    }

    async fn apply_template(
        &self,
        context: &RunContext,
        what: &str,
        document: &str,
        expected_group: &str,
        expected_kind: &str,
        name_prefix: &str,
    ) -> Result<(), template::TemplateError> {
        let namespace = context.namespace();
        let object = template::sanitize(
            what,
            document,
            expected_group,
            expected_kind,
            namespace,
            name_prefix,
        )?;
        template::submit(self.client_factory.as_ref(), namespace, object).await
    }

    async fn build_task_runner(
        &self,
        context: &RunContext,
        run_config: &RunConfig,
        elasticsearch: Option<&Elasticsearch>,
    ) -> Result<PipelineRunTask, task_runner::TaskRunnerError> {
        task_runner::build(
            self.client_factory.as_ref(),
            context.namespace(),
            run_config,
            context.token_secret_name.as_deref(),
            elasticsearch,
        )
        .await
    }
}

/// Coordinates one pipeline-run's namespace preparation from its injected
/// [`RunCapabilities`].
pub struct RunManager {
    capabilities: Arc<dyn RunCapabilities>,
    client_factory: Arc<dyn ClientFactory>,
}

impl RunManager {
    pub fn new(client_factory: Arc<dyn ClientFactory>) -> Self {
        let capabilities = Arc::new(ClusterRunCapabilities::new(client_factory.clone()));
        Self::with_capabilities(client_factory, capabilities)
    }

    pub fn with_capabilities(
        client_factory: Arc<dyn ClientFactory>,
        capabilities: Arc<dyn RunCapabilities>,
    ) -> Self {
        Self {
            capabilities,
            client_factory,
        }
    }

    /// Runs the ten-step contract described in the component design for the
    /// run manager. Any failure at steps 1-9 triggers [`Self::cleanup`]
    /// before the (classified) error is returned; a step-10 failure is
    /// returned without automatic cleanup — the caller decides, because
    /// task-runner creation may have partially persisted.
    ///
    /// Feature flags are not an argument here: each invocation resolves
    /// [`FeatureFlags::resolve`] itself, so the process-wide (or
    /// test-scoped) override set via [`crate::config::ScopedFeatureFlagOverride`]
    /// is what every call actually observes, rather than a value the caller
    /// has to remember to thread through.
    #[instrument(skip_all, fields(pipeline_run = %pipeline_run.pipeline_run_name()))]
    pub async fn start(
        &self,
        pipeline_run: &PipelineRun,
        run_config: &RunConfig,
    ) -> Result<RunContext, StartError> {
        let mut context = RunContext::new(
            pipeline_run.pipeline_run_name(),
            &pipeline_run.tenant_namespace(),
            FeatureFlags::resolve(),
        );

        match self.run_steps(&mut context, pipeline_run, run_config).await {
            Ok(()) => Ok(context),
            Err(source) => {
                if let Some(namespace) = context.namespace.clone() {
                    if let Err(cleanup_err) = cleanup::delete_namespaces(
                        self.client_factory.as_ref(),
                        &namespace,
                        context.auxiliary_namespace.as_deref(),
                    )
                    .await
                    {
                        tracing::warn!(error = %cleanup_err, "cleanup after failed start also failed");
                    }
                }
                Err(source)
            }
        }
    }

    async fn run_steps(
        &self,
        context: &mut RunContext,
        pipeline_run: &PipelineRun,
        run_config: &RunConfig,
    ) -> Result<(), StartError> {
        let provisioned = self
            .capabilities
            .provision_namespaces(context)
            .await
            .context(ProvisionNamespaceSnafu)?;
        let namespace = provisioned.main.clone();
        context.namespace = Some(provisioned.main);
        context.auxiliary_namespace = provisioned.auxiliary;

        let spec = &pipeline_run.spec;

        if let Some(clone_secret) = spec.jenkins_file.repo_auth_secret.clone() {
            self.capabilities
                .copy_secret_list(context, &[clone_secret], None)
                .await
                .context(CopyCloneSecretSnafu {
                    namespace: namespace.clone(),
                })?;
        }

        self.capabilities
            .copy_secret_list(context, &spec.secrets, None)
            .await
            .context(CopyPipelineSecretsSnafu {
                namespace: namespace.clone(),
            })?;

        self.capabilities
            .copy_secret_list(
                context,
                &spec.image_pull_secrets,
                Some(secrets::passthrough_pull_secret_transform),
            )
            .await
            .context(CopyImagePullSecretsSnafu {
                namespace: namespace.clone(),
            })?;

        let service_account = self
            .capabilities
            .build_service_account(context, &spec.image_pull_secrets)
            .await
            .context(BuildServiceAccountSnafu {
                namespace: namespace.clone(),
            })?;
        context.token_secret_name = service_account.token_secret_name;

        self.capabilities
            .apply_isolate_all_network_policy(context)
            .await
            .context(ApplyIsolateAllNetworkPolicySnafu {
                namespace: namespace.clone(),
            })?;

        if let Some(document) = &run_config.network_policy {
            self.capabilities
                .apply_template(
                    context,
                    "configured network policy",
                    document,
                    "networking.k8s.io",
                    "NetworkPolicy",
                    TEMPLATE_PREFIX_CONFIGURED,
                )
                .await
                .context(ApplyConfiguredNetworkPolicySnafu {
                    namespace: namespace.clone(),
                })?;
        }

        if let Some(document) = &run_config.limit_range {
            self.capabilities
                .apply_template(
                    context,
                    "configured limit range",
                    document,
                    "",
                    "LimitRange",
                    TEMPLATE_PREFIX_CONFIGURED,
                )
                .await
                .context(ApplyConfiguredLimitRangeSnafu {
                    namespace: namespace.clone(),
                })?;
        }

        if let Some(document) = &run_config.resource_quota {
            self.capabilities
                .apply_template(
                    context,
                    "configured resource quota",
                    document,
                    "",
                    "ResourceQuota",
                    TEMPLATE_PREFIX_CONFIGURED,
                )
                .await
                .context(ApplyConfiguredResourceQuotaSnafu {
                    namespace: namespace.clone(),
                })?;
        }

        let elasticsearch = spec.logging.as_ref().and_then(|logging| logging.elasticsearch.as_ref());
        self.capabilities
            .build_task_runner(context, run_config, elasticsearch)
            .await
            .context(BuildTaskRunnerSnafu { namespace })?;

        Ok(())
    }

    /// Deletes the namespaces recorded in `context`. Idempotent, safe to call
    /// more than once and safe to call before `start` has finished.
    pub async fn cleanup(&self, context: &RunContext) -> Result<(), cleanup::CleanupError> {
        let Some(namespace) = context.namespace.as_deref() else {
            return Ok(());
        };
        cleanup::delete_namespaces(
            self.client_factory.as_ref(),
            namespace,
            context.auxiliary_namespace.as_deref(),
        )
        .await
    }
}
