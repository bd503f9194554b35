//! The injectable seam standing in for direct [`kube::Client`] construction.
//!
//! Every mutation this core performs goes through a [`ClientFactory`], never
//! through a bare `kube::Client` held by a component directly. Each method
//! corresponds to exactly one API call this core makes; the signatures
//! operate on whole typed objects (not on intermediate [`kube::Api`] handles)
//! so that orchestrator-level tests can substitute an in-memory fake instead
//! of standing up a real cluster (see `tests/orchestrator.rs`).

use async_trait::async_trait;
use k8s_openapi::api::{
    core::v1::{Namespace, Secret, ServiceAccount},
    networking::v1::NetworkPolicy,
    rbac::v1::RoleBinding,
};
use kube::{
    api::{DeleteParams, DynamicObject, PostParams},
    discovery::ApiResource,
    Api, Client,
};

use crate::crd::PipelineRunTask;

/// Produces the effect of every cluster mutation/read this core performs. A
/// single implementation wraps one real [`Client`]; a fake implementation
/// backs orchestrator-level tests.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, kube::Error>;
    async fn delete_namespace(&self, name: &str) -> Result<(), kube::Error>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error>;
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, kube::Error>;

    async fn create_service_account(
        &self,
        namespace: &str,
        service_account: ServiceAccount,
    ) -> Result<ServiceAccount, kube::Error>;
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceAccount, kube::Error>;

    async fn create_role_binding(
        &self,
        namespace: &str,
        role_binding: RoleBinding,
    ) -> Result<RoleBinding, kube::Error>;

    /// Creates the built-in all-pods isolation policy through the typed
    /// networking client. Unlike the operator-configured network policy,
    /// this document is fixed by this core and never needs the
    /// forward-compatibility a dynamic client buys.
    async fn create_network_policy(
        &self,
        namespace: &str,
        network_policy: NetworkPolicy,
    ) -> Result<NetworkPolicy, kube::Error>;

    /// Submits a sanitized operator template through a schema-less client so
    /// unknown fields pass through untouched.
    async fn create_dynamic(
        &self,
        api_resource: &ApiResource,
        namespace: &str,
        object: DynamicObject,
    ) -> Result<DynamicObject, kube::Error>;

    async fn create_task_runner(
        &self,
        namespace: &str,
        task_runner: PipelineRunTask,
    ) -> Result<PipelineRunTask, kube::Error>;
}

/// The production [`ClientFactory`], backed by one real [`kube::Client`].
#[derive(Clone)]
pub struct KubeClientFactory {
    client: Client,
}

impl KubeClientFactory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn service_accounts(&self, namespace: &str) -> Api<ServiceAccount> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn role_bindings(&self, namespace: &str) -> Api<RoleBinding> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn network_policies(&self, namespace: &str) -> Api<NetworkPolicy> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn task_runners(&self, namespace: &str) -> Api<PipelineRunTask> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, kube::Error> {
        self.namespaces()
            .create(&PostParams::default(), &namespace)
            .await
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), kube::Error> {
        self.namespaces().delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, kube::Error> {
        self.secrets(namespace).get(name).await
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Secret, kube::Error> {
        self.secrets(namespace)
            .create(&PostParams::default(), &secret)
            .await
    }

    async fn create_service_account(
        &self,
        namespace: &str,
        service_account: ServiceAccount,
    ) -> Result<ServiceAccount, kube::Error> {
        self.service_accounts(namespace)
            .create(&PostParams::default(), &service_account)
            .await
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceAccount, kube::Error> {
        self.service_accounts(namespace).get(name).await
    }

    async fn create_role_binding(
        &self,
        namespace: &str,
        role_binding: RoleBinding,
    ) -> Result<RoleBinding, kube::Error> {
        self.role_bindings(namespace)
            .create(&PostParams::default(), &role_binding)
            .await
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        network_policy: NetworkPolicy,
    ) -> Result<NetworkPolicy, kube::Error> {
        self.network_policies(namespace)
            .create(&PostParams::default(), &network_policy)
            .await
    }

    async fn create_dynamic(
        &self,
        api_resource: &ApiResource,
        namespace: &str,
        object: DynamicObject,
    ) -> Result<DynamicObject, kube::Error> {
        Api::namespaced_with(self.client.clone(), namespace, api_resource)
            .create(&PostParams::default(), &object)
            .await
    }

    async fn create_task_runner(
        &self,
        namespace: &str,
        task_runner: PipelineRunTask,
    ) -> Result<PipelineRunTask, kube::Error> {
        self.task_runners(namespace)
            .create(&PostParams::default(), &task_runner)
            .await
    }
}
