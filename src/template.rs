//! Template sanitizer: decodes an operator-supplied policy document, forcibly
//! rewrites its identity metadata so the controller (not the operator) owns
//! name/namespace/labels, and submits it through the dynamic client so
//! unknown fields pass through untouched.

use std::collections::BTreeMap;

use kube::{
    core::{DynamicObject, GroupVersionKind, TypeMeta},
    discovery::ApiResource,
};
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use crate::{client::ClientFactory, constants::SYSTEM_MANAGED_LABEL};

#[derive(Debug, Snafu)]
pub enum TemplateError {
    #[snafu(display("failed to decode {what}: {source}"))]
    Malformed {
        what: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("{what} does not denote a {expected:?} but a {actual:?}"))]
    WrongKind {
        what: String,
        expected: String,
        actual: String,
    },

    #[snafu(display("{source}"))]
    Submit { source: kube::Error },
}

/// Decodes `document`, verifies it denotes `{expected_group, expected_kind}`,
/// and returns a [`DynamicObject`] whose `metadata` has been forcibly
/// replaced with exactly `{name, generateName, namespace,
/// labels:{system-managed: ""}}` — both set to `name_prefix` — while every
/// other top-level field (including unknown extension fields) is kept
/// verbatim. `what` is a human label used only in error messages (e.g.
/// `"configured network policy"`).
pub fn sanitize(
    what: &str,
    document: &str,
    expected_group: &str,
    expected_kind: &str,
    namespace: &str,
    name_prefix: &str,
) -> Result<DynamicObject, TemplateError> {
    let mut value: Value = serde_yaml::from_str(document).context(MalformedSnafu {
        what: what.to_string(),
    })?;

    let api_version = value
        .get("apiVersion")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let (group, version) = split_api_version(&api_version);

    if group != expected_group || kind != expected_kind {
        return Err(TemplateError::WrongKind {
            what: what.to_string(),
            expected: render_kind(expected_kind, expected_group),
            actual: render_kind(&kind, &group),
        });
    }

    if let Value::Object(map) = &mut value {
        map.remove("metadata");
        map.remove("apiVersion");
        map.remove("kind");
    }

    let mut labels = BTreeMap::new();
    labels.insert(SYSTEM_MANAGED_LABEL.to_string(), String::new());

    let metadata = k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
        name: Some(name_prefix.to_string()),
        generate_name: Some(name_prefix.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        ..Default::default()
    };

    Ok(DynamicObject {
        types: Some(TypeMeta {
            api_version,
            kind,
        }),
        metadata,
        data: value,
    })
}

/// Submits a sanitized template through the dynamic client.
pub async fn submit(
    client_factory: &dyn ClientFactory,
    namespace: &str,
    object: DynamicObject,
) -> Result<(), TemplateError> {
    let types = object.types.clone().unwrap_or_default();
    let (group, version) = split_api_version(&types.api_version);
    let gvk = GroupVersionKind::gvk(&group, &version, &types.kind);
    let api_resource = ApiResource::from_gvk(&gvk);

    client_factory
        .create_dynamic(&api_resource, namespace, object)
        .await
        .context(SubmitSnafu)?;

    Ok(())
}

fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

fn render_kind(kind: &str, group: &str) -> String {
    if group.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}.{group}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED_GROUP: &str = "networking.k8s.io";
    const EXPECTED_KIND: &str = "NetworkPolicy";

    #[test]
    fn malformed_document_is_rejected() {
        let err = sanitize(
            "configured network policy",
            ":",
            EXPECTED_GROUP,
            EXPECTED_KIND,
            "ns1",
            "steward.sap.com--configured-",
        )
        .unwrap_err();

        assert!(err
            .to_string()
            .starts_with("failed to decode configured network policy:"));
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn wrong_group_is_rejected_with_exact_message() {
        let document = "apiVersion: unexpected.group/v1\nkind: NetworkPolicy\n";
        let err = sanitize(
            "configured network policy",
            document,
            EXPECTED_GROUP,
            EXPECTED_KIND,
            "ns1",
            "steward.sap.com--configured-",
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "configured network policy does not denote a \"NetworkPolicy.networking.k8s.io\" but a \"NetworkPolicy.unexpected.group\""
        );
    }

    #[test]
    fn metadata_is_forcibly_replaced_and_other_fields_kept() {
        let document = "apiVersion: networking.k8s.io/v1\nkind: NetworkPolicy\nmetadata:\n  name: attacker-chosen\n  namespace: attacker-ns\n  labels:\n    evil: true\nspec:\n  podSelector: {}\ncustomField: keep-me\n";
        let object = sanitize(
            "configured network policy",
            document,
            EXPECTED_GROUP,
            EXPECTED_KIND,
            "steward-run-abcde-main-",
            "steward.sap.com--configured-",
        )
        .unwrap();

        assert_eq!(object.metadata.name.as_deref(), Some("steward.sap.com--configured-"));
        assert_eq!(
            object.metadata.generate_name.as_deref(),
            Some("steward.sap.com--configured-")
        );
        assert_eq!(
            object.metadata.namespace.as_deref(),
            Some("steward-run-abcde-main-")
        );
        assert_eq!(
            object.metadata.labels.unwrap().get(SYSTEM_MANAGED_LABEL).unwrap(),
            ""
        );
        assert_eq!(object.data.get("customField").unwrap(), "keep-me");
        assert!(object.data.get("spec").is_some());
        assert!(object.data.get("metadata").is_none());
    }

    #[test]
    fn bare_kind_with_no_group_renders_without_dot() {
        let document = "apiVersion: v1\nkind: ConfigMap\n";
        let err = sanitize("thing", document, "apps", "Deployment", "ns1", "prefix-").unwrap_err();
        assert_eq!(
            err.to_string(),
            "thing does not denote a \"Deployment.apps\" but a \"ConfigMap\""
        );
    }
}
