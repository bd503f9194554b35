//! Label propagation: merging ownership/identity labels onto newly created
//! objects with conflict detection.
//!
//! Labels are the only selector used for cross-object ownership queries, so a
//! silent overwrite here would orphan resources. [`propagate`] is a pure
//! function; the four `mark_*` helpers below are the thin, component-specific
//! callers used throughout the rest of this crate.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use snafu::Snafu;

use crate::constants::{
    OWNED_BY_CLIENT_NAME, OWNED_BY_CLIENT_NAMESPACE, OWNED_BY_PIPELINE_RUN_NAME,
    OWNED_BY_TENANT_NAME, OWNED_BY_TENANT_NAMESPACE, SYSTEM_MANAGED_LABEL,
};

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("label {key:?}: cannot overwrite existing value {old:?} with {new:?}"))]
pub struct LabelConflict {
    pub key: String,
    pub old: String,
    pub new: String,
}

/// Computes the label map resulting from merging `source`'s and `additions`'
/// values for each key in `governed_keys` onto `target`.
///
/// For each governed key: if `additions` has a value, it is preferred over
/// `source`'s value for that key. If the target already carries a different
/// non-empty value for a key that would be written, merging fails with
/// [`LabelConflict`] and nothing is returned (the caller must not apply a
/// partial result).
pub fn propagate(
    target: &BTreeMap<String, String>,
    source: &BTreeMap<String, String>,
    additions: &BTreeMap<String, String>,
    governed_keys: &[&str],
) -> Result<BTreeMap<String, String>, LabelConflict> {
    let mut result = target.clone();

    for &key in governed_keys {
        let candidate = additions.get(key).or_else(|| source.get(key));
        let Some(candidate) = candidate else {
            continue;
        };

        if let Some(existing) = target.get(key) {
            if existing != candidate {
                return Err(LabelConflict {
                    key: key.to_string(),
                    old: existing.clone(),
                    new: candidate.clone(),
                });
            }
            continue;
        }

        result.insert(key.to_string(), candidate.clone());
    }

    Ok(result)
}

/// Applies `propagate` directly onto an [`ObjectMeta`]'s `labels` map,
/// leaving it untouched (not materializing an empty map) when the computed
/// result would be empty and the map started out empty or absent.
fn apply(
    meta: &mut ObjectMeta,
    source: &BTreeMap<String, String>,
    additions: &BTreeMap<String, String>,
    governed_keys: &[&str],
) -> Result<(), LabelConflict> {
    let existing = meta.labels.clone().unwrap_or_default();
    let merged = propagate(&existing, source, additions, governed_keys)?;

    if merged.is_empty() && meta.labels.as_ref().is_none_or(BTreeMap::is_empty) {
        return Ok(());
    }

    meta.labels = Some(merged);
    Ok(())
}

/// Stamps the system-managed label (always present, always empty value) onto `meta`.
pub fn mark_system_managed(meta: &mut ObjectMeta) {
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(SYSTEM_MANAGED_LABEL.to_string(), String::new());
}

/// Propagates the client-namespace ownership labels from `source` (or `additions`) onto `meta`.
pub fn mark_owned_by_client_namespace(
    meta: &mut ObjectMeta,
    source: &BTreeMap<String, String>,
    additions: &BTreeMap<String, String>,
) -> Result<(), LabelConflict> {
    apply(
        meta,
        source,
        additions,
        &[OWNED_BY_CLIENT_NAME, OWNED_BY_CLIENT_NAMESPACE],
    )
}

/// Propagates the tenant ownership labels from `source` (or `additions`) onto `meta`.
pub fn mark_owned_by_tenant(
    meta: &mut ObjectMeta,
    source: &BTreeMap<String, String>,
    additions: &BTreeMap<String, String>,
) -> Result<(), LabelConflict> {
    apply(
        meta,
        source,
        additions,
        &[OWNED_BY_TENANT_NAME, OWNED_BY_TENANT_NAMESPACE],
    )
}

/// Propagates the pipeline-run ownership label from `source` (or `additions`) onto `meta`.
pub fn mark_owned_by_pipeline_run(
    meta: &mut ObjectMeta,
    source: &BTreeMap<String, String>,
    additions: &BTreeMap<String, String>,
) -> Result<(), LabelConflict> {
    apply(meta, source, additions, &[OWNED_BY_PIPELINE_RUN_NAME])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn propagate_prefers_additions_over_source() {
        let target = BTreeMap::new();
        let source = map(&[("k", "from-source")]);
        let additions = map(&[("k", "from-additions")]);

        let result = propagate(&target, &source, &additions, &["k"]).unwrap();
        assert_eq!(result.get("k").unwrap(), "from-additions");
    }

    #[test]
    fn propagate_leaves_untouched_keys_alone() {
        let target = map(&[("keep", "me")]);
        let source = BTreeMap::new();
        let additions = BTreeMap::new();

        let result = propagate(&target, &source, &additions, &["governed"]).unwrap();
        assert_eq!(result, target);
    }

    #[test]
    fn propagate_same_value_is_not_a_conflict() {
        let target = map(&[("k", "same")]);
        let source = map(&[("k", "same")]);

        let result = propagate(&target, &source, &BTreeMap::new(), &["k"]).unwrap();
        assert_eq!(result.get("k").unwrap(), "same");
    }

    #[test]
    fn propagate_conflicting_value_is_rejected_and_target_is_reported_unchanged() {
        let target = map(&[(OWNED_BY_TENANT_NAME, "X")]);
        let source = map(&[(OWNED_BY_TENANT_NAME, "Y")]);

        let err = propagate(&target, &source, &BTreeMap::new(), &[OWNED_BY_TENANT_NAME])
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "label \"steward.sap.com/ownedByTenantName\": cannot overwrite existing value \"X\" with \"Y\""
        );
    }

    #[test]
    fn apply_does_not_materialize_empty_label_map() {
        let mut meta = ObjectMeta::default();
        apply(&mut meta, &BTreeMap::new(), &BTreeMap::new(), &[OWNED_BY_TENANT_NAME]).unwrap();
        assert!(meta.labels.is_none());
    }

    #[test]
    fn mark_system_managed_sets_empty_value() {
        let mut meta = ObjectMeta::default();
        mark_system_managed(&mut meta);
        assert_eq!(
            meta.labels.unwrap().get(SYSTEM_MANAGED_LABEL).unwrap(),
            ""
        );
    }

    #[test]
    fn mark_owned_by_tenant_rejects_conflicting_existing_value() {
        let mut meta = ObjectMeta {
            labels: Some(map(&[(OWNED_BY_TENANT_NAME, "X")])),
            ..Default::default()
        };
        let source = map(&[(OWNED_BY_TENANT_NAME, "Y")]);

        let err = mark_owned_by_tenant(&mut meta, &source, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.key, OWNED_BY_TENANT_NAME);
        // Target must be reported unchanged.
        assert_eq!(meta.labels.unwrap().get(OWNED_BY_TENANT_NAME).unwrap(), "X");
    }
}
