//! Operator-supplied configuration and the feature flags threaded through a
//! run, loaded once at process start and carried by value from then on.

use std::cell::Cell;

use serde::Deserialize;
use snafu::{ResultExt, Snafu};

use crate::duration::Duration;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file {path:?}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse configuration file {path:?}: {source}"))]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Operator-supplied knobs applied to every run namespace. Unknown fields are
/// rejected so a typo in the operator's YAML surfaces at load time rather
/// than being silently ignored.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RunConfig {
    /// YAML document for the tenant-configurable network policy, or `None` to skip it.
    #[serde(default)]
    pub network_policy: Option<String>,

    /// YAML document for the tenant-configurable limit range, or `None` to skip it.
    #[serde(default)]
    pub limit_range: Option<String>,

    /// YAML document for the tenant-configurable resource quota, or `None` to skip it.
    #[serde(default)]
    pub resource_quota: Option<String>,

    pub timeout: Duration,

    #[serde(default)]
    pub fs_group: Option<i64>,

    #[serde(default)]
    pub run_as_group: Option<i64>,

    #[serde(default)]
    pub run_as_user: Option<i64>,
}

impl RunConfig {
    pub fn from_yaml_str(path: &str, raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).context(ParseSnafu {
            path: path.to_string(),
        })
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).context(ReadSnafu {
            path: path.display().to_string(),
        })?;
        Self::from_yaml_str(&path.display().to_string(), &raw)
    }
}

/// Process-level toggles resolved once per run and carried in
/// [`crate::run_manager::RunContext`], rather than read from a global at
/// call time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub create_aux_namespace_if_unused: bool,
}

thread_local! {
    static CREATE_AUX_NAMESPACE_IF_UNUSED: Cell<bool> = const { Cell::new(false) };
}

impl FeatureFlags {
    /// Resolves the flags in effect on the current thread, honoring any
    /// active [`ScopedFeatureFlagOverride`].
    pub fn resolve() -> Self {
        FeatureFlags {
            create_aux_namespace_if_unused: CREATE_AUX_NAMESPACE_IF_UNUSED.with(Cell::get),
        }
    }
}

/// Overrides `create_aux_namespace_if_unused` for the current thread for the
/// lifetime of this guard, restoring the previous value on drop (including
/// on an unwinding panic).
pub struct ScopedFeatureFlagOverride {
    previous: bool,
}

impl ScopedFeatureFlagOverride {
    pub fn create_aux_namespace_if_unused(value: bool) -> Self {
        let previous = CREATE_AUX_NAMESPACE_IF_UNUSED.with(|cell| cell.replace(value));
        Self { previous }
    }
}

impl Drop for ScopedFeatureFlagOverride {
    fn drop(&mut self) {
        CREATE_AUX_NAMESPACE_IF_UNUSED.with(|cell| cell.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_fields() {
        let raw = "timeout: 30m\nbogusField: true\n";
        let err = RunConfig::from_yaml_str("test.yaml", raw).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn parses_minimal_document() {
        let raw = "timeout: 30m\n";
        let config = RunConfig::from_yaml_str("test.yaml", raw).unwrap();
        assert_eq!(config.timeout.to_string(), "30m");
        assert_eq!(config.network_policy, None);
    }

    #[test]
    fn scoped_override_restores_previous_value_on_drop() {
        assert!(!FeatureFlags::resolve().create_aux_namespace_if_unused);
        {
            let _guard = ScopedFeatureFlagOverride::create_aux_namespace_if_unused(true);
            assert!(FeatureFlags::resolve().create_aux_namespace_if_unused);
        }
        assert!(!FeatureFlags::resolve().create_aux_namespace_if_unused);
    }

    #[test]
    fn loads_from_a_real_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run-config.yaml");
        std::fs::write(&path, "timeout: 1h\nnetworkPolicy: \"apiVersion: v1\"\n").unwrap();

        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.timeout.to_string(), "1h");
        assert_eq!(config.network_policy.as_deref(), Some("apiVersion: v1"));
    }

    #[test]
    fn missing_file_surfaces_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.yaml");

        let err = RunConfig::from_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
