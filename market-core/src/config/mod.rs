//! Hot-reconfigurable runtime configuration: merge-patch semantics over a
//! plain data record (spec.md §9 "Hot-reconfiguration").

pub mod types;

pub use types::RuntimeConfig;

use serde_json::Value;

use crate::error::ConfigError;

/// Path fragments that must never be negative when patched. Checked against
/// the full dotted path (e.g. `agent_counts.momentum`) rather than the leaf
/// key alone, since the group name carries "counts", not the leaf.
const COUNT_FIELD_MARKERS: &[&str] = &["count", "counts"];

impl RuntimeConfig {
    /// Merges `patch` into a clone of `self`, validates it as a unit, and
    /// only then replaces `self`. If any leaf fails to coerce, no leaves are
    /// applied — this never leaves the config half-updated.
    pub fn patch(&mut self, patch: &Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&*self).expect("RuntimeConfig always serializes");
        validate_and_merge(&mut base, patch, "")?;
        *self = serde_json::from_value(base).map_err(|e| ConfigError::NonScalarLeaf { path: e.to_string() })?;
        Ok(())
    }
}

fn validate_and_merge(base: &mut Value, patch: &Value, path: &str) -> Result<(), ConfigError> {
    let Some(patch_obj) = patch.as_object() else {
        // Patching a non-object at the root is meaningless; ignored rather
        // than erroring, matching "unknown keys are ignored on patch".
        return Ok(());
    };

    let base_obj = match base.as_object_mut() {
        Some(o) => o,
        None => return Ok(()),
    };

    for (key, patch_value) in patch_obj {
        let child_path = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };

        match base_obj.get_mut(key) {
            None => {
                // Unknown keys are ignored on patch (spec.md §3, §7).
                continue;
            }
            Some(base_value) if base_value.is_object() => {
                if !patch_value.is_object() {
                    return Err(ConfigError::NonScalarLeaf { path: child_path });
                }
                validate_and_merge(base_value, patch_value, &child_path)?;
            }
            Some(base_value) => {
                if patch_value.is_object() || patch_value.is_array() {
                    return Err(ConfigError::NonScalarLeaf { path: child_path });
                }
                if is_count_field(&child_path) {
                    if let Some(n) = patch_value.as_i64() {
                        if n < 0 {
                            return Err(ConfigError::NegativeCount { path: child_path, value: n });
                        }
                    }
                }
                *base_value = patch_value.clone();
            }
        }
    }

    Ok(())
}

fn is_count_field(path: &str) -> bool {
    COUNT_FIELD_MARKERS.iter().any(|m| path.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_applies_known_leaves() {
        let mut cfg = RuntimeConfig::default();
        cfg.patch(&json!({"simulation": {"tickRateMs": 10}})).unwrap();
        // camelCase key is unknown under serde's default snake_case field
        // names, so it's ignored, not applied or erroring.
        assert_eq!(cfg.simulation.tick_rate_ms, 1000);

        cfg.patch(&json!({"simulation": {"tick_rate_ms": 10}, "news": {"lambda": 0.5}})).unwrap();
        assert_eq!(cfg.simulation.tick_rate_ms, 10);
        assert_eq!(cfg.news.lambda, 0.5);
    }

    #[test]
    fn patch_rejects_non_scalar_leaf() {
        let mut cfg = RuntimeConfig::default();
        let err = cfg.patch(&json!({"simulation": {"tick_rate_ms": {"nested": 1}}})).unwrap_err();
        assert!(matches!(err, ConfigError::NonScalarLeaf { .. }));
        // Rejected as a unit: no partial application.
        assert_eq!(cfg.simulation.tick_rate_ms, 1000);
    }

    #[test]
    fn patch_rejects_negative_count() {
        let mut cfg = RuntimeConfig::default();
        let err = cfg.patch(&json!({"agent_counts": {"momentum": -5}})).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeCount { .. }));
        assert_eq!(cfg.agent_counts.momentum, 0);
    }

    #[test]
    fn patch_ignores_unknown_keys() {
        let mut cfg = RuntimeConfig::default();
        cfg.patch(&json!({"totally_unknown_group": {"x": 1}})).unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn round_trip_patch_of_get_config_is_identity() {
        let cfg = RuntimeConfig::default();
        let mut patched = cfg.clone();
        let as_value = serde_json::to_value(&cfg).unwrap();
        patched.patch(&as_value).unwrap();
        assert_eq!(cfg, patched);
    }

    #[test]
    fn json_round_trip() {
        let cfg = RuntimeConfig::default();
        let s = cfg.to_json_string().unwrap();
        let back = RuntimeConfig::from_json_str(&s).unwrap();
        assert_eq!(cfg, back);
    }
}
