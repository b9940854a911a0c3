//! Process-wide render policy and per-frame debug overrides.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Forces the CPU path when truthy.
pub const ENV_FORCE_CPU: &str = "LOOKCHAIN_FORCE_CPU";
/// `cpu` forces the CPU path.
pub const ENV_BACKEND: &str = "LOOKCHAIN_BACKEND";
/// Skips host-native GPU backends when truthy.
pub const ENV_DISABLE_NATIVE: &str = "LOOKCHAIN_DISABLE_NATIVE";
/// Enables fallback logging and the parameter trace when truthy.
pub const ENV_DIAG: &str = "LOOKCHAIN_DIAG";
/// Number of internal GPU frames to cross-check on the CPU.
pub const ENV_PARITY_FRAMES: &str = "LOOKCHAIN_PARITY_FRAMES";

/// Overrides honored before any backend is tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPolicy {
    /// Always render on the CPU.
    pub force_cpu: bool,
    /// Never use host-native GPU backends.
    pub disable_native: bool,
    /// Emit fallback logs and the parameter trace.
    pub diagnostics_enabled: bool,
    /// Cross-check this many internal GPU frames against the CPU. 0 = off.
    pub parity_frames: u32,
}

impl RenderPolicy {
    /// Read the policy from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a policy from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let truthy = |key: &str| lookup(key).is_some_and(|v| is_truthy(&v));
        Self {
            force_cpu: truthy(ENV_FORCE_CPU)
                || lookup(ENV_BACKEND).is_some_and(|v| v.eq_ignore_ascii_case("cpu")),
            disable_native: truthy(ENV_DISABLE_NATIVE),
            diagnostics_enabled: truthy(ENV_DIAG),
            parity_frames: lookup(ENV_PARITY_FRAMES)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    /// Environment policy, read once per process.
    pub fn process() -> &'static Self {
        static POLICY: OnceLock<RenderPolicy> = OnceLock::new();
        POLICY.get_or_init(|| {
            let policy = Self::from_env();
            tracing::info!(?policy, "render policy loaded");
            policy
        })
    }
}

/// Debug switches exposed as host parameters, read per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugOverrides {
    pub force_cpu: bool,
    pub disable_native: bool,
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn policy_from(pairs: &[(&str, &str)]) -> RenderPolicy {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RenderPolicy::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_is_default() {
        assert_eq!(policy_from(&[]), RenderPolicy::default());
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "TRUE"] {
            assert!(policy_from(&[(ENV_FORCE_CPU, value)]).force_cpu, "value {value}");
        }
        for value in ["0", "yes", "", "True"] {
            assert!(!policy_from(&[(ENV_FORCE_CPU, value)]).force_cpu, "value {value}");
        }
    }

    #[test]
    fn test_backend_cpu_forces_cpu() {
        assert!(policy_from(&[(ENV_BACKEND, "cpu")]).force_cpu);
        assert!(!policy_from(&[(ENV_BACKEND, "metal")]).force_cpu);
    }

    #[test]
    fn test_all_switches() {
        let policy = policy_from(&[
            (ENV_DISABLE_NATIVE, "1"),
            (ENV_DIAG, "true"),
            (ENV_PARITY_FRAMES, " 12 "),
        ]);
        assert_eq!(
            policy,
            RenderPolicy {
                force_cpu: false,
                disable_native: true,
                diagnostics_enabled: true,
                parity_frames: 12,
            }
        );
        assert_eq!(policy_from(&[(ENV_PARITY_FRAMES, "lots")]).parity_frames, 0);
    }

    #[test]
    fn test_policy_deserializes_with_missing_fields() {
        let policy: RenderPolicy = serde_json::from_str(r#"{"force_cpu":true}"#).unwrap();
        assert!(policy.force_cpu);
        assert_eq!(policy.parity_frames, 0);
    }
}
