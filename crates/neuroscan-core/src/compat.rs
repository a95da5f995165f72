//! Startup compatibility gate for the tensor runtime
//!
//! The gate is evaluated once before the server accepts traffic and is
//! read-only afterwards. Every request handler consults it first and
//! refuses to touch the model when it has tripped.

use tracing::warn;

/// Runtime major versions at or above this are rejected
pub const INCOMPATIBLE_MAJOR: u64 = 2;

/// Version substituted when the descriptor cannot be parsed
pub const SENTINEL_VERSION: (u64, u64) = (99, 0);

/// Process-wide compatibility flag plus its diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityGate {
    runtime: String,
    detected: String,
    parsed: (u64, u64),
    incompatible: bool,
    message: String,
}

impl CompatibilityGate {
    /// Evaluate `version` reported by the runtime named `runtime`
    pub fn evaluate(runtime: impl Into<String>, version: impl Into<String>) -> Self {
        let runtime = runtime.into();
        let detected = version.into();
        let parsed = parse_version(&detected).unwrap_or(SENTINEL_VERSION);
        let incompatible = parsed.0 >= INCOMPATIBLE_MAJOR;

        let message = if incompatible {
            format!(
                "Incompatible {runtime} version detected: {detected}. \
                 Please pin {runtime}<{INCOMPATIBLE_MAJOR} (e.g. `{runtime} = \"0.8\"` in Cargo.toml) \
                 and restart the server."
            )
        } else {
            String::new()
        };

        Self {
            runtime,
            detected,
            parsed,
            incompatible,
            message,
        }
    }

    /// Evaluate and emit a startup warning when the gate trips
    pub fn check(runtime: impl Into<String>, version: impl Into<String>) -> Self {
        let gate = Self::evaluate(runtime, version);
        if gate.incompatible {
            warn!(
                runtime = %gate.runtime,
                version = %gate.detected,
                "{}",
                gate.message
            );
        }
        gate
    }

    /// A gate that always passes, for tests and embedded use
    pub fn compatible() -> Self {
        Self::evaluate("candle-core", "0.0.0")
    }

    /// True when the runtime must not be used
    pub fn is_incompatible(&self) -> bool {
        self.incompatible
    }

    /// Diagnostic with remediation steps; empty when compatible
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Version string as reported
    pub fn detected_version(&self) -> &str {
        &self.detected
    }

    /// Leading (major, minor) pair, or the sentinel when unparsable
    pub fn parsed_version(&self) -> (u64, u64) {
        self.parsed
    }

    /// Name of the runtime being checked
    pub fn runtime(&self) -> &str {
        &self.runtime
    }
}

/// Parse the first two dot-separated components.
///
/// A bare major (`"1"`) is accepted with minor 0; anything non-numeric in
/// the first two components is rejected. A minor too large for `u64`
/// saturates instead of failing, since only the major decides the verdict.
pub fn parse_version(version: &str) -> Option<(u64, u64)> {
    let mut parts = version.split('.').take(2).map(str::trim);

    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = match parts.next() {
        Some(minor) if !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()) => {
            minor.parse::<u64>().unwrap_or(u64::MAX)
        }
        Some(_) => return None,
        None => 0,
    };
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.8.4"), Some((0, 8)));
        assert_eq!(parse_version("2.0.0rc1"), Some((2, 0)));
        assert_eq!(parse_version("1"), Some((1, 0)));
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("1.x.3"), None);
        assert_eq!(parse_version("v1.2"), None);
        assert_eq!(parse_version("1."), None);
        assert_eq!(parse_version("1.99999999999999999999"), Some((1, u64::MAX)));
    }

    #[test]
    fn test_compatible_runtime() {
        let gate = CompatibilityGate::evaluate("candle-core", "0.8.4");
        assert!(!gate.is_incompatible());
        assert!(gate.message().is_empty());
        assert_eq!(gate.parsed_version(), (0, 8));
    }

    #[test]
    fn test_incompatible_runtime_message() {
        let gate = CompatibilityGate::check("candle-core", "2.1.0");
        assert!(gate.is_incompatible());
        assert!(gate.message().contains("2.1.0"));
        assert!(gate.message().contains("restart"));
    }

    #[test]
    fn test_oversized_minor_stays_compatible() {
        let gate = CompatibilityGate::evaluate("candle-core", "1.99999999999999999999.0");
        assert!(!gate.is_incompatible());
        assert_eq!(gate.parsed_version(), (1, u64::MAX));
    }

    #[test]
    fn test_unparsable_fails_safe() {
        let gate = CompatibilityGate::evaluate("candle-core", "unknown");
        assert!(gate.is_incompatible());
        assert_eq!(gate.parsed_version(), SENTINEL_VERSION);
        assert!(gate.message().contains("unknown"));
    }

    proptest! {
        #[test]
        fn prop_major_two_or_more_is_incompatible(major in 2u64..10_000, minor in 0u64..1000, patch in 0u64..1000) {
            let gate = CompatibilityGate::evaluate("candle-core", format!("{major}.{minor}.{patch}"));
            prop_assert!(gate.is_incompatible());
        }

        #[test]
        fn prop_major_below_two_is_compatible(major in 0u64..2, minor in 0u64..1000, suffix in "[a-z0-9.+-]{0,8}") {
            let gate = CompatibilityGate::evaluate("candle-core", format!("{major}.{minor}.{suffix}"));
            prop_assert!(!gate.is_incompatible());
        }

        #[test]
        fn prop_non_numeric_major_is_incompatible(prefix in "[a-zA-Z_-][a-zA-Z0-9_-]{0,6}", rest in "[0-9.]{0,6}") {
            let gate = CompatibilityGate::evaluate("candle-core", format!("{prefix}{rest}"));
            prop_assert!(gate.is_incompatible());
        }
    }
}
