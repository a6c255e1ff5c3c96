//! Process liveness probing.
//!
//! A session or lease holder counts as alive while its process exists. The
//! probe never signals or otherwise disturbs the target process:
//!
//! - **Linux**: presence of `/proc/<pid>`
//! - **Other Unix**: `kill -0 <pid>` (existence check only)
//! - **Elsewhere**: assumed alive; lease TTLs remain the hard backstop
//!
//! PIDs of zero, PIDs that would wrap to negative values and anything that is
//! not a number are reported dead without raising.

use std::fmt;

/// Answers "is process `pid` currently running?".
pub trait LivenessOracle: Send + Sync + fmt::Debug {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Real probe against the operating system process table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessProbe;

impl ProcessProbe {
    pub const fn new() -> Self {
        Self
    }
}

impl LivenessOracle for ProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        if !is_probeable(pid) {
            return false;
        }
        probe(pid)
    }
}

/// PIDs that address process groups or special meta-processes are never probed.
const fn is_probeable(pid: u32) -> bool {
    pid != 0 && pid <= i32::MAX.unsigned_abs()
}

#[cfg(target_os = "linux")]
fn probe(pid: u32) -> bool {
    std::path::Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn probe(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn probe(_pid: u32) -> bool {
    true
}

/// Lenient PID extraction from an untrusted JSON value.
///
/// Accepts non-negative integers and numeric strings; everything else is `None`.
pub fn pid_from_value(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
    .filter(|pid| *pid != 0)
}

/// Serde helper: deserialize a PID field without failing on junk.
pub(crate) mod lenient_pid {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pid: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match pid {
            Some(pid) => serializer.serialize_u32(*pid),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(super::pid_from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_own_process_is_alive() {
        assert!(ProcessProbe::new().is_alive(std::process::id()));
    }

    #[test]
    fn test_zero_pid_is_dead() {
        assert!(!ProcessProbe::new().is_alive(0));
    }

    #[test]
    fn test_pid_beyond_i32_is_dead() {
        assert!(!ProcessProbe::new().is_alive(u32::MAX));
    }

    #[test]
    fn test_pid_from_value_accepts_numbers_and_numeric_strings() {
        assert_eq!(pid_from_value(&json!(1234)), Some(1234));
        assert_eq!(pid_from_value(&json!("1234")), Some(1234));
    }

    #[test]
    fn test_pid_from_value_rejects_junk() {
        assert_eq!(pid_from_value(&json!(null)), None);
        assert_eq!(pid_from_value(&json!("abc")), None);
        assert_eq!(pid_from_value(&json!(-5)), None);
        assert_eq!(pid_from_value(&json!(0)), None);
        assert_eq!(pid_from_value(&json!(1.5)), None);
        assert_eq!(pid_from_value(&json!({"pid": 1})), None);
    }
}
