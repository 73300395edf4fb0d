//! Operating user and environment snapshots recorded alongside runs and projects

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Environment variables of the process at capture time, with a stable hash.
///
/// Projects keep one snapshot per distinct environment per user, so a project
/// that was touched from two machines carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub user: String,
    pub env_hash: String,
    pub env_dict: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Snapshot the current process environment
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env_dict: BTreeMap<String, String> = vars.into_iter().collect();
        let user = env_dict
            .get("USER")
            .or_else(|| env_dict.get("USERNAME"))
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let env_hash = hash_env(&env_dict);
        Self {
            user,
            env_hash,
            env_dict,
        }
    }

    /// `HOME` as recorded in the snapshot, used when relocating projects between machines
    pub fn home(&self) -> Option<&str> {
        self.env_dict.get("HOME").map(String::as_str)
    }
}

fn hash_env(env: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha1::new();
    for (k, v) in env {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Name of the user running this process
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hash_is_order_independent() {
        let a = EnvSnapshot::from_vars(vars(&[("USER", "ada"), ("HOME", "/home/ada")]));
        let b = EnvSnapshot::from_vars(vars(&[("HOME", "/home/ada"), ("USER", "ada")]));
        assert_eq!(a.env_hash, b.env_hash);
        assert_eq!(a.user, "ada");
        assert_eq!(a.home(), Some("/home/ada"));
    }

    #[test]
    fn test_hash_changes_with_environment() {
        let a = EnvSnapshot::from_vars(vars(&[("USER", "ada")]));
        let b = EnvSnapshot::from_vars(vars(&[("USER", "ada"), ("PATH", "/bin")]));
        assert_ne!(a.env_hash, b.env_hash);
    }

    #[test]
    fn test_missing_user_is_unknown() {
        let snap = EnvSnapshot::from_vars(vars(&[("PATH", "/bin")]));
        assert_eq!(snap.user, "unknown");
    }
}
