//! API-key authentication with a path bypass list.
//!
//! Bypass matching is exact, or prefix followed by `/` or `?` - a bare
//! prefix match would let `/statusX` ride on `/status`'s bypass.

use serde::Deserialize;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted API keys; empty disables auth entirely
    pub api_keys: Vec<String>,
    /// Paths reachable without a key
    pub bypass_paths: Vec<String>,
}

pub struct AuthGuard {
    config: AuthConfig,
}

impl AuthGuard {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn enabled(&self) -> bool {
        !self.config.api_keys.is_empty()
    }

    fn path_bypassed(&self, path: &str) -> bool {
        self.config.bypass_paths.iter().any(|bypass| {
            if path == bypass {
                return true;
            }

            match path.strip_prefix(bypass.as_str()) {
                Some(rest) => rest.starts_with('/') || rest.starts_with('?'),
                None => false,
            }
        })
    }

    /// Whether a request for `path` carrying `key` may proceed
    pub fn allow(&self, path: &str, key: Option<&str>) -> bool {
        if !self.enabled() || self.path_bypassed(path) {
            return true;
        }

        match key {
            Some(key) => self.config.api_keys.iter().any(|k| k == key),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AuthGuard {
        AuthGuard::new(AuthConfig {
            api_keys: vec!["sekrit".to_string()],
            bypass_paths: vec!["/health".to_string(), "/status".to_string()],
        })
    }

    #[test]
    fn bypass_paths_need_no_key() {
        let guard = guard();

        assert!(guard.allow("/health", None));
        assert!(guard.allow("/status", None));
        assert!(guard.allow("/status/ready", None));
    }

    #[test]
    fn prefix_without_separator_still_requires_auth() {
        let guard = guard();

        assert!(!guard.allow("/statusxyz", None));
        assert!(!guard.allow("/healthz", None));
        assert!(guard.allow("/statusxyz", Some("sekrit")));
    }

    #[test]
    fn keys_are_checked_exactly() {
        let guard = guard();

        assert!(guard.allow("/metrics", Some("sekrit")));
        assert!(!guard.allow("/metrics", Some("sekri")));
        assert!(!guard.allow("/metrics", None));
    }

    #[test]
    fn no_keys_configured_disables_auth() {
        let open = AuthGuard::new(AuthConfig::default());
        assert!(open.allow("/metrics", None));
    }
}
