//! Fns to read variables from the environment more conveniently.

use std::env;

use lazy_static::lazy_static;
use tracing::debug;

/// Gateway subgraph URLs embed an API key.
const SECRET_LOG_BLACKLIST: [&str; 1] = ["SUBGRAPH_URL"];

/// The Graph refuses to return more entities than this per query.
pub const MAX_QUERY_FIRST: u32 = 1000;

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

fn obfuscate_if_secret(blacklist: &[&str], key: &str, value: &str) -> String {
    if blacklist.contains(&key) {
        let mut last_four = value.to_string();
        last_four.drain(0..value.len().saturating_sub(4));
        format!("****{last_four}")
    } else {
        value.to_string()
    }
}

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(e) => panic!("{e}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        let output = obfuscate_if_secret(&SECRET_LOG_BLACKLIST, key, existing_var);
        debug!("env var {key}: {output}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

pub fn get_env_bool(key: &str) -> Option<bool> {
    get_env_var(key).map(|var| match var.to_lowercase().as_str() {
        "true" | "t" | "1" => true,
        "false" | "f" | "0" => false,
        str => panic!("invalid bool value {str} for {key}"),
    })
}

pub fn get_env_u32(key: &str) -> Option<u32> {
    get_env_var(key).map(|var| {
        var.parse::<u32>()
            .unwrap_or_else(|_| panic!("invalid number {var} for {key}"))
    })
}

pub struct EnvConfig {
    pub log_json: bool,
    pub log_perf: bool,
    /// Entities to request per query, capped at what subgraphs allow.
    pub query_first: u32,
    pub subgraph_url: Option<String>,
}

impl EnvConfig {
    /// Caps a requested entity count at `query_first`.
    pub fn cap_first(&self, first: u32) -> u32 {
        first.min(self.query_first)
    }
}

pub fn get_env_config() -> EnvConfig {
    EnvConfig {
        log_json: get_env_bool("LOG_JSON").unwrap_or(false),
        log_perf: get_env_bool("LOG_PERF").unwrap_or(false),
        query_first: get_env_u32("QUERY_FIRST")
            .unwrap_or(MAX_QUERY_FIRST)
            .min(MAX_QUERY_FIRST),
        subgraph_url: get_env_var("SUBGRAPH_URL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_var_safe_some() {
        let test_key = "TEST_KEY_SAFE_SOME";
        let test_value = "my-env-value";
        std::env::set_var(test_key, test_value);
        assert_eq!(get_env_var(test_key), Some(test_value.to_string()));
    }

    #[test]
    fn test_get_env_var_safe_none() {
        let key = get_env_var("DOESNT_EXIST");
        assert!(key.is_none());
    }

    #[test]
    fn test_get_env_bool_not_there() {
        let flag = get_env_bool("DOESNT_EXIST");
        assert_eq!(flag, None);
    }

    #[test]
    fn test_get_env_bool_true_upper() {
        let test_key = "TEST_KEY_BOOL_TRUE_UPPER";
        std::env::set_var(test_key, "TRUE");
        assert_eq!(get_env_bool(test_key), Some(true));
    }

    #[test]
    fn test_get_env_bool_false() {
        let test_key = "TEST_KEY_BOOL_FALSE";
        std::env::set_var(test_key, "0");
        assert_eq!(get_env_bool(test_key), Some(false));
    }

    #[test]
    #[should_panic]
    fn test_get_env_u32_invalid_panics() {
        let test_key = "TEST_KEY_U32_INVALID";
        std::env::set_var(test_key, "a thousand");
        get_env_u32(test_key);
    }

    #[test]
    fn test_get_env_u32() {
        let test_key = "TEST_KEY_U32";
        std::env::set_var(test_key, "250");
        assert_eq!(get_env_u32(test_key), Some(250));
    }

    #[test]
    fn test_cap_first() {
        let config = EnvConfig {
            log_json: false,
            log_perf: false,
            query_first: 100,
            subgraph_url: None,
        };
        assert_eq!(config.cap_first(10), 10);
        assert_eq!(config.cap_first(5000), 100);
    }

    #[test]
    fn test_obfuscate_subgraph_url() {
        assert_eq!(
            obfuscate_if_secret(
                &SECRET_LOG_BLACKLIST,
                "SUBGRAPH_URL",
                "https://gateway.thegraph.com/api/secret/subgraphs/id/abcd"
            ),
            "****abcd"
        );
        assert_eq!(
            obfuscate_if_secret(&SECRET_LOG_BLACKLIST, "LOG_JSON", "true"),
            "true"
        );
    }
}
