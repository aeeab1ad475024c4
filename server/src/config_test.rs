use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers hold `env_guard()` so env mutations do not race.
unsafe fn clear_server_env() {
    unsafe {
        for var in [
            "STRATONET_BIND",
            "AUTH_PORT",
            "QUERY_PORT",
            "PASSWORD_TIMEOUT_SECS",
            "MAX_AUTH_ATTEMPTS",
            "AUTH_TOKEN_LENGTH",
            "SESSION_IDLE_TIMEOUT_SECS",
            "STRATONET_USERS",
            "NASA_API_KEY",
            "APOD_BASE_URL",
            "INSIGHT_URL",
            "PROVIDER_REQUEST_TIMEOUT_SECS",
            "PROVIDER_CONNECT_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }
}

#[test]
fn from_env_defaults_match_default_impl() {
    let _guard = env_guard();
    unsafe { clear_server_env() };

    let cfg = ServerConfig::from_env().unwrap();
    assert_eq!(cfg, ServerConfig::default());
    assert_eq!(cfg.auth_port, 4444);
    assert_eq!(cfg.query_port, 4445);
    assert_eq!(cfg.password_timeout, Duration::from_secs(30));
    assert_eq!(cfg.max_auth_attempts, 3);
    assert!(cfg.session_idle_timeout.is_none());
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_guard();
    unsafe {
        clear_server_env();
        std::env::set_var("STRATONET_BIND", "127.0.0.1");
        std::env::set_var("AUTH_PORT", "9000");
        std::env::set_var("QUERY_PORT", "9001");
        std::env::set_var("PASSWORD_TIMEOUT_SECS", "5");
        std::env::set_var("SESSION_IDLE_TIMEOUT_SECS", "600");
        std::env::set_var("STRATONET_USERS", "ana:pw1, bo:pw2");
        std::env::set_var("NASA_API_KEY", "k");
    }

    let cfg = ServerConfig::from_env().unwrap();
    assert_eq!(cfg.bind, IpAddr::from([127, 0, 0, 1]));
    assert_eq!(cfg.auth_port, 9000);
    assert_eq!(cfg.query_port, 9001);
    assert_eq!(cfg.password_timeout, Duration::from_secs(5));
    assert_eq!(cfg.session_idle_timeout, Some(Duration::from_secs(600)));
    assert_eq!(cfg.extra_users, vec![("ana".to_string(), "pw1".to_string()), ("bo".to_string(), "pw2".to_string())]);
    assert_eq!(cfg.provider.api_key, "k");

    unsafe { clear_server_env() };
}

#[test]
fn from_env_rejects_bad_bind_address() {
    let _guard = env_guard();
    unsafe {
        clear_server_env();
        std::env::set_var("STRATONET_BIND", "not-an-ip");
    }

    let err = ServerConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("STRATONET_BIND"));

    unsafe { clear_server_env() };
}

#[test]
fn parse_users_rejects_entry_without_colon() {
    let err = parse_users("ana:pw,broken").unwrap_err().to_string();
    assert!(err.contains("broken"));
}

#[test]
fn parse_users_skips_blank_entries() {
    assert_eq!(parse_users("ana:pw,,").unwrap(), vec![("ana".to_string(), "pw".to_string())]);
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let _guard = env_guard();
    unsafe { std::env::set_var("STRATONET_TEST_GARBAGE", "abc") };
    assert_eq!(env_parse("STRATONET_TEST_GARBAGE", 7u16), 7);
    unsafe { std::env::remove_var("STRATONET_TEST_GARBAGE") };
}
