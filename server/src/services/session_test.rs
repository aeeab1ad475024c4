use super::*;

fn peer(port: u16) -> Binding {
    Binding { addr: IpAddr::from([127, 0, 0, 1]), port }
}

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a, 0xff]), "0aff");
}

// =============================================================================
// generate_token
// =============================================================================

#[test]
fn token_len_scales_with_username() {
    assert_eq!(token_len("Abdul", 8), 40);
    assert_eq!(token_len("Zeyd", 8), 32);
}

#[test]
fn token_len_is_clamped() {
    assert_eq!(token_len("a", 1), MIN_TOKEN_LEN);
    assert_eq!(token_len("a-very-long-username-indeed", 8), MAX_TOKEN_LEN);
}

#[test]
fn generate_token_is_hex_of_expected_length() {
    let token = generate_token("Abdul", 8);
    assert_eq!(token.len(), 40);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token("Abdul", 8), generate_token("Abdul", 8));
}

// =============================================================================
// SessionRegistry
// =============================================================================

#[test]
fn issued_token_validates_from_bound_peer() {
    let registry = SessionRegistry::new();
    let session = registry.issue("Abdul", peer(5000), 8);
    assert_eq!(session.username, "Abdul");
    assert!(registry.validate(&session.token, peer(5000)));
}

#[test]
fn token_rejected_from_other_port() {
    let registry = SessionRegistry::new();
    let session = registry.issue("Abdul", peer(5000), 8);
    assert!(!registry.validate(&session.token, peer(5001)));
}

#[test]
fn token_rejected_from_other_address() {
    let registry = SessionRegistry::new();
    let session = registry.issue("Abdul", peer(5000), 8);
    let other = Binding { addr: IpAddr::from([10, 0, 0, 9]), port: 5000 };
    assert!(!registry.validate(&session.token, other));
}

#[test]
fn unknown_token_rejected() {
    let registry = SessionRegistry::new();
    assert!(!registry.validate("missing", peer(1)));
}

#[test]
fn put_records_external_token() {
    let registry = SessionRegistry::new();
    registry.put("tok", "Kuze", peer(7));
    assert!(registry.validate("tok", peer(7)));
    assert_eq!(registry.session("tok").map(|s| s.username), Some("Kuze".to_string()));
}

#[test]
fn revoke_removes_session() {
    let registry = SessionRegistry::new();
    let session = registry.issue("Abdul", peer(5000), 8);
    assert!(registry.revoke(&session.token).is_some());
    assert!(!registry.validate(&session.token, peer(5000)));
    assert_eq!(registry.len(), 0);
}

#[test]
fn find_by_peer_returns_latest_session() {
    let registry = SessionRegistry::new();
    registry.issue("Abdul", peer(5000), 8);
    std::thread::sleep(Duration::from_millis(2));
    registry.issue("Kuze", peer(5000), 8);
    registry.issue("Zeyd", peer(6000), 8);
    assert_eq!(registry.find_by_peer(peer(5000)).map(|s| s.username), Some("Kuze".to_string()));
    assert!(registry.find_by_peer(peer(7000)).is_none());
    assert_eq!(registry.len(), 3);
}

#[test]
fn sessions_on_distinct_peers_do_not_interfere() {
    let registry = SessionRegistry::new();
    let a = registry.issue("Abdul", peer(5000), 8);
    let b = registry.issue("Zeyd", peer(6000), 8);
    assert!(registry.validate(&a.token, peer(5000)));
    assert!(registry.validate(&b.token, peer(6000)));
    assert!(!registry.validate(&a.token, peer(6000)));
    assert!(!registry.validate(&b.token, peer(5000)));
}

#[test]
fn concurrent_issue_keeps_every_binding() {
    let registry = SessionRegistry::new();
    let handles: Vec<_> = (0..16u16)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || registry.issue("Abdul", peer(6000 + i), 8))
        })
        .collect();
    let sessions: Vec<Session> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(registry.len(), 16);
    for session in &sessions {
        assert!(registry.validate(&session.token, session.binding));
    }
}

// =============================================================================
// ExpiryPolicy
// =============================================================================

#[test]
fn idle_timeout_expires_stale_session() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let session = registry.issue("Abdul", peer(5000), 8);
    let later = session.last_seen + Duration::from_secs(11);
    assert!(!registry.validate_at(&session.token, peer(5000), later));
}

#[test]
fn idle_timeout_refreshes_on_use() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let session = registry.issue("Abdul", peer(5000), 8);
    let t1 = session.last_seen + Duration::from_secs(8);
    let t2 = t1 + Duration::from_secs(8);
    assert!(registry.validate_at(&session.token, peer(5000), t1));
    assert!(registry.validate_at(&session.token, peer(5000), t2));
}

#[test]
fn expired_sessions_are_removed_on_validation() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let sessions: Vec<Session> = (0..100u16).map(|i| registry.issue("Abdul", peer(7000 + i), 8)).collect();
    let an_hour_later = Instant::now() + Duration::from_secs(3600);
    for session in &sessions {
        assert!(!registry.validate_at(&session.token, session.binding, an_hour_later));
    }
    assert_eq!(registry.len(), 0);
}

#[test]
fn expired_session_from_wrong_peer_is_still_removed() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let session = registry.issue("Abdul", peer(5000), 8);
    assert!(!registry.validate_at(&session.token, peer(5001), session.last_seen + Duration::from_secs(11)));
    assert!(registry.session(&session.token).is_none());
}

#[test]
fn wrong_peer_does_not_evict_live_session() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let session = registry.issue("Abdul", peer(5000), 8);
    assert!(!registry.validate(&session.token, peer(5001)));
    assert!(registry.validate(&session.token, peer(5000)));
}

#[test]
fn issue_sweeps_expired_sessions() {
    let registry = SessionRegistry::with_expiry(IdleTimeout(Duration::from_secs(10)));
    let stale = registry.issue("Abdul", peer(5000), 8);
    let live = registry.issue_at("Kuze", peer(5001), 8, stale.last_seen + Duration::from_secs(5));
    let fresh = registry.issue_at("Zeyd", peer(5002), 8, stale.last_seen + Duration::from_secs(12));
    assert_eq!(registry.len(), 2);
    assert!(registry.session(&stale.token).is_none());
    assert!(registry.session(&live.token).is_some());
    assert!(registry.session(&fresh.token).is_some());
}

#[test]
fn never_expire_keeps_sessions_through_issue() {
    let registry = SessionRegistry::new();
    registry.issue("Abdul", peer(5000), 8);
    registry.issue("Kuze", peer(5001), 8);
    assert_eq!(registry.len(), 2);
}

#[test]
fn revoke_binding_drops_only_that_peer() {
    let registry = SessionRegistry::new();
    registry.issue("Abdul", peer(5000), 8);
    registry.issue("Kuze", peer(5000), 8);
    let other = registry.issue("Zeyd", peer(6000), 8);
    assert_eq!(registry.revoke_binding(peer(5000)), 2);
    assert_eq!(registry.revoke_binding(peer(5000)), 0);
    assert_eq!(registry.len(), 1);
    assert!(registry.validate(&other.token, peer(6000)));
}

#[test]
fn never_expire_accepts_old_sessions() {
    let registry = SessionRegistry::new();
    let session = registry.issue("Abdul", peer(5000), 8);
    let much_later = session.last_seen + Duration::from_secs(86_400);
    assert!(registry.validate_at(&session.token, peer(5000), much_later));
}

#[test]
fn binding_display_formats_socket_addr() {
    assert_eq!(peer(4444).to_string(), "127.0.0.1:4444");
}
