use std::collections::HashMap;

use anyhow::anyhow;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("password hashing failed: {err}"))?;
    Ok(hash.to_string())
}

/// A stored hash that cannot be parsed never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Server-side sessions keyed by the id stored in the session cookie.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, user_id: i64, name: &str, email: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let session = Session {
            user_id,
            name: name.to_string(),
            email: email.to_string(),
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, existing| existing.expires_at > now);
        sessions.insert(id, session);
        id
    }

    /// Resolves a cookie value to a live session. Expired entries are dropped.
    pub async fn get(&self, raw_id: &str) -> Option<Session> {
        let id = Uuid::parse_str(raw_id).ok()?;

        let session = self.sessions.read().await.get(&id).cloned()?;
        if session.expires_at > Utc::now() {
            return Some(session);
        }

        self.sessions.write().await.remove(&id);
        None
    }

    pub async fn remove(&self, raw_id: &str) {
        if let Ok(id) = Uuid::parse_str(raw_id) {
            self.sessions.write().await.remove(&id);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_their_password() {
        let hash = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not-a-phc-string"));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[tokio::test]
    async fn sessions_resolve_until_removed() {
        let store = SessionStore::new(Duration::hours(1));
        let id = store.create(7, "Ada", "ada@example.com").await;

        let session = store.get(&id.to_string()).await.unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.email, "ada@example.com");

        store.remove(&id.to_string()).await;
        assert!(store.get(&id.to_string()).await.is_none());
        assert!(store.get("garbage").await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_purged() {
        let store = SessionStore::new(Duration::seconds(-1));
        let id = store.create(7, "Ada", "ada@example.com").await;

        assert!(store.get(&id.to_string()).await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
