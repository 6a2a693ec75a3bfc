//! One-time passwords for e-mail verified registration.
//!
//! A pending registration is parked under a key scoped by role and e-mail until
//! the code is confirmed, the entry expires, or too many wrong codes are tried.
//! Attempts are counted apart from the entry so concurrent guesses each get a
//! distinct number.

use crate::{config::OtpConfig, entities::account::Role, errors::ServiceError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Registration details held until the OTP is verified. The password is
/// already hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpEntry {
    pub code: String,
    pub registration: PendingRegistration,
    pub expires_at: DateTime<Utc>,
}

impl OtpEntry {
    pub fn new(code: String, registration: PendingRegistration, ttl_secs: u64) -> Self {
        Self {
            code,
            registration,
            expires_at: Utc::now() + ChronoDuration::seconds(ttl_secs as i64),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Whole seconds left, at least one while not expired.
    fn remaining_secs(&self) -> u64 {
        (self.expires_at - Utc::now()).num_seconds().max(1) as u64
    }
}

/// Storage for pending registrations. Expired entries are never returned.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store `entry` and reset its attempt counter.
    async fn put(&self, key: &str, entry: &OtpEntry) -> Result<(), ServiceError>;
    async fn get(&self, key: &str) -> Result<Option<OtpEntry>, ServiceError>;
    /// Drop the entry and its attempt counter.
    async fn remove(&self, key: &str) -> Result<(), ServiceError>;
    /// Atomically bump the attempt counter for `key`, returning the new count.
    async fn record_attempt(&self, key: &str, entry: &OtpEntry) -> Result<u32, ServiceError>;
}

fn attempts_key(key: &str) -> String {
    format!("{key}:attempts")
}

/// Process-local store; expired entries are dropped when touched or purged.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOtpStore {
    entries: Arc<DashMap<String, OtpEntry>>,
    attempts: Arc<DashMap<String, u32>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        self.attempts.retain(|key, _| self.entries.contains_key(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, key: &str, entry: &OtpEntry) -> Result<(), ServiceError> {
        self.purge_expired();
        self.entries.insert(key.to_string(), entry.clone());
        self.attempts.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<OtpEntry>, ServiceError> {
        let entry = self.entries.get(key).map(|e| e.value().clone());
        match entry {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                self.attempts.remove(key);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.remove(key);
        self.attempts.remove(key);
        Ok(())
    }

    async fn record_attempt(&self, key: &str, _entry: &OtpEntry) -> Result<u32, ServiceError> {
        let mut count = self.attempts.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

/// Redis-backed store; entries carry a server-side TTL.
#[derive(Clone)]
pub struct RedisOtpStore {
    client: redis::Client,
}

impl RedisOtpStore {
    pub fn new(redis_url: &str) -> Result<Self, ServiceError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, key: &str, entry: &OtpEntry) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(entry)?;
        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(entry.remaining_secs())
            .ignore()
            .cmd("DEL")
            .arg(attempts_key(key))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<OtpEntry>, ServiceError> {
        let mut conn = self.client.get_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let entry: OtpEntry = serde_json::from_str(&raw)?;
        Ok((!entry.is_expired()).then_some(entry))
    }

    async fn remove(&self, key: &str) -> Result<(), ServiceError> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .arg(attempts_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn record_attempt(&self, key: &str, entry: &OtpEntry) -> Result<u32, ServiceError> {
        let counter = attempts_key(key);
        let mut conn = self.client.get_async_connection().await?;
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&counter)
            .cmd("EXPIRE")
            .arg(&counter)
            .arg(entry.remaining_secs())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}

/// Pick the backend named in config.
pub fn build_otp_store(config: &OtpConfig, redis_url: &str) -> Result<Arc<dyn OtpStore>, ServiceError> {
    match config.backend.as_str() {
        "redis" => {
            info!("Using Redis OTP store");
            Ok(Arc::new(RedisOtpStore::new(redis_url)?))
        }
        _ => {
            debug!("Using in-memory OTP store");
            Ok(Arc::new(InMemoryOtpStore::new()))
        }
    }
}

/// `<namespace>:<role>:<lower-cased email>`
pub fn otp_key(namespace: &str, role: Role, email: &str) -> String {
    format!("{namespace}:{role}:{}", email.trim().to_lowercase())
}

/// Random numeric code of `length` digits; leading zeros allowed.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
