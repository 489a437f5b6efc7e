//! [`MemoryGateway`]: an in-process object store that issues and honours
//! its own capability URLs.
//!
//! URLs look like
//! `mem://objects/?bucket=<b>&key=<k>&method=<PUT|GET>&expires=<unix ms>&signature=<hex>`
//! and are HMAC-SHA256 signed with a per-instance random secret, so a URL
//! from one gateway is worthless to another.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use chrono::{DateTime, Utc};
use covenant_core::storage::{Access, ObjectStorage};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;
use uuid::Uuid;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// How many times each gateway operation has been invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
  pub ensure_bucket: usize,
  pub presign:       usize,
  pub object_exists: usize,
}

#[derive(Default)]
struct State {
  buckets:   HashSet<String>,
  objects:   HashMap<(String, String), usize>,
  fail_next: Option<String>,
  calls:     CallCounts,
}

#[derive(Clone)]
pub struct MemoryGateway {
  state:  Arc<Mutex<State>>,
  secret: Arc<[u8]>,
}

impl Default for MemoryGateway {
  fn default() -> Self { Self::new() }
}

impl MemoryGateway {
  pub fn new() -> Self {
    let secret: Vec<u8> = [Uuid::new_v4(), Uuid::new_v4()]
      .iter()
      .flat_map(|u| u.as_bytes().to_vec())
      .collect();
    Self {
      state:  Arc::new(Mutex::new(State::default())),
      secret: secret.into(),
    }
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Test hooks ──────────────────────────────────────────────────────────

  /// Make the next trait call fail with [`Error::Injected`].
  pub fn fail_next(&self, message: impl Into<String>) {
    self.state().fail_next = Some(message.into());
  }

  pub fn bucket_exists(&self, bucket: &str) -> bool { self.state().buckets.contains(bucket) }

  /// Place an object directly, bypassing capability URLs.
  pub fn put_object(&self, bucket: &str, key: &str) {
    let mut state = self.state();
    state.buckets.insert(bucket.to_string());
    *state
      .objects
      .entry((bucket.to_string(), key.to_string()))
      .or_default() += 1;
  }

  pub fn calls(&self) -> CallCounts { self.state().calls }

  // ── Capability URLs ─────────────────────────────────────────────────────

  /// Issue a URL as of `now`. The trait's `presign` uses the wall clock.
  pub fn presign_at(
    &self,
    access: Access,
    bucket: &str,
    key: &str,
    ttl: Duration,
    now: DateTime<Utc>,
  ) -> Result<String> {
    if ttl.is_zero() {
      return Err(Error::InvalidTtl(ttl));
    }
    let ttl_chrono = chrono::Duration::from_std(ttl).map_err(|_| Error::InvalidTtl(ttl))?;
    let expires = (now + ttl_chrono).timestamp_millis();
    let signature = hex::encode(self.sign(access.method(), bucket, key, expires)?.finalize().into_bytes());

    let mut url = Url::parse("mem://objects/").map_err(|e| Error::InvalidCapability(e.to_string()))?;
    url
      .query_pairs_mut()
      .append_pair("bucket", bucket)
      .append_pair("key", key)
      .append_pair("method", access.method())
      .append_pair("expires", &expires.to_string())
      .append_pair("signature", &signature);
    Ok(url.into())
  }

  /// Validate a URL for `access` at `now`, returning the bucket and key it
  /// grants.
  pub fn check(&self, url: &str, access: Access, now: DateTime<Utc>) -> Result<(String, String)> {
    let url = Url::parse(url).map_err(|e| Error::InvalidCapability(e.to_string()))?;
    if url.scheme() != "mem" {
      return Err(Error::InvalidCapability("not a memory gateway url".into()));
    }
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    let field = |name: &str| {
      params
        .get(name)
        .ok_or_else(|| Error::InvalidCapability(format!("missing {name}")))
    };

    let bucket = field("bucket")?;
    let key = field("key")?;
    let method = field("method")?;
    let expires: i64 = field("expires")?
      .parse()
      .map_err(|_| Error::InvalidCapability("malformed expires".into()))?;
    let signature = hex::decode(field("signature")?)
      .map_err(|_| Error::InvalidCapability("malformed signature".into()))?;

    self
      .sign(method, bucket, key, expires)?
      .verify_slice(&signature)
      .map_err(|_| Error::InvalidCapability("signature mismatch".into()))?;
    if method != access.method() {
      return Err(Error::InvalidCapability(format!(
        "url grants {method}, not {}",
        access.method()
      )));
    }
    if now.timestamp_millis() > expires {
      return Err(Error::Expired);
    }
    Ok((bucket.clone(), key.clone()))
  }

  /// Act as an HTTP client performing the PUT a URL grants.
  pub fn upload(&self, url: &str, now: DateTime<Utc>) -> Result<()> {
    let (bucket, key) = self.check(url, Access::Put, now)?;
    let mut state = self.state();
    if !state.buckets.contains(&bucket) {
      return Err(Error::UnexpectedStatus { operation: "PutObject", status: 404 });
    }
    *state.objects.entry((bucket, key)).or_default() += 1;
    Ok(())
  }

  /// Act as an HTTP client performing the GET a URL grants.
  pub fn download(&self, url: &str, now: DateTime<Utc>) -> Result<()> {
    let (bucket, key) = self.check(url, Access::Get, now)?;
    if self.state().objects.contains_key(&(bucket, key)) {
      Ok(())
    } else {
      Err(Error::UnexpectedStatus { operation: "GetObject", status: 404 })
    }
  }

  fn sign(&self, method: &str, bucket: &str, key: &str, expires: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&self.secret)
      .map_err(|e| Error::InvalidCapability(e.to_string()))?;
    mac.update(format!("{method}\n{bucket}\n{key}\n{expires}").as_bytes());
    Ok(mac)
  }

  /// Record a call and consume any injected failure.
  fn enter(&self, count: impl FnOnce(&mut CallCounts)) -> Result<()> {
    let mut state = self.state();
    count(&mut state.calls);
    match state.fail_next.take() {
      Some(message) => Err(Error::Injected(message)),
      None => Ok(()),
    }
  }
}

impl ObjectStorage for MemoryGateway {
  type Error = Error;

  async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
    self.enter(|c| c.ensure_bucket += 1)?;
    self.state().buckets.insert(bucket.to_string());
    Ok(())
  }

  async fn presign(&self, access: Access, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
    self.enter(|c| c.presign += 1)?;
    self.presign_at(access, bucket, key, ttl, Utc::now())
  }

  async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
    self.enter(|c| c.object_exists += 1)?;
    Ok(
      self
        .state()
        .objects
        .contains_key(&(bucket.to_string(), key.to_string())),
    )
  }
}
