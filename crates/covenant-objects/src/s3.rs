//! S3-compatible gateway on the AWS SDK. Path-style addressing, so the same
//! client works against MinIO and AWS.

use std::time::{Duration, SystemTime};

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
  Client,
  config::{Credentials, Region, timeout::TimeoutConfig},
  error::{DisplayErrorContext, SdkError},
  presigning::PresigningConfig,
  types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use covenant_core::storage::{Access, ObjectStorage};
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

/// The region S3 creates buckets in when no location constraint is sent.
const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
  /// e.g. `http://minio:9000`.
  pub endpoint:   String,
  pub region:     String,
  pub access_key: String,
  pub secret_key: String,
  /// Bound on every call the gateway makes to the service.
  pub timeout:    Duration,
}

impl S3Config {
  pub fn new(endpoint: impl Into<String>, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
    Self {
      endpoint:   endpoint.into(),
      region:     DEFAULT_REGION.to_string(),
      access_key: access_key.into(),
      secret_key: secret_key.into(),
      timeout:    Duration::from_secs(10),
    }
  }
}

/// Cheap to clone; the SDK client is `Arc`-based.
#[derive(Debug, Clone)]
pub struct S3Gateway {
  client: Client,
  region: String,
}

impl S3Gateway {
  /// Build the SDK client. Nothing is sent to the service until the first
  /// call.
  pub async fn connect(config: S3Config) -> Result<Self> {
    let endpoint = Url::parse(&config.endpoint)
      .ok()
      .filter(Url::has_host)
      .ok_or_else(|| Error::InvalidEndpoint(config.endpoint.clone()))?;

    let shared = aws_config::defaults(BehaviorVersion::latest())
      .region(Region::new(config.region.clone()))
      .endpoint_url(endpoint.as_str().trim_end_matches('/'))
      .credentials_provider(Credentials::new(
        config.access_key,
        config.secret_key,
        None,
        None,
        "covenant",
      ))
      .timeout_config(TimeoutConfig::builder().operation_timeout(config.timeout).build())
      .load()
      .await;
    let s3 = aws_sdk_s3::config::Builder::from(&shared)
      .force_path_style(true)
      .build();

    debug!(endpoint = %endpoint, region = %config.region, "object storage client ready");
    Ok(Self { client: Client::from_conf(s3), region: config.region })
  }

  /// Presign as if the clock read `start`. The trait's `presign` uses the
  /// wall clock.
  pub async fn presign_at(
    &self,
    access: Access,
    bucket: &str,
    key: &str,
    ttl: Duration,
    start: SystemTime,
  ) -> Result<String> {
    if ttl.is_zero() {
      return Err(Error::InvalidTtl(ttl));
    }
    let presigning = PresigningConfig::builder()
      .start_time(start)
      .expires_in(ttl)
      .build()
      .map_err(|_| Error::InvalidTtl(ttl))?;

    let request = match access {
      Access::Put => self
        .client
        .put_object()
        .bucket(bucket)
        .key(key)
        .presigned(presigning)
        .await
        .map_err(|e| sdk_error("PutObject", e))?,
      Access::Get => self
        .client
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(presigning)
        .await
        .map_err(|e| sdk_error("GetObject", e))?,
    };
    Ok(request.uri().to_string())
  }
}

fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> Error
where
  E: std::error::Error + 'static,
  R: std::fmt::Debug,
{
  service_error(operation, &err)
}

fn service_error(operation: &'static str, err: &impl std::error::Error) -> Error {
  Error::S3 { operation, message: DisplayErrorContext(err).to_string() }
}

impl ObjectStorage for S3Gateway {
  type Error = Error;

  async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
    match self.client.head_bucket().bucket(bucket).send().await {
      Ok(_) => return Ok(()),
      Err(e) => {
        let e = e.into_service_error();
        if !e.is_not_found() {
          return Err(service_error("HeadBucket", &e));
        }
      }
    }

    let mut create = self.client.create_bucket().bucket(bucket);
    if self.region != DEFAULT_REGION {
      create = create.create_bucket_configuration(
        CreateBucketConfiguration::builder()
          .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
          .build(),
      );
    }
    match create.send().await {
      Ok(_) => {
        info!(bucket, "created storage bucket");
        Ok(())
      }
      Err(e) => {
        let e = e.into_service_error();
        if e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists() {
          debug!(bucket, "bucket created concurrently");
          Ok(())
        } else {
          Err(service_error("CreateBucket", &e))
        }
      }
    }
  }

  async fn presign(&self, access: Access, bucket: &str, key: &str, ttl: Duration) -> Result<String> {
    self.presign_at(access, bucket, key, ttl, SystemTime::now()).await
  }

  async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
    match self.client.head_object().bucket(bucket).key(key).send().await {
      Ok(_) => Ok(true),
      Err(e) => {
        let e = e.into_service_error();
        if e.is_not_found() {
          Ok(false)
        } else {
          Err(service_error("HeadObject", &e))
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
  };

  use axum::{
    Router,
    extract::{Path, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::any,
  };
  use tokio::net::TcpListener;

  use super::*;

  /// Just enough of the S3 REST surface for bucket and object probes.
  #[derive(Default)]
  struct FakeS3 {
    buckets:         HashSet<String>,
    objects:         HashSet<(String, String)>,
    /// Answer CreateBucket with a 409 carrying this error code.
    create_conflict: Option<&'static str>,
    requests:        Vec<String>,
  }

  type Shared = Arc<Mutex<FakeS3>>;

  fn s3_error(status: StatusCode, code: &str) -> Response {
    let body = format!(
      "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
       <Error><Code>{code}</Code><Message>{code}</Message><RequestId>req-1</RequestId></Error>"
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], body).into_response()
  }

  async fn bucket_route(State(fake): State<Shared>, method: Method, Path(bucket): Path<String>) -> Response {
    let mut fake = fake.lock().unwrap();
    fake.requests.push(format!("{method} /{bucket}"));
    match method {
      Method::HEAD if fake.buckets.contains(&bucket) => StatusCode::OK.into_response(),
      Method::HEAD => StatusCode::NOT_FOUND.into_response(),
      Method::PUT => match fake.create_conflict {
        Some(code) => s3_error(StatusCode::CONFLICT, code),
        None => {
          fake.buckets.insert(bucket);
          StatusCode::OK.into_response()
        }
      },
      _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
  }

  async fn object_route(
    State(fake): State<Shared>,
    method: Method,
    Path((bucket, key)): Path<(String, String)>,
  ) -> Response {
    let mut fake = fake.lock().unwrap();
    fake.requests.push(format!("{method} /{bucket}/{key}"));
    if method != Method::HEAD {
      return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if key == "forbidden" {
      return StatusCode::FORBIDDEN.into_response();
    }
    if fake.objects.contains(&(bucket, key)) {
      StatusCode::OK.into_response()
    } else {
      StatusCode::NOT_FOUND.into_response()
    }
  }

  async fn serve(fake: FakeS3) -> (S3Gateway, Shared) {
    let shared = Arc::new(Mutex::new(fake));
    let app = Router::new()
      .route("/{bucket}", any(bucket_route))
      .route("/{bucket}/", any(bucket_route))
      .route("/{bucket}/{*key}", any(object_route))
      .with_state(Arc::clone(&shared));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let gateway = S3Gateway::connect(S3Config::new(format!("http://{addr}"), "ak", "sk"))
      .await
      .unwrap();
    (gateway, shared)
  }

  fn requests(shared: &Shared) -> Vec<String> { shared.lock().unwrap().requests.clone() }

  #[tokio::test]
  async fn endpoint_without_host_is_rejected() {
    let config = S3Config::new("not a url", "ak", "sk");
    assert!(matches!(S3Gateway::connect(config).await, Err(Error::InvalidEndpoint(_))));
  }

  #[tokio::test]
  async fn existing_bucket_is_left_alone() {
    let mut fake = FakeS3::default();
    fake.buckets.insert("contracts".into());
    let (gateway, shared) = serve(fake).await;

    gateway.ensure_bucket("contracts").await.unwrap();
    assert_eq!(requests(&shared), vec!["HEAD /contracts"]);
  }

  #[tokio::test]
  async fn missing_bucket_is_created() {
    let (gateway, shared) = serve(FakeS3::default()).await;

    gateway.ensure_bucket("contracts").await.unwrap();
    assert_eq!(requests(&shared), vec!["HEAD /contracts", "PUT /contracts"]);
    assert!(shared.lock().unwrap().buckets.contains("contracts"));
  }

  #[tokio::test]
  async fn bucket_created_concurrently_is_success() {
    for code in ["BucketAlreadyOwnedByYou", "BucketAlreadyExists"] {
      let (gateway, _) = serve(FakeS3 { create_conflict: Some(code), ..FakeS3::default() }).await;
      gateway.ensure_bucket("contracts").await.unwrap();
    }
  }

  #[tokio::test]
  async fn other_create_failures_surface() {
    let (gateway, _) = serve(FakeS3 { create_conflict: Some("OperationAborted"), ..FakeS3::default() }).await;
    assert!(matches!(
      gateway.ensure_bucket("contracts").await,
      Err(Error::S3 { operation: "CreateBucket", .. })
    ));
  }

  #[tokio::test]
  async fn object_probe_distinguishes_missing_from_failing() {
    let mut fake = FakeS3::default();
    fake.objects.insert(("contracts".into(), "id-lease.pdf".into()));
    let (gateway, _) = serve(fake).await;

    assert!(gateway.object_exists("contracts", "id-lease.pdf").await.unwrap());
    assert!(!gateway.object_exists("contracts", "other.pdf").await.unwrap());
    assert!(matches!(
      gateway.object_exists("contracts", "forbidden").await,
      Err(Error::S3 { operation: "HeadObject", .. })
    ));
  }

  #[tokio::test]
  async fn presigning_needs_no_network() {
    // Nothing listens on this port.
    let gateway = S3Gateway::connect(S3Config::new("http://127.0.0.1:9", "ak", "sk"))
      .await
      .unwrap();
    // 2024-05-01T12:00:00Z
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_714_564_800);

    let url = gateway
      .presign_at(Access::Put, "contracts", "id-lease.pdf", Duration::from_secs(900), start)
      .await
      .unwrap();
    assert!(url.starts_with("http://127.0.0.1:9/contracts/id-lease.pdf?"), "{url}");
    assert!(url.contains("X-Amz-Date=20240501T120000Z"));
    assert!(url.contains("X-Amz-Expires=900"));
    assert!(url.contains("X-Amz-Signature="));
  }

  #[tokio::test]
  async fn ttl_outside_sdk_bounds_is_rejected() {
    let gateway = S3Gateway::connect(S3Config::new("http://127.0.0.1:9", "ak", "sk"))
      .await
      .unwrap();
    for ttl in [Duration::ZERO, Duration::from_secs(8 * 24 * 60 * 60)] {
      assert!(matches!(
        gateway.presign(Access::Get, "contracts", "k", ttl).await,
        Err(Error::InvalidTtl(_))
      ));
    }
  }
}
