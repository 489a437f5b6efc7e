//! Cross-origin access for the browser platform.

use axum::http::{HeaderValue, Method, header};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
  /// Origins allowed to call the API. `"*"` allows any origin.
  pub allowed_origins: Vec<String>,
}

impl Default for CorsSettings {
  fn default() -> Self { Self { allowed_origins: vec!["*".into()] } }
}

impl CorsSettings {
  pub fn layer(&self) -> CorsLayer {
    let origin = if self.allowed_origins.iter().any(|o| o == "*") {
      AllowOrigin::any()
    } else {
      AllowOrigin::list(self.allowed_origins.iter().filter_map(|o| {
        HeaderValue::from_str(o)
          .inspect_err(|_| warn!(origin = %o, "ignoring malformed cors origin"))
          .ok()
      }))
    };

    CorsLayer::new()
      .allow_origin(origin)
      .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
      .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
  }
}
