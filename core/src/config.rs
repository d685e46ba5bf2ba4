//! Configuration for both clients.
//!
//! Values come from serde (any format the host already uses) with defaults
//! for everything but credentials; `from_env` overrides them from
//! `BIRSE_*` variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`DirectClient`](crate::DirectClient).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectConfig {
    /// Sent as `X-API-Key` on every request.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for [`StorefrontClient`](crate::StorefrontClient).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorefrontConfig {
    /// Shop identifier sent to the image endpoints.
    #[serde(default)]
    pub shop_id: String,

    /// `*.myshopify.com` domain sent to the product endpoints.
    #[serde(default)]
    pub shop_permanent_domain: String,

    /// Hosts `upload_image` and `similar_image`.
    #[serde(default = "default_storefront_api_url")]
    pub api_base_url: String,

    /// Hosts `get_products` and `similar_products`.
    #[serde(default = "default_platform_url")]
    pub platform_base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "https://birse-image-insight.biggo.com/api".to_string() }
fn default_storefront_api_url() -> String { "https://api.biggo.com/api/v1/shopify".to_string() }
fn default_platform_url() -> String { "https://platformplugin.biggo.com/api".to_string() }
fn default_timeout_secs() -> u64 { 30 }

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            shop_id: String::new(),
            shop_permanent_domain: String::new(),
            api_base_url: default_storefront_api_url(),
            platform_base_url: default_platform_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn env_timeout() -> Option<u64> {
    std::env::var("BIRSE_TIMEOUT_SECS").ok()?.parse().ok()
}

impl DirectConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override with environment variables if present.
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("BIRSE_API_KEY") {
            self.api_key = val;
        }
        if let Ok(val) = std::env::var("BIRSE_BASE_URL") {
            self.base_url = val;
        }
        if let Some(timeout) = env_timeout() {
            self.timeout_secs = timeout;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorefrontConfig {
    pub fn new(shop_id: impl Into<String>, shop_permanent_domain: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            shop_permanent_domain: shop_permanent_domain.into(),
            ..Default::default()
        }
    }

    /// Point both services at other hosts, e.g. a local mock.
    pub fn with_base_urls(mut self, api_base_url: impl Into<String>, platform_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self.platform_base_url = platform_base_url.into();
        self
    }

    /// Override with environment variables if present.
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("BIRSE_SHOP_ID") {
            self.shop_id = val;
        }
        if let Ok(val) = std::env::var("BIRSE_SHOP_DOMAIN") {
            self.shop_permanent_domain = val;
        }
        if let Ok(val) = std::env::var("BIRSE_STOREFRONT_API_URL") {
            self.api_base_url = val;
        }
        if let Ok(val) = std::env::var("BIRSE_PLATFORM_URL") {
            self.platform_base_url = val;
        }
        if let Some(timeout) = env_timeout() {
            self.timeout_secs = timeout;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
