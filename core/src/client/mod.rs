//! The two API clients and the plumbing they share.
//!
//! # Design
//! Each operation is split into `build_*` (produces an `HttpRequest`) and
//! `parse_*` (consumes an `HttpResponse`), and a method of the same name
//! runs both around one [`Transport`] call. Hosts that do their own I/O
//! can use the halves directly.
//!
//! The clients answer different schemas and are kept apart; [`ImageSearch`]
//! is the one capability they share.

pub mod direct;
pub mod storefront;

use tracing::{debug, warn};

use crate::error::{BirseError, Result};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::image::ImageSource;

pub use direct::DirectClient;
pub use storefront::StorefrontClient;

/// Search a catalog with an image, whatever the API flavor.
pub trait ImageSearch {
    type Response;

    fn search(&self, image: ImageSource<'_>) -> Result<Self::Response>;
}

/// Execute one request; a failed round-trip becomes `Connection`.
pub(crate) fn send<T: Transport>(transport: &T, request: HttpRequest) -> Result<HttpResponse> {
    debug!(method = %request.method, url = %request.url, "sending request");
    transport.execute(request).map_err(|e| {
        warn!(error = %e, "request did not complete");
        BirseError::Connection(e.0)
    })
}

/// Map a non-2xx status to `Api`, carrying the body as the message.
pub(crate) fn check_status(response: &HttpResponse, fallback: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let body = response.body.trim();
    let message = if body.is_empty() { fallback } else { body };
    warn!(status = response.status, body = message, "API returned an error status");
    Err(BirseError::api(Some(response.status), message))
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
