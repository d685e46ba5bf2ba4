//! Blocking client library for the BIRSE visual-search API.
//!
//! # Overview
//! Two API flavors are supported, each with its own client and response
//! schema:
//! - [`DirectClient`]: key-authenticated search by uploaded image or by
//!   URL, plus image upload, deletion and service status. Answers use the
//!   generic schema in [`types::search`].
//! - [`StorefrontClient`]: the Shopify integration. Upload an image, then
//!   search products by its id (optionally cropped), or find products
//!   similar to an existing one. Answers use the product schema in
//!   [`types::storefront`].
//!
//! # Design
//! - Responses are decoded by [`decode`], which checks every required key
//!   and reports failures with the JSON path of the offending field.
//! - Operations are split into `build_*` / `parse_*` around a
//!   [`Transport`], so the network round-trip can be executed by `ureq`
//!   (the default), by the host, or by a test double.
//! - Every failure surfaces once as a [`BirseError`]; nothing is retried.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod image;
pub mod types;

pub use client::{DirectClient, ImageSearch, StorefrontClient};
pub use config::{DirectConfig, StorefrontConfig};
pub use decode::{FromJson, JsonObject, StringMap};
pub use error::{BirseError, DecodeError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use image::ImageSource;
