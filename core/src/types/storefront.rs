//! E-commerce product schema served by the storefront integration.
//!
//! # Design
//! Field names follow the wire (`availableForSale`, `compareAtPrice`, ...)
//! through serde renames so a decoded tree serializes back to the payload it
//! came from. Optional slots inside sequences (`images`, `metafields`) stay
//! `None` rather than being filtered out: callers correlate them by index.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::decode::{FromJson, Record, StringMap};
use crate::error::DecodeError;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Decimal amount exactly as sent, e.g. `"19.90"`.
    pub amount: String,
    pub currency_code: String,
}

/// One option of a variant, e.g. `Size = M`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

/// A purchasable configuration of a product.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    pub available_for_sale: bool,
    pub price: Price,
    /// `None` when the variant is not discounted. Never defaulted to `price`.
    pub compare_at_price: Option<Price>,
    pub selected_options: Vec<SelectedOption>,
}

/// The `{ "nodes": [...] }` wrapper around a product's variants.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Variants {
    pub nodes: Vec<Variant>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CollectionNode {
    pub image: Option<StringMap>,
    pub title: String,
    pub handle: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Collection {
    pub node: CollectionNode,
}

/// Shop-defined metaobject attached to a product.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetafieldReference {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// `{ "key": ..., "value": ... }` pairs, in source order.
    pub fields: Vec<StringMap>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Metafield {
    pub reference: Option<MetafieldReference>,
}

/// A product returned by a storefront search.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResult {
    pub id: String,
    pub available: bool,
    pub title: String,
    pub handle: String,
    pub images: Vec<Option<StringMap>>,
    pub price: String,
    pub currency: String,
    pub variants: Variants,
    pub collection: Vec<Collection>,
    /// One slot per requested metafield filter; unset metafields are `None`.
    pub metafields: Vec<Option<Metafield>>,
}

impl SearchResult {
    /// URL of the first present image.
    pub fn image_url(&self) -> Option<&str> {
        self.images
            .iter()
            .flatten()
            .find_map(|image| image.get("url"))
            .map(String::as_str)
    }
}

/// Response of `get_products` and `similar_products`.
///
/// `result == false` does not imply `products` is empty; check both.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResponse {
    pub result: bool,
    pub products: Vec<SearchResult>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            result: true,
            products: Vec::new(),
        }
    }
}

impl FromJson for Price {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("Price", value, path)?;
        Ok(Self {
            amount: record.required("amount")?,
            currency_code: record.required("currencyCode")?,
        })
    }
}

impl FromJson for SelectedOption {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("SelectedOption", value, path)?;
        Ok(Self {
            name: record.required("name")?,
            value: record.required("value")?,
        })
    }
}

impl FromJson for Variant {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("Variant", value, path)?;
        Ok(Self {
            id: record.required("id")?,
            available_for_sale: record.required("availableForSale")?,
            price: record.required("price")?,
            compare_at_price: record.optional("compareAtPrice")?,
            selected_options: record.sequence("selectedOptions")?,
        })
    }
}

impl FromJson for Variants {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("Variants", value, path)?;
        Ok(Self {
            nodes: record.required("nodes")?,
        })
    }
}

impl FromJson for CollectionNode {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("CollectionNode", value, path)?;
        Ok(Self {
            image: record.optional("image")?,
            title: record.required("title")?,
            handle: record.required("handle")?,
        })
    }
}

impl FromJson for Collection {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("Collection", value, path)?;
        Ok(Self {
            node: record.required("node")?,
        })
    }
}

impl FromJson for MetafieldReference {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("MetafieldReference", value, path)?;
        Ok(Self {
            id: record.required("id")?,
            kind: record.required("type")?,
            fields: record.sequence("fields")?,
        })
    }
}

impl FromJson for Metafield {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("Metafield", value, path)?;
        Ok(Self {
            reference: record.optional("reference")?,
        })
    }
}

impl FromJson for SearchResult {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("SearchResult", value, path)?;
        Ok(Self {
            id: record.required("id")?,
            available: record.required("available")?,
            title: record.required("title")?,
            handle: record.required("handle")?,
            images: record.sequence("images")?,
            price: record.required("price")?,
            currency: record.required("currency")?,
            variants: record.required("variants")?,
            collection: record.sequence("collection")?,
            metafields: record.sequence("metafields")?,
        })
    }
}

impl FromJson for SearchResponse {
    fn from_json(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let record = Record::new("SearchResponse", value, path)?;
        Ok(Self {
            result: record.required("result")?,
            products: record.sequence("products")?,
        })
    }
}

/// Image accepted by `upload_image`, referenced by later searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub image_id: String,
}

/// Region of the uploaded image to search in. Sent as `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Serialize for CropBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y, self.width, self.height].serialize(serializer)
    }
}

/// Selects a shop metafield to include in each product's `metafields`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetafieldFilter {
    pub namespace: String,
    pub key: String,
}

impl MetafieldFilter {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSearchParams {
    pub image_id: String,
    pub crop: Option<CropBox>,
    pub metafields: Option<Vec<MetafieldFilter>>,
    pub country: Option<String>,
    pub lang: Option<String>,
}

impl ImageSearchParams {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarProductParams {
    pub product_id: String,
    pub image_url: Option<String>,
    pub country: Option<String>,
    pub lang: Option<String>,
    pub metafields: Option<Vec<MetafieldFilter>>,
}

impl SimilarProductParams {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            ..Default::default()
        }
    }
}
