//! Typed records for the two response schemas.
//!
//! The schemas are never mixed in one response and are never auto-detected:
//! the endpoint that produced a payload decides which module decodes it.

pub mod search;
pub mod storefront;
