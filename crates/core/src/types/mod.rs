//! Core types for Nova-Cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod id;
pub mod price;

pub use catalog::{Image, Product, Variant, VariantSnapshot};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
