//! Nova-Cart Core - Shared types and the collection manager.
//!
//! This crate provides the types and pure operations used across all Nova-Cart
//! components:
//! - `storefront` - Remote clients, session state and sync orchestration
//! - `cli` - Command-line driver for cart and wishlist operations
//!
//! # Architecture
//!
//! The core crate contains only types and pure transformations - no I/O, no
//! HTTP clients, no clocks other than timestamps handed in by callers. This
//! keeps the cart and wishlist rules testable without mocking anything.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers and prices, catalog records
//! - [`collection`] - Line items, cart/wishlist collections and their rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod collection;
pub mod types;

pub use collection::*;
pub use types::*;
