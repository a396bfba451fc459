//! Nova-Cart storefront library.
//!
//! Remote persistence and catalog clients, the session state container, and
//! the cart service that keeps the two in sync.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod error;
pub mod remote;
pub mod services;
pub mod state;

pub use error::{AppError, Result};
