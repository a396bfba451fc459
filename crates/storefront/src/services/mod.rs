//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart and wishlist operations kept in sync with the remote store

pub mod cart;

pub use cart::CartService;
