//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Identifiers are opaque
//! strings issued by the remote services; the only structural rule is that
//! they are not blank.

use thiserror::Error;

/// Errors that can occur when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier is empty or only whitespace.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Name of the identifier type.
        kind: &'static str,
    },
    /// The identifier is longer than the allowed maximum.
    #[error("{kind} must be at most {max} characters")]
    TooLong {
        /// Name of the identifier type.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

/// Maximum length of any identifier.
pub const MAX_ID_LENGTH: usize = 255;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(try_from = "String")]` so blank
///   identifiers are rejected at the wire boundary too
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `parse()`, `as_str()`
/// - `Display`, `FromStr` and `TryFrom<String>` implementations
///
/// # Example
///
/// ```rust
/// # use nova_cart_core::define_id;
/// define_id!(ShelfId);
/// define_id!(BinId);
///
/// let shelf = ShelfId::parse("shelf-1").unwrap();
/// let bin = BinId::parse("shelf-1").unwrap();
/// assert!(ShelfId::parse("   ").is_err());
///
/// // These are different types, so this won't compile:
/// // let _: ShelfId = bin;
/// # let _ = (shelf, bin);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an ID from a string, rejecting blank input.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty, whitespace-only, or
            /// longer than the maximum identifier length.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::types::IdError> {
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err($crate::types::IdError::Empty {
                        kind: stringify!($name),
                    });
                }
                if trimmed.len() > $crate::types::MAX_ID_LENGTH {
                    return Err($crate::types::IdError::TooLong {
                        kind: stringify!($name),
                        max: $crate::types::MAX_ID_LENGTH,
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::types::IdError;

            fn try_from(id: String) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(&id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(VariantId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id = ProductId::parse("  p1 ").unwrap();
        assert_eq!(id.as_str(), "p1");
        assert_eq!(id.to_string(), "p1");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(
            VariantId::parse(""),
            Err(IdError::Empty { kind: "VariantId" })
        );
        assert!(VariantId::parse(" \t ").is_err());
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let long = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(matches!(
            ProductId::parse(&long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_serde_is_transparent_string() {
        let id = ProductId::parse("sku-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sku-42\"");

        let back: ProductId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_blank() {
        let result: Result<ProductId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
