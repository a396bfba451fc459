//! Line items and their identity.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IdError, Price, ProductId, VariantId};

/// The (product, variant) pair that makes a line item unique within a
/// collection.
///
/// A missing variant is its own value: `(p1, None)` equals only `(p1, None)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

impl ItemIdentity {
    /// Create an identity from typed IDs.
    #[must_use]
    pub const fn new(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }

    /// Parse an identity from raw strings.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if either identifier is blank or too long.
    pub fn parse(product_id: &str, variant_id: Option<&str>) -> Result<Self, IdError> {
        Ok(Self {
            product_id: ProductId::parse(product_id)?,
            variant_id: variant_id.map(VariantId::parse).transpose()?,
        })
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant_id {
            Some(variant) => write!(f, "{}/{variant}", self.product_id),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// Errors that can occur when constructing a [`LineItem`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineItemError {
    /// Quantities start at one.
    #[error("line item quantity must be at least 1")]
    ZeroQuantity,
}

/// A single product/variant entry within a cart or wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLineItem")]
pub struct LineItem {
    #[serde(flatten)]
    identity: ItemIdentity,
    quantity: u32,
    unit_price: Price,
}

#[derive(Deserialize)]
struct RawLineItem {
    product_id: ProductId,
    #[serde(default)]
    variant_id: Option<VariantId>,
    quantity: u32,
    unit_price: Price,
}

impl TryFrom<RawLineItem> for LineItem {
    type Error = LineItemError;

    fn try_from(raw: RawLineItem) -> Result<Self, Self::Error> {
        Self::new(
            ItemIdentity::new(raw.product_id, raw.variant_id),
            raw.quantity,
            raw.unit_price,
        )
    }
}

impl LineItem {
    /// Create a line item.
    ///
    /// # Errors
    ///
    /// Returns `LineItemError::ZeroQuantity` if `quantity` is 0.
    pub fn new(
        identity: ItemIdentity,
        quantity: u32,
        unit_price: Price,
    ) -> Result<Self, LineItemError> {
        if quantity == 0 {
            return Err(LineItemError::ZeroQuantity);
        }
        Ok(Self {
            identity,
            quantity,
            unit_price,
        })
    }

    /// A line item with quantity 1.
    #[must_use]
    pub const fn single(identity: ItemIdentity, unit_price: Price) -> Self {
        Self {
            identity,
            quantity: 1,
            unit_price,
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &ItemIdentity {
        &self.identity
    }

    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.identity.product_id
    }

    #[must_use]
    pub const fn variant_id(&self) -> Option<&VariantId> {
        self.identity.variant_id.as_ref()
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub const fn unit_price(&self) -> Price {
        self.unit_price
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Copy of this item with the quantity reset to one.
    #[must_use]
    pub fn with_single_quantity(&self) -> Self {
        Self::single(self.identity.clone(), self.unit_price)
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        // Callers enforce the floor of 1.
        self.quantity = quantity;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::CurrencyCode;

    fn price() -> Price {
        Price::from_cents(250, CurrencyCode::USD).unwrap()
    }

    #[test]
    fn test_identity_none_variant_is_distinct() {
        let bare = ItemIdentity::parse("p1", None).unwrap();
        let with_variant = ItemIdentity::parse("p1", Some("v1")).unwrap();
        assert_ne!(bare, with_variant);
        assert_eq!(bare, ItemIdentity::parse("p1", None).unwrap());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(ItemIdentity::parse("p1", None).unwrap().to_string(), "p1");
        assert_eq!(
            ItemIdentity::parse("p1", Some("v1")).unwrap().to_string(),
            "p1/v1"
        );
    }

    #[test]
    fn test_identity_parse_rejects_blank_variant() {
        assert!(ItemIdentity::parse("p1", Some("")).is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let identity = ItemIdentity::parse("p1", None).unwrap();
        assert_eq!(
            LineItem::new(identity, 0, price()),
            Err(LineItemError::ZeroQuantity)
        );
    }

    #[test]
    fn test_line_total() {
        let item = LineItem::new(ItemIdentity::parse("p1", None).unwrap(), 4, price()).unwrap();
        assert_eq!(item.line_total().to_string(), "$10.00");
    }

    #[test]
    fn test_serde_flattens_identity() {
        let item = LineItem::new(
            ItemIdentity::parse("p1", Some("v1")).unwrap(),
            2,
            price(),
        )
        .unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["product_id"], "p1");
        assert_eq!(json["variant_id"], "v1");
        assert_eq!(json["quantity"], 2);

        let back: LineItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_deserialize_rejects_zero_quantity() {
        let json = serde_json::json!({
            "product_id": "p1",
            "quantity": 0,
            "unit_price": {"amount": "1.00", "currency_code": "USD"}
        });
        assert!(serde_json::from_value::<LineItem>(json).is_err());
    }
}
