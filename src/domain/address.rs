//! Customer address book and the shipping snapshot stored on orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Saved customer address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "Home")]
    pub label: Option<String>,
    pub recipient: String,
    pub phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    #[schema(example = "TR")]
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as submitted by clients, also used inline at checkout
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(max = 50, message = "Label is too long"))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 120, message = "Recipient is required"))]
    pub recipient: String,
    #[validate(length(max = 30, message = "Phone is too long"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Address line is required"))]
    pub line1: String,
    #[validate(length(max = 200, message = "Address line 2 is too long"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,
    #[validate(length(max = 100, message = "Region is too long"))]
    pub region: Option<String>,
    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country must be a 2-letter code"))]
    pub country: String,
}

impl AddressInput {
    /// Country codes are stored upper-case.
    pub fn normalized(mut self) -> Self {
        self.country = self.country.to_uppercase();
        self
    }
}

/// Immutable copy of the delivery address kept with the order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub recipient: String,
    pub phone: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl From<AddressInput> for ShippingAddress {
    fn from(input: AddressInput) -> Self {
        let input = input.normalized();
        Self {
            recipient: input.recipient,
            phone: input.phone,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
        }
    }
}

impl From<Address> for ShippingAddress {
    fn from(address: Address) -> Self {
        Self {
            recipient: address.recipient,
            phone: address.phone,
            line1: address.line1,
            line2: address.line2,
            city: address.city,
            region: address.region,
            postal_code: address.postal_code,
            country: address.country,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            label: Some("Home".into()),
            recipient: "Ada Lovelace".into(),
            phone: None,
            line1: "12 Garden Street".into(),
            line2: None,
            city: "Izmir".into(),
            region: None,
            postal_code: "35000".into(),
            country: "tr".into(),
        }
    }

    #[test]
    fn test_snapshot_uppercases_country() {
        let snapshot = ShippingAddress::from(input());
        assert_eq!(snapshot.country, "TR");
        assert_eq!(snapshot.recipient, "Ada Lovelace");
    }

    #[test]
    fn test_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.country = "TUR".into();
        bad.line1 = String::new();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("country"));
        assert!(errors.field_errors().contains_key("line1"));
    }
}
