use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Line-item type the provider uses for the shipping fee row
pub const SHIPPING_FEE_LINE_TYPE: &str = "shipping_fee";

/// Flat address record as delivered by the checkout provider. Every field is
/// optional on the wire; unknown fields are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayloadAddress {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization_name: Option<String>,
    pub street_address: Option<String>,
    pub street_address2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Carrier/class detail carried inside the selected shipping option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryDetails {
    pub carrier: String,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<DeliveryProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryProduct {
    pub name: Option<String>,
    pub identifier: Option<String>,
}

/// Shipping option chosen in the provider's checkout widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SelectedShippingOption {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_details: Option<DeliveryDetails>,
}

/// One order line from the provider payload. Only `type == "shipping_fee"`
/// rows are inspected here; the rest ride along for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    #[serde(rename = "type")]
    pub line_type: Option<String>,
    pub reference: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<i64>,
    pub total_amount: Option<i64>,
}

impl OrderLine {
    /// True for a shipping-fee row carrying a usable method reference
    pub fn is_shipping_fee(&self) -> bool {
        self.line_type.as_deref() == Some(SHIPPING_FEE_LINE_TYPE)
            && self
                .reference
                .as_deref()
                .is_some_and(|reference| !reference.is_empty())
    }
}

/// Incoming validation callback body.
///
/// `merchant_reference2` is the masked token the storefront handed to the
/// provider when the checkout session was created; it maps back to a local
/// cart id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CheckoutPayload {
    pub order_id: Option<String>,
    pub merchant_reference2: Option<String>,
    pub billing_address: Option<PayloadAddress>,
    pub shipping_address: Option<PayloadAddress>,
    pub selected_shipping_option: Option<SelectedShippingOption>,
    #[serde(default)]
    pub order_lines: Vec<OrderLine>,
}

impl CheckoutPayload {
    /// True when either address record is present
    pub fn has_any_address(&self) -> bool {
        self.billing_address.is_some() || self.shipping_address.is_some()
    }

    /// "Same address" determination: exact value equality of the two
    /// deserialized address records. This is deliberately a strict value
    /// comparison, not a semantic one; two addresses that differ in any field
    /// are treated as different.
    pub fn same_address(&self) -> bool {
        self.billing_address == self.shipping_address
    }

    /// First shipping-fee order line with a non-empty reference
    pub fn shipping_fee_line(&self) -> Option<&OrderLine> {
        self.order_lines.iter().find(|line| line.is_shipping_fee())
    }
}
