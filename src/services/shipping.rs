//! Shipping-method resolution and reconciliation.
//!
//! The provider reports the chosen shipping in one of two shapes: a
//! structured `selected_shipping_option` (carrier + class, from the
//! provider's shipping gateway) or a `shipping_fee` order line whose
//! `reference` already is a local method code. The resolved code must end up
//! in the `carrier_method` composite form the rate system expects.

use crate::config::{CarrierMapping, StoreSettings};
use crate::dto::{CheckoutPayload, DeliveryDetails};
use rust_decimal::Decimal;

/// Composite key the mapping table is indexed by: `carrier + "_" + class`.
pub fn carrier_class_key(details: &DeliveryDetails) -> String {
    format!("{}_{}", details.carrier, details.class)
}

/// Looks a carrier/class key up in the store's configured mapping table.
pub fn lookup_carrier_mapping<'a>(
    mappings: &'a [CarrierMapping],
    carrier_class: &str,
) -> Option<&'a str> {
    mappings
        .iter()
        .find(|mapping| mapping.kss_carrier == carrier_class)
        .map(|mapping| mapping.shipping_method.as_str())
}

/// Resolves a shipping-method code from the payload, first match wins:
///
/// 1. `selected_shipping_option`: the mapping-table entry for its
///    carrier/class key, falling back to the option's raw `id` when the
///    lookup yields nothing (also when the option carries no delivery
///    details at all).
/// 2. The first `shipping_fee` order line with a non-empty `reference`.
///
/// Returns `None` when neither source yields a code; the caller then leaves
/// the shipping method unset and skips rate collection.
pub fn resolve_method_code(
    payload: &CheckoutPayload,
    mappings: &[CarrierMapping],
) -> Option<String> {
    if let Some(option) = &payload.selected_shipping_option {
        let mapped = option
            .delivery_details
            .as_ref()
            .and_then(|details| lookup_carrier_mapping(mappings, &carrier_class_key(details)));
        return Some(
            mapped
                .map(str::to_string)
                .unwrap_or_else(|| option.id.clone()),
        );
    }

    payload
        .shipping_fee_line()
        .and_then(|line| line.reference.clone())
}

/// Normalizes a method code into the `carrier_method` composite form: a code
/// without an underscore is doubled, `"flatrate"` becoming
/// `"flatrate_flatrate"`. Codes already carrying a separator pass through
/// unchanged.
pub fn normalize_method_code(code: &str) -> String {
    if code.contains('_') {
        code.to_string()
    } else {
        format!("{}_{}", code, code)
    }
}

/// Flat rate for a method code from the store's rate table, falling back to
/// the store default.
pub fn rate_for_method(settings: &StoreSettings, method_code: &str) -> Decimal {
    settings
        .shipping_rates
        .get(method_code)
        .copied()
        .unwrap_or(settings.default_shipping_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{OrderLine, SelectedShippingOption};
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn mappings() -> Vec<CarrierMapping> {
        vec![
            CarrierMapping {
                kss_carrier: "dhl_express".into(),
                shipping_method: "flatrate".into(),
            },
            CarrierMapping {
                kss_carrier: "postnord_home".into(),
                shipping_method: "tablerate_bestway".into(),
            },
        ]
    }

    fn option(carrier: &str, class: &str, id: &str) -> SelectedShippingOption {
        SelectedShippingOption {
            id: id.into(),
            name: None,
            price: None,
            tax_amount: None,
            tax_rate: None,
            delivery_details: Some(DeliveryDetails {
                carrier: carrier.into(),
                class: class.into(),
                product: None,
            }),
        }
    }

    #[test]
    fn mapped_carrier_class_resolves_to_configured_method() {
        let payload = CheckoutPayload {
            selected_shipping_option: Some(option("dhl", "express", "X1")),
            ..Default::default()
        };
        assert_eq!(
            resolve_method_code(&payload, &mappings()).as_deref(),
            Some("flatrate")
        );
    }

    #[test]
    fn unmapped_carrier_class_falls_back_to_option_id() {
        let payload = CheckoutPayload {
            selected_shipping_option: Some(option("ups", "ground", "X1")),
            ..Default::default()
        };
        assert_eq!(
            resolve_method_code(&payload, &mappings()).as_deref(),
            Some("X1")
        );
    }

    #[test]
    fn option_without_delivery_details_falls_back_to_option_id() {
        let payload = CheckoutPayload {
            selected_shipping_option: Some(SelectedShippingOption {
                id: "X9".into(),
                name: None,
                price: None,
                tax_amount: None,
                tax_rate: None,
                delivery_details: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            resolve_method_code(&payload, &mappings()).as_deref(),
            Some("X9")
        );
    }

    #[test]
    fn shipping_fee_line_is_used_when_no_option_is_selected() {
        let payload = CheckoutPayload {
            order_lines: vec![OrderLine {
                line_type: Some("shipping_fee".into()),
                reference: Some("tablerate_bestway".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            resolve_method_code(&payload, &mappings()).as_deref(),
            Some("tablerate_bestway")
        );
    }

    #[test]
    fn selected_option_wins_over_order_lines() {
        let payload = CheckoutPayload {
            selected_shipping_option: Some(option("dhl", "express", "X1")),
            order_lines: vec![OrderLine {
                line_type: Some("shipping_fee".into()),
                reference: Some("tablerate_bestway".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            resolve_method_code(&payload, &mappings()).as_deref(),
            Some("flatrate")
        );
    }

    #[test]
    fn no_source_yields_none() {
        let payload = CheckoutPayload {
            order_lines: vec![OrderLine {
                line_type: Some("physical".into()),
                reference: Some("SKU-1".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(resolve_method_code(&payload, &mappings()), None);
    }

    #[test_case("flatrate", "flatrate_flatrate"; "bare code is doubled")]
    #[test_case("tablerate_bestway", "tablerate_bestway"; "composite code passes through")]
    #[test_case("ups", "ups_ups"; "short carrier code is doubled")]
    #[test_case("a_b_c", "a_b_c"; "extra separators are left alone")]
    fn normalization(input: &str, expected: &str) {
        assert_eq!(normalize_method_code(input), expected);
    }

    #[test]
    fn rate_lookup_falls_back_to_store_default() {
        let mut settings = StoreSettings::default();
        settings.default_shipping_rate = dec!(10.00);
        settings
            .shipping_rates
            .insert("flatrate_flatrate".into(), dec!(4.90));

        assert_eq!(rate_for_method(&settings, "flatrate_flatrate"), dec!(4.90));
        assert_eq!(rate_for_method(&settings, "ups_ups"), dec!(10.00));
    }
}
