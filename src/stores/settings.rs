use crate::{
    config::{AppConfig, CarrierMapping, StoreSettings},
    errors::ServiceError,
    stores::SettingsStore,
};
use async_trait::async_trait;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings store backed by the application configuration: the default
/// webhook scope plus optional per-store overrides.
#[derive(Clone)]
pub struct ConfigSettingsStore {
    config: Arc<AppConfig>,
}

impl ConfigSettingsStore {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

/// Decodes the JSON-encoded carrier mapping table. A malformed value yields
/// an empty table (the resolution then falls through to the option id), the
/// same way the upstream portal export tolerates bad rows.
fn parse_carrier_mapping(raw: &str) -> Vec<CarrierMapping> {
    match serde_json::from_str::<Vec<CarrierMapping>>(raw) {
        Ok(rows) => rows,
        Err(err) => {
            warn!("Ignoring malformed carrier_mapping configuration: {}", err);
            Vec::new()
        }
    }
}

/// Decodes the JSON-encoded shipping rate table.
fn parse_shipping_rates(raw: &str) -> HashMap<String, Decimal> {
    match serde_json::from_str::<HashMap<String, Decimal>>(raw) {
        Ok(rates) => rates,
        Err(err) => {
            warn!("Ignoring malformed shipping_rates configuration: {}", err);
            HashMap::new()
        }
    }
}

#[async_trait]
impl SettingsStore for ConfigSettingsStore {
    async fn settings<'a>(&self, store: Option<&'a str>) -> Result<StoreSettings, ServiceError> {
        let base = &self.config.webhook;
        let overrides = store.and_then(|code| self.config.stores.get(code));
        if let (Some(code), None) = (store, overrides) {
            debug!(store = code, "No overrides for store; using default scope");
        }

        let failed_link = overrides
            .and_then(|o| o.failed_link.clone())
            .unwrap_or_else(|| base.failed_link.clone());

        let carrier_mappings = overrides
            .and_then(|o| o.carrier_mapping.as_deref())
            .or(base.carrier_mapping.as_deref())
            .map(parse_carrier_mapping)
            .unwrap_or_default();

        let payment_method_code = overrides
            .and_then(|o| o.payment_method_code.clone())
            .unwrap_or_else(|| base.payment_method_code.clone());

        let default_shipping_rate = Decimal::from_f64(
            overrides
                .and_then(|o| o.default_shipping_rate)
                .unwrap_or(base.default_shipping_rate),
        )
        .unwrap_or_else(|| Decimal::from(10));

        let shipping_rates = overrides
            .and_then(|o| o.shipping_rates.as_deref())
            .or(base.shipping_rates.as_deref())
            .map(parse_shipping_rates)
            .unwrap_or_default();

        Ok(StoreSettings {
            failed_link,
            carrier_mappings,
            payment_method_code,
            default_shipping_rate,
            shipping_rates,
        })
    }
}
