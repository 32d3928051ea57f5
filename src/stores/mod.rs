use crate::{
    config::StoreSettings,
    dto::PayloadAddress,
    entities::{cart, cart_address, cart_item, cart_payment, customer, provider_order, AddressType},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub mod carts;
pub mod customers;
pub mod provider_orders;
pub mod settings;

pub use carts::SqlCartStore;
pub use customers::SqlCustomerStore;
pub use provider_orders::SqlProviderOrderStore;
pub use settings::ConfigSettingsStore;

/// Payment additional-information key: forced placement marker
pub const FORCE_ORDER_PLACE_KEY: &str = "force_order_place";
/// Payment additional-information key: the provider's order id
pub const REMOTE_ORDER_ID_KEY: &str = "remote_order_id";

/// A cart with its dependent rows, loaded once, mutated in place and saved
/// back in a single transaction.
#[derive(Debug, Clone)]
pub struct CartAggregate {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
    pub billing_address: Option<cart_address::Model>,
    pub shipping_address: Option<cart_address::Model>,
    pub payment: Option<cart_payment::Model>,
}

impl CartAggregate {
    fn blank_address(&self, address_type: AddressType) -> cart_address::Model {
        let now = Utc::now();
        cart_address::Model {
            id: Uuid::new_v4(),
            cart_id: self.cart.id,
            address_type,
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            company: None,
            address_line_1: String::new(),
            address_line_2: None,
            city: String::new(),
            region: String::new(),
            postal_code: String::new(),
            country_code: String::new(),
            phone: None,
            same_as_other: false,
            shipping_method: None,
            payment_method: None,
            collect_shipping_rates: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn address_slot(&mut self, address_type: AddressType) -> &mut Option<cart_address::Model> {
        match address_type {
            AddressType::Billing => &mut self.billing_address,
            AddressType::Shipping => &mut self.shipping_address,
        }
    }

    /// Returns the address row of the given kind, creating an empty one bound
    /// to this cart when absent.
    pub fn address_mut(&mut self, address_type: AddressType) -> &mut cart_address::Model {
        let blank = self.blank_address(address_type);
        self.address_slot(address_type).get_or_insert_with(|| blank)
    }

    /// Merges the fields present in a payload address onto the cart address
    /// of the given kind. Absent payload fields leave the existing values
    /// untouched.
    pub fn merge_address(
        &mut self,
        address_type: AddressType,
        payload: &PayloadAddress,
        same_as_other: bool,
    ) {
        let address = self.address_mut(address_type);
        if let Some(given_name) = &payload.given_name {
            address.first_name = given_name.clone();
        }
        if let Some(family_name) = &payload.family_name {
            address.last_name = family_name.clone();
        }
        if payload.email.is_some() {
            address.email = payload.email.clone();
        }
        if payload.organization_name.is_some() {
            address.company = payload.organization_name.clone();
        }
        if let Some(street) = &payload.street_address {
            address.address_line_1 = street.clone();
        }
        if payload.street_address2.is_some() {
            address.address_line_2 = payload.street_address2.clone();
        }
        if let Some(city) = &payload.city {
            address.city = city.clone();
        }
        if let Some(region) = &payload.region {
            address.region = region.clone();
        }
        if let Some(postal_code) = &payload.postal_code {
            address.postal_code = postal_code.clone();
        }
        if let Some(country) = &payload.country {
            address.country_code = country.to_uppercase();
        }
        if payload.phone.is_some() {
            address.phone = payload.phone.clone();
        }
        address.same_as_other = same_as_other;
    }

    /// Applies a normalized `carrier_method` code to the shipping address and
    /// flags it for rate recomputation.
    pub fn apply_shipping_method(&mut self, method_code: &str) {
        let address = self.address_mut(AddressType::Shipping);
        address.shipping_method = Some(method_code.to_string());
        address.collect_shipping_rates = true;
    }

    /// Mirrors the chosen payment method onto the shipping address, where the
    /// downstream order pipeline reads it.
    pub fn set_shipping_payment_method(&mut self, method: &str) {
        let address = self.address_mut(AddressType::Shipping);
        address.payment_method = Some(method.to_string());
    }

    /// Imports the provider payment method onto the cart's payment record and
    /// stashes the forced-placement flag and remote order id as metadata.
    pub fn import_payment(&mut self, method: &str, remote_order_id: &str) {
        let now = Utc::now();
        let additional_information = serde_json::json!({
            FORCE_ORDER_PLACE_KEY: true,
            REMOTE_ORDER_ID_KEY: remote_order_id,
        });

        match &mut self.payment {
            Some(payment) => {
                payment.method = method.to_string();
                payment.additional_information = additional_information;
                payment.updated_at = now;
            }
            None => {
                self.payment = Some(cart_payment::Model {
                    id: Uuid::new_v4(),
                    cart_id: self.cart.id,
                    method: method.to_string(),
                    additional_information,
                    created_at: now,
                    updated_at: now,
                });
            }
        }
    }

    /// Reserves a local order id; a no-op when one is already reserved.
    pub fn reserve_order_id(&mut self) {
        if self.cart.reserved_order_id.is_none() {
            let id = Uuid::new_v4();
            self.cart.reserved_order_id =
                Some(format!("ORD-{}", id.to_string()[..8].to_uppercase()));
        }
    }

    /// Recomputes the shipping total and grand total after a shipping method
    /// change.
    pub fn collect_totals(&mut self, shipping_total: rust_decimal::Decimal) {
        self.cart.shipping_total = shipping_total;
        self.cart.total = self.cart.subtotal + self.cart.tax_total + self.cart.shipping_total
            - self.cart.discount_total;
        if let Some(address) = &mut self.shipping_address {
            address.collect_shipping_rates = false;
        }
    }
}

/// Fields required to create a customer on the fly during validation
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub website_id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Cart persistence: token resolution, aggregate load, aggregate save.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Resolves a masked token to a cart id
    async fn resolve_token(&self, masked_token: &str) -> Result<Option<Uuid>, ServiceError>;

    /// Loads a cart with its items, addresses and payment record
    async fn load(&self, cart_id: Uuid) -> Result<Option<CartAggregate>, ServiceError>;

    /// Persists the aggregate in one transaction
    async fn save(&self, aggregate: CartAggregate) -> Result<CartAggregate, ServiceError>;
}

/// Customer lookup and creation, scoped by website.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_by_email(
        &self,
        website_id: i32,
        email: &str,
    ) -> Result<Option<customer::Model>, ServiceError>;

    async fn create(&self, input: NewCustomer) -> Result<customer::Model, ServiceError>;
}

/// Cross-reference persistence for provider order ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderOrderStore: Send + Sync {
    async fn record(
        &self,
        provider_order_id: &str,
        reservation_id: &str,
    ) -> Result<provider_order::Model, ServiceError>;
}

/// Store-scoped configuration lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn settings<'a>(&self, store: Option<&'a str>) -> Result<StoreSettings, ServiceError>;
}
