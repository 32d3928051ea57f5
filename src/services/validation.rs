use crate::{
    config::StoreSettings,
    dto::CheckoutPayload,
    entities::AddressType,
    errors::ServiceError,
    events::{Event, EventSender},
    services::{customers::CustomerService, shipping},
    stores::{CartAggregate, CartStore, ProviderOrderStore},
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

/// Reconciles a provider's completed checkout with the local cart: resolves
/// the cart from the masked token, copies addresses and the chosen shipping
/// method onto it, marks it for forced placement, persists it once, and
/// records the provider-order cross-reference.
///
/// All collaborators come in through the constructor; nothing here touches
/// globals.
pub struct OrderValidationService {
    carts: Arc<dyn CartStore>,
    customers: CustomerService,
    provider_orders: Arc<dyn ProviderOrderStore>,
    event_sender: EventSender,
    /// Per-cart locks serializing concurrent deliveries for the same cart
    cart_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl OrderValidationService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        customers: CustomerService,
        provider_orders: Arc<dyn ProviderOrderStore>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            carts,
            customers,
            provider_orders,
            event_sender,
            cart_locks: DashMap::new(),
        }
    }

    fn cart_lock(&self, cart_id: Uuid) -> Arc<Mutex<()>> {
        self.cart_locks
            .entry(cart_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs the full reconciliation for one callback payload. Every error is
    /// returned typed; the HTTP layer collapses them all into the flat
    /// failure redirect.
    #[instrument(skip(self, payload, settings))]
    pub async fn validate(
        &self,
        payload: &CheckoutPayload,
        settings: &StoreSettings,
    ) -> Result<(), ServiceError> {
        let provider_order_id = payload
            .order_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidRequest("payload carries no order_id".to_string())
            })?;
        let token = payload
            .merchant_reference2
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidRequest(
                    "payload carries no merchant_reference2 token".to_string(),
                )
            })?;

        let cart_id = self
            .carts
            .resolve_token(token)
            .await?
            .ok_or_else(|| ServiceError::CartNotFound(format!("no cart for token {}", token)))?;

        let lock = self.cart_lock(cart_id);
        let _guard = lock.lock().await;

        let mut aggregate = self
            .carts
            .load(cart_id)
            .await?
            .ok_or_else(|| ServiceError::CartNotFound(cart_id.to_string()))?;

        if aggregate.items.is_empty() {
            return Err(ServiceError::EmptyCart(cart_id));
        }
        if aggregate.cart.has_error {
            return Err(ServiceError::ErroredCart(cart_id));
        }

        if !aggregate.cart.is_virtual {
            self.update_order_addresses(payload, &mut aggregate).await?;

            if let Some(method_code) = self.resolve_shipping(payload, settings, &mut aggregate)? {
                let method_code = shipping::normalize_method_code(&method_code);
                info!(cart_id = %cart_id, method_code = %method_code, "Applying shipping method");
                aggregate.apply_shipping_method(&method_code);
                let rate = shipping::rate_for_method(settings, &method_code);
                aggregate.collect_totals(rate);
            }
        }

        aggregate.cart.force_order_place = true;
        aggregate.set_shipping_payment_method(&settings.payment_method_code);
        aggregate.import_payment(&settings.payment_method_code, provider_order_id);
        aggregate.reserve_order_id();

        let aggregate = self.carts.save(aggregate).await?;
        self.event_sender
            .send_or_log(Event::CartUpdated(cart_id))
            .await;

        self.provider_orders
            .record(provider_order_id, provider_order_id)
            .await?;
        self.event_sender
            .send_or_log(Event::ProviderOrderLinked {
                provider_order_id: provider_order_id.to_string(),
            })
            .await;

        info!(
            cart_id = %cart_id,
            provider_order_id = %provider_order_id,
            reserved_order_id = ?aggregate.cart.reserved_order_id,
            "Cart validated for forced placement"
        );
        self.event_sender
            .send_or_log(Event::CartValidated {
                cart_id,
                provider_order_id: provider_order_id.to_string(),
            })
            .await;

        Ok(())
    }

    /// Merges payload addresses onto the cart and makes sure the cart has a
    /// customer. The "same address" flag is the strict value equality of the
    /// two payload records.
    async fn update_order_addresses(
        &self,
        payload: &CheckoutPayload,
        aggregate: &mut CartAggregate,
    ) -> Result<(), ServiceError> {
        if !payload.has_any_address() {
            return Ok(());
        }

        let same_as_other = payload.same_address();

        if aggregate.cart.customer_id.is_none() {
            let billing = payload.billing_address.as_ref().ok_or_else(|| {
                ServiceError::AddressError(
                    "guest cart needs a billing address to attach a customer".to_string(),
                )
            })?;
            let customer = self
                .customers
                .find_or_create(aggregate.cart.website_id, billing)
                .await?;
            aggregate.cart.customer_id = Some(customer.id);
        }

        if let Some(billing) = &payload.billing_address {
            aggregate.merge_address(AddressType::Billing, billing, same_as_other);
        }
        if let Some(shipping) = &payload.shipping_address {
            aggregate.merge_address(AddressType::Shipping, shipping, same_as_other);
        }

        Ok(())
    }

    /// Resolves the shipping-method code and stashes the raw selected option
    /// on the cart for the downstream order pipeline.
    fn resolve_shipping(
        &self,
        payload: &CheckoutPayload,
        settings: &StoreSettings,
        aggregate: &mut CartAggregate,
    ) -> Result<Option<String>, ServiceError> {
        if let Some(option) = &payload.selected_shipping_option {
            aggregate.cart.ext_shipping_info = Some(serde_json::to_string(option)?);
        }
        Ok(shipping::resolve_method_code(
            payload,
            &settings.carrier_mappings,
        ))
    }
}
