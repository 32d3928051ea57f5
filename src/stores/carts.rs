use crate::{
    entities::{
        cart, cart_address, cart_payment, AddressType, Cart, CartAddress, CartItem, CartPayment,
        CartToken,
    },
    errors::ServiceError,
    stores::{CartAggregate, CartStore},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, DatabaseConnection, DatabaseTransaction, EntityTrait, ModelTrait, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// SeaORM-backed cart store. `save` writes the cart and its dependent rows as
/// one transaction; dependent rows are upserted by primary key so rows the
/// validation created in memory and rows loaded from the database take the
/// same path.
#[derive(Clone)]
pub struct SqlCartStore {
    db: Arc<DatabaseConnection>,
}

impl SqlCartStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn cart_active(model: &cart::Model) -> cart::ActiveModel {
        cart::ActiveModel {
            id: Set(model.id),
            store_code: Set(model.store_code.clone()),
            website_id: Set(model.website_id),
            customer_id: Set(model.customer_id),
            currency: Set(model.currency.clone()),
            is_virtual: Set(model.is_virtual),
            has_error: Set(model.has_error),
            force_order_place: Set(model.force_order_place),
            ext_shipping_info: Set(model.ext_shipping_info.clone()),
            reserved_order_id: Set(model.reserved_order_id.clone()),
            subtotal: Set(model.subtotal),
            tax_total: Set(model.tax_total),
            shipping_total: Set(model.shipping_total),
            discount_total: Set(model.discount_total),
            total: Set(model.total),
            status: Set(model.status),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
    }

    fn address_active(model: &cart_address::Model) -> cart_address::ActiveModel {
        cart_address::ActiveModel {
            id: Set(model.id),
            cart_id: Set(model.cart_id),
            address_type: Set(model.address_type),
            first_name: Set(model.first_name.clone()),
            last_name: Set(model.last_name.clone()),
            email: Set(model.email.clone()),
            company: Set(model.company.clone()),
            address_line_1: Set(model.address_line_1.clone()),
            address_line_2: Set(model.address_line_2.clone()),
            city: Set(model.city.clone()),
            region: Set(model.region.clone()),
            postal_code: Set(model.postal_code.clone()),
            country_code: Set(model.country_code.clone()),
            phone: Set(model.phone.clone()),
            same_as_other: Set(model.same_as_other),
            shipping_method: Set(model.shipping_method.clone()),
            payment_method: Set(model.payment_method.clone()),
            collect_shipping_rates: Set(model.collect_shipping_rates),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
    }

    fn payment_active(model: &cart_payment::Model) -> cart_payment::ActiveModel {
        cart_payment::ActiveModel {
            id: Set(model.id),
            cart_id: Set(model.cart_id),
            method: Set(model.method.clone()),
            additional_information: Set(model.additional_information.clone()),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
    }

    async fn upsert_cart(
        txn: &DatabaseTransaction,
        model: &cart::Model,
    ) -> Result<(), ServiceError> {
        Cart::insert(Self::cart_active(model))
            .on_conflict(
                OnConflict::column(cart::Column::Id)
                    .update_columns([
                        cart::Column::StoreCode,
                        cart::Column::WebsiteId,
                        cart::Column::CustomerId,
                        cart::Column::Currency,
                        cart::Column::IsVirtual,
                        cart::Column::HasError,
                        cart::Column::ForceOrderPlace,
                        cart::Column::ExtShippingInfo,
                        cart::Column::ReservedOrderId,
                        cart::Column::Subtotal,
                        cart::Column::TaxTotal,
                        cart::Column::ShippingTotal,
                        cart::Column::DiscountTotal,
                        cart::Column::Total,
                        cart::Column::Status,
                        cart::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(txn)
            .await?;
        Ok(())
    }

    async fn upsert_address(
        txn: &DatabaseTransaction,
        model: &cart_address::Model,
    ) -> Result<(), ServiceError> {
        CartAddress::insert(Self::address_active(model))
            .on_conflict(
                OnConflict::column(cart_address::Column::Id)
                    .update_columns([
                        cart_address::Column::FirstName,
                        cart_address::Column::LastName,
                        cart_address::Column::Email,
                        cart_address::Column::Company,
                        cart_address::Column::AddressLine1,
                        cart_address::Column::AddressLine2,
                        cart_address::Column::City,
                        cart_address::Column::Region,
                        cart_address::Column::PostalCode,
                        cart_address::Column::CountryCode,
                        cart_address::Column::Phone,
                        cart_address::Column::SameAsOther,
                        cart_address::Column::ShippingMethod,
                        cart_address::Column::PaymentMethod,
                        cart_address::Column::CollectShippingRates,
                        cart_address::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(txn)
            .await?;
        Ok(())
    }

    async fn upsert_payment(
        txn: &DatabaseTransaction,
        model: &cart_payment::Model,
    ) -> Result<(), ServiceError> {
        CartPayment::insert(Self::payment_active(model))
            .on_conflict(
                OnConflict::column(cart_payment::Column::Id)
                    .update_columns([
                        cart_payment::Column::Method,
                        cart_payment::Column::AdditionalInformation,
                        cart_payment::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(txn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for SqlCartStore {
    async fn resolve_token(&self, masked_token: &str) -> Result<Option<Uuid>, ServiceError> {
        let token = CartToken::find_by_id(masked_token.to_string())
            .one(&*self.db)
            .await?;
        Ok(token.map(|t| t.cart_id))
    }

    async fn load(&self, cart_id: Uuid) -> Result<Option<CartAggregate>, ServiceError> {
        let Some(cart) = Cart::find_by_id(cart_id).one(&*self.db).await? else {
            return Ok(None);
        };

        let items = cart.find_related(CartItem).all(&*self.db).await?;
        let addresses = cart.find_related(CartAddress).all(&*self.db).await?;
        let payment = cart.find_related(CartPayment).one(&*self.db).await?;

        let mut billing_address = None;
        let mut shipping_address = None;
        for address in addresses {
            match address.address_type {
                AddressType::Billing => billing_address = Some(address),
                AddressType::Shipping => shipping_address = Some(address),
            }
        }

        Ok(Some(CartAggregate {
            cart,
            items,
            billing_address,
            shipping_address,
            payment,
        }))
    }

    async fn save(&self, mut aggregate: CartAggregate) -> Result<CartAggregate, ServiceError> {
        let now = Utc::now();
        aggregate.cart.updated_at = now;

        let txn = self.db.begin().await?;

        Self::upsert_cart(&txn, &aggregate.cart).await?;

        if let Some(address) = &mut aggregate.billing_address {
            address.updated_at = now;
            Self::upsert_address(&txn, address).await?;
        }
        if let Some(address) = &mut aggregate.shipping_address {
            address.updated_at = now;
            Self::upsert_address(&txn, address).await?;
        }
        if let Some(payment) = &mut aggregate.payment {
            payment.updated_at = now;
            Self::upsert_payment(&txn, payment).await?;
        }

        txn.commit().await?;
        Ok(aggregate)
    }
}
