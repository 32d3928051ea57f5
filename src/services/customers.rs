use crate::{
    dto::PayloadAddress,
    entities::customer,
    errors::ServiceError,
    events::{Event, EventSender},
    stores::{CustomerStore, NewCustomer},
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Looks customers up by email within a website scope, creating them on a
/// miss so a guest checkout can be attached to an account. No credentials are
/// provisioned here; the account is created bare and the storefront's normal
/// password-reset flow takes it from there.
#[derive(Clone)]
pub struct CustomerService {
    customers: Arc<dyn CustomerStore>,
    event_sender: EventSender,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerStore>, event_sender: EventSender) -> Self {
        Self {
            customers,
            event_sender,
        }
    }

    /// Returns the customer for the billing email within the website scope,
    /// creating one from the billing name fields when none exists.
    #[instrument(skip(self, billing))]
    pub async fn find_or_create(
        &self,
        website_id: i32,
        billing: &PayloadAddress,
    ) -> Result<customer::Model, ServiceError> {
        let email = billing
            .email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                ServiceError::AddressError(
                    "billing address carries no email to attach a customer".to_string(),
                )
            })?;

        if let Some(existing) = self.customers.find_by_email(website_id, email).await? {
            return Ok(existing);
        }

        let created = self
            .customers
            .create(NewCustomer {
                website_id,
                email: email.to_string(),
                first_name: billing.given_name.clone().unwrap_or_default(),
                last_name: billing.family_name.clone().unwrap_or_default(),
            })
            .await?;

        info!(customer_id = %created.id, website_id, "Created customer for guest checkout");
        self.event_sender
            .send_or_log(Event::CustomerCreated(created.id))
            .await;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CustomerStatus;
    use crate::stores::MockCustomerStore;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use uuid::Uuid;

    fn event_sender() -> (EventSender, tokio::sync::mpsc::Receiver<Event>) {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        (EventSender::new(tx), rx)
    }

    fn customer_model(website_id: i32, email: &str) -> customer::Model {
        let now = Utc::now();
        customer::Model {
            id: Uuid::new_v4(),
            website_id,
            email: email.into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            status: CustomerStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn billing(email: Option<&str>) -> PayloadAddress {
        PayloadAddress {
            given_name: Some("Jane".into()),
            family_name: Some("Doe".into()),
            email: email.map(Into::into),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn existing_customer_is_reused() {
        let mut store = MockCustomerStore::new();
        let existing = customer_model(1, "jane@example.com");
        let returned = existing.clone();
        store
            .expect_find_by_email()
            .withf(|website_id, email| *website_id == 1 && email == "jane@example.com")
            .return_once(move |_, _| Ok(Some(returned)));
        store.expect_create().never();

        let (events, _rx) = event_sender();
        let service = CustomerService::new(Arc::new(store), events);
        let customer = service
            .find_or_create(1, &billing(Some("jane@example.com")))
            .await
            .unwrap();
        assert_eq!(customer.id, existing.id);
    }

    #[tokio::test]
    async fn missing_customer_is_created_from_billing_fields() {
        let mut store = MockCustomerStore::new();
        store
            .expect_find_by_email()
            .return_once(|_, _| Ok(None));
        store
            .expect_create()
            .withf(|input| {
                input.website_id == 2
                    && input.email == "jane@example.com"
                    && input.first_name == "Jane"
                    && input.last_name == "Doe"
            })
            .return_once(|input| {
                let mut model = customer_model(input.website_id, &input.email);
                model.first_name = input.first_name;
                model.last_name = input.last_name;
                Ok(model)
            });

        let (events, mut rx) = event_sender();
        let service = CustomerService::new(Arc::new(store), events);
        let customer = service
            .find_or_create(2, &billing(Some("jane@example.com")))
            .await
            .unwrap();
        assert_eq!(customer.website_id, 2);

        assert_matches!(rx.recv().await, Some(Event::CustomerCreated(id)) if id == customer.id);
    }

    #[tokio::test]
    async fn missing_email_is_an_address_error() {
        let store = MockCustomerStore::new();
        let (events, _rx) = event_sender();
        let service = CustomerService::new(Arc::new(store), events);

        let err = service.find_or_create(1, &billing(None)).await.unwrap_err();
        assert_matches!(err, ServiceError::AddressError(_));
    }
}
