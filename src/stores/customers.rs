use crate::{
    entities::{customer, Customer},
    errors::ServiceError,
    stores::{CustomerStore, NewCustomer},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

/// SeaORM-backed customer store
#[derive(Clone)]
pub struct SqlCustomerStore {
    db: Arc<DatabaseConnection>,
}

impl SqlCustomerStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomerStore for SqlCustomerStore {
    async fn find_by_email(
        &self,
        website_id: i32,
        email: &str,
    ) -> Result<Option<customer::Model>, ServiceError> {
        Customer::find()
            .filter(customer::Column::WebsiteId.eq(website_id))
            .filter(customer::Column::Email.eq(email))
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    async fn create(&self, input: NewCustomer) -> Result<customer::Model, ServiceError> {
        let now = Utc::now();
        let active = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            website_id: Set(input.website_id),
            email: Set(input.email),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            status: Set(customer::CustomerStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        active.insert(&*self.db).await.map_err(Into::into)
    }
}
