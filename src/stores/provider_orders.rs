use crate::{
    entities::provider_order,
    errors::ServiceError,
    stores::ProviderOrderStore,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

/// SeaORM-backed cross-reference store
#[derive(Clone)]
pub struct SqlProviderOrderStore {
    db: Arc<DatabaseConnection>,
}

impl SqlProviderOrderStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProviderOrderStore for SqlProviderOrderStore {
    async fn record(
        &self,
        provider_order_id: &str,
        reservation_id: &str,
    ) -> Result<provider_order::Model, ServiceError> {
        let active = provider_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_order_id: Set(provider_order_id.to_string()),
            reservation_id: Set(reservation_id.to_string()),
            created_at: Set(Utc::now()),
        };

        active.insert(&*self.db).await.map_err(Into::into)
    }
}
