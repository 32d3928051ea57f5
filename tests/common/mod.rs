use checkout_sync_api::{
    app_router,
    config::{AppConfig, WebhookConfig},
    entities::{self, cart, cart_item, cart_token, CartStatus},
    events::EventSender,
    AppState,
};
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Schema, Set};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Test application: in-memory SQLite with the schema created from the
/// entities, the real stores and services wired through [`AppState`], and the
/// full router.
pub struct TestApp {
    pub state: AppState,
    pub router: axum::Router,
}

pub const FAILED_LINK: &str = "https://shop.example.com/checkout/failed";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "info".into(),
        log_json: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 5,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
        request_timeout_secs: 30,
        event_channel_capacity: 64,
        webhook: WebhookConfig {
            failed_link: FAILED_LINK.into(),
            carrier_mapping: Some(
                r#"[{"kss_carrier":"dhl_express","shipping_method":"flatrate"}]"#.into(),
            ),
            secret: None,
            tolerance_secs: 300,
            payment_method_code: "kco".into(),
            default_shipping_rate: 10.0,
            shipping_rates: Some(r#"{"flatrate_flatrate": "4.90"}"#.into()),
        },
        stores: HashMap::new(),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory sqlite");
        create_schema(&db).await;

        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let state = AppState::new(Arc::new(db), Arc::new(cfg), EventSender::new(tx));
        let router = app_router().with_state(state.clone());

        Self { state, router }
    }
}

async fn create_schema(db: &DatabaseConnection) {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = [
        schema.create_table_from_entity(entities::Cart),
        schema.create_table_from_entity(entities::CartItem),
        schema.create_table_from_entity(entities::CartAddress),
        schema.create_table_from_entity(entities::CartPayment),
        schema.create_table_from_entity(entities::CartToken),
        schema.create_table_from_entity(entities::Customer),
        schema.create_table_from_entity(entities::ProviderOrder),
    ];
    for statement in statements {
        db.execute(backend.build(&statement))
            .await
            .expect("failed to create table");
    }
}

/// Options for seeding a cart
#[derive(Default)]
pub struct CartSeed {
    pub is_virtual: bool,
    pub has_error: bool,
    pub with_items: bool,
    pub customer_id: Option<Uuid>,
}

pub async fn seed_cart(app: &TestApp, seed: CartSeed) -> Uuid {
    let cart_id = Uuid::new_v4();
    let now = Utc::now();

    let cart = cart::ActiveModel {
        id: Set(cart_id),
        store_code: Set("default".into()),
        website_id: Set(1),
        customer_id: Set(seed.customer_id),
        currency: Set("SEK".into()),
        is_virtual: Set(seed.is_virtual),
        has_error: Set(seed.has_error),
        force_order_place: Set(false),
        ext_shipping_info: Set(None),
        reserved_order_id: Set(None),
        subtotal: Set(dec!(100.00)),
        tax_total: Set(dec!(25.00)),
        shipping_total: Set(dec!(0.00)),
        discount_total: Set(dec!(0.00)),
        total: Set(dec!(125.00)),
        status: Set(CartStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    };
    cart.insert(&*app.state.db)
        .await
        .expect("failed to seed cart");

    if seed.with_items {
        let item = cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart_id),
            sku: Set("SKU-1".into()),
            name: Set("Widget".into()),
            quantity: Set(2),
            unit_price: Set(dec!(50.00)),
            line_total: Set(dec!(100.00)),
            discount_amount: Set(dec!(0.00)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        item.insert(&*app.state.db)
            .await
            .expect("failed to seed cart item");
    }

    cart_id
}

pub async fn seed_token(app: &TestApp, masked_id: &str, cart_id: Uuid) {
    let token = cart_token::ActiveModel {
        masked_id: Set(masked_id.to_string()),
        cart_id: Set(cart_id),
        created_at: Set(Utc::now()),
    };
    token
        .insert(&*app.state.db)
        .await
        .expect("failed to seed cart token");
}
