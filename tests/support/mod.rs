#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use pcshop::application::catalog::CatalogServices;
use pcshop::application::identity::Actor;
use pcshop::application::repos::{
    CategoriesWriteRepo, CategoryParams, ComponentsWriteRepo, CreateComponentParams,
};
use pcshop::application::retry::OptimisticRetry;
use pcshop::cache::{CacheAside, CacheConfig, CacheStore, MemoryCacheStore};
use pcshop::domain::entities::{CategoryRecord, ComponentRecord};
use pcshop::infra::memory::InMemoryCatalog;

pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub services: CatalogServices,
    pub admin: Actor,
    pub customer: Actor,
}

pub fn fixture() -> Fixture {
    let config = CacheConfig::default();
    let store = Arc::new(MemoryCacheStore::new(&config));
    fixture_with_store(store, config)
}

pub fn fixture_with_store(store: Arc<dyn CacheStore>, config: CacheConfig) -> Fixture {
    let catalog = Arc::new(InMemoryCatalog::new());
    let cache = CacheAside::new(store, config);
    let services = CatalogServices::new(catalog.clone(), cache, OptimisticRetry::default());

    Fixture {
        catalog,
        services,
        admin: Actor::admin(Uuid::new_v4()),
        customer: Actor::customer(Uuid::new_v4()),
    }
}

pub fn price(units: i64) -> Decimal {
    Decimal::new(units * 100, 2)
}

pub async fn seed_category(catalog: &InMemoryCatalog, name: &str) -> CategoryRecord {
    catalog
        .create_category(CategoryParams {
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("seed category")
}

pub async fn seed_component(
    catalog: &InMemoryCatalog,
    name: &str,
    unit_price: i64,
    stock: i32,
) -> ComponentRecord {
    seed_component_in(catalog, name, None, unit_price, stock).await
}

pub async fn seed_component_in(
    catalog: &InMemoryCatalog,
    name: &str,
    category_id: Option<Uuid>,
    unit_price: i64,
    stock: i32,
) -> ComponentRecord {
    catalog
        .create_component(CreateComponentParams {
            name: name.to_string(),
            category_id,
            brand: Some("Acme".to_string()),
            price: price(unit_price),
            stock_quantity: stock,
            description: None,
            image_url: None,
            is_active: true,
        })
        .await
        .expect("seed component")
}
