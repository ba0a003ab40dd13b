mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use pcshop::application::builds::CreateBuildCommand;
use pcshop::application::categories::CategoryCommand;
use pcshop::application::components::{
    CreateComponentCommand, SpecCommand, UpdateComponentCommand,
};
use pcshop::application::error::ServiceError;
use pcshop::application::pagination::PageRequest;
use pcshop::application::repos::{
    ComponentQueryFilter, ComponentSort, ComponentsWriteRepo, ReceiptQueryFilter,
    SpecQueryFilter, UpdateComponentParams,
};
use pcshop::cache::{CacheConfig, CacheError, CacheStore, EntryOptions};
use pcshop::domain::builds::BuildLine;
use pcshop::domain::entities::ComponentRecord;
use pcshop::domain::types::ReceiptStatus;
use pcshop::infra::memory::{InMemoryCatalog, receipt_for, receipt_line};

use support::{fixture, fixture_with_store, price, seed_category, seed_component, seed_component_in};

/// Writes straight to the store, the way another process sharing the database would.
async fn reprice_behind_the_cache(catalog: &InMemoryCatalog, component: &ComponentRecord, units: i64) {
    catalog
        .update_component(UpdateComponentParams {
            id: component.id,
            expected_version: component.version,
            name: component.name.clone(),
            category_id: component.category_id,
            brand: component.brand.clone(),
            price: price(units),
            stock_quantity: component.stock_quantity,
            description: component.description.clone(),
            image_url: component.image_url.clone(),
            is_active: component.is_active,
        })
        .await
        .expect("direct update");
}

#[tokio::test(start_paused = true)]
async fn external_writes_become_visible_after_the_sliding_window() {
    let fx = fixture();
    let fan = seed_component(&fx.catalog, "Fan", 15, 40).await;

    assert_eq!(fx.services.components.get(fan.id).await.expect("get").price, price(15));

    reprice_behind_the_cache(&fx.catalog, &fan, 18).await;
    assert_eq!(
        fx.services.components.get(fan.id).await.expect("stale get").price,
        price(15)
    );

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(
        fx.services.components.get(fan.id).await.expect("fresh get").price,
        price(18)
    );
}

#[tokio::test(start_paused = true)]
async fn frequent_hits_cannot_outlive_the_absolute_ttl() {
    let fx = fixture();
    let fan = seed_component(&fx.catalog, "Fan", 15, 40).await;

    fx.services.components.get(fan.id).await.expect("populate");
    reprice_behind_the_cache(&fx.catalog, &fan, 21).await;

    for _ in 0..2 {
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(
            fx.services.components.get(fan.id).await.expect("hit").price,
            price(15)
        );
    }

    tokio::time::advance(Duration::from_secs(201)).await;
    assert_eq!(
        fx.services.components.get(fan.id).await.expect("expired").price,
        price(21)
    );
}

#[tokio::test]
async fn service_writes_invalidate_detail_and_listing() {
    let fx = fixture();
    let fan = seed_component(&fx.catalog, "Fan", 15, 40).await;
    let page = PageRequest::default();
    let filter = ComponentQueryFilter::default();

    let listed = fx
        .services
        .components
        .list(&filter, ComponentSort::default(), page)
        .await
        .expect("list");
    assert_eq!(listed.total, 1);
    fx.services.components.get(fan.id).await.expect("populate detail");

    fx.services
        .components
        .update(
            &fx.admin,
            fan.id,
            UpdateComponentCommand {
                price: Some(price(12)),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    fx.services
        .components
        .create(
            &fx.admin,
            CreateComponentCommand {
                name: "Cooler".to_string(),
                category_id: None,
                brand: None,
                price: price(45),
                stock_quantity: 3,
                description: None,
                image_url: None,
                is_active: None,
            },
        )
        .await
        .expect("create");

    assert_eq!(
        fx.services.components.get(fan.id).await.expect("get").price,
        price(12)
    );
    let listed = fx
        .services
        .components
        .list(&filter, ComponentSort::default(), page)
        .await
        .expect("list");
    assert_eq!(listed.total, 2);
}

#[tokio::test]
async fn catalog_changes_reach_cached_builds() {
    let fx = fixture();
    let graphics = seed_category(&fx.catalog, "GPU").await;
    let card = seed_component_in(&fx.catalog, "RTX", Some(graphics.id), 500, 5).await;

    let build = fx
        .services
        .builds
        .create(
            &fx.customer,
            CreateBuildCommand {
                name: "Gaming".to_string(),
                description: None,
                is_public: true,
                components: vec![BuildLine::new(card.id, 2)],
            },
        )
        .await
        .expect("create build");

    let cached = fx.services.builds.get(None, build.id).await.expect("get");
    assert_eq!(cached.components[0].category_name, "GPU");
    assert_eq!(cached.total_price, price(1000));

    fx.services
        .categories
        .update(
            &fx.admin,
            graphics.id,
            CategoryCommand {
                name: "Graphics".to_string(),
                description: None,
            },
        )
        .await
        .expect("rename category");
    fx.services
        .components
        .update(
            &fx.admin,
            card.id,
            UpdateComponentCommand {
                price: Some(price(450)),
                ..Default::default()
            },
        )
        .await
        .expect("reprice");

    let fresh = fx.services.builds.get(None, build.id).await.expect("get");
    assert_eq!(fresh.components[0].category_name, "Graphics");
    assert_eq!(fresh.total_price, price(900));
}

#[tokio::test]
async fn spec_changes_refresh_cached_component_detail() {
    let fx = fixture();
    let cpu = seed_component(&fx.catalog, "CPU", 300, 5).await;
    assert!(fx.services.components.get(cpu.id).await.expect("get").specs.is_empty());

    let spec = fx
        .services
        .components
        .add_spec(
            &fx.admin,
            cpu.id,
            SpecCommand {
                spec_key: "cores".to_string(),
                spec_value: "8".to_string(),
                display_order: Some(1),
            },
        )
        .await
        .expect("add spec");
    let cached = fx.services.components.get(cpu.id).await.expect("get");
    assert_eq!(cached.specs.len(), 1);

    let for_cpu = SpecQueryFilter {
        component_id: Some(cpu.id),
        search: None,
    };
    let page = PageRequest::default();
    assert_eq!(fx.services.components.get_spec(spec.id).await.expect("spec").spec_value, "8");
    assert_eq!(
        fx.services.components.list_specs(&for_cpu, page).await.expect("specs").total,
        1
    );

    fx.services
        .components
        .update_spec(
            &fx.admin,
            spec.id,
            SpecCommand {
                spec_key: "cores".to_string(),
                spec_value: "16".to_string(),
                display_order: Some(1),
            },
        )
        .await
        .expect("update spec");
    assert_eq!(fx.services.components.get_spec(spec.id).await.expect("spec").spec_value, "16");
    let listed = fx.services.components.list_specs(&for_cpu, page).await.expect("specs");
    assert_eq!(listed.items[0].spec_value, "16");
    assert_eq!(listed.items[0].component_id, cpu.id);

    fx.services
        .components
        .remove_spec(&fx.admin, spec.id)
        .await
        .expect("remove spec");
    assert!(fx.services.components.get(cpu.id).await.expect("get").specs.is_empty());
    assert!(matches!(
        fx.services.components.get_spec(spec.id).await,
        Err(ServiceError::NotFound { .. })
    ));
    assert_eq!(
        fx.services.components.list_specs(&for_cpu, page).await.expect("specs").total,
        0
    );
}

#[tokio::test]
async fn receipt_listings_follow_status_changes() {
    let fx = fixture();
    let ssd = seed_component(&fx.catalog, "SSD", 90, 10).await;
    for owner in [fx.customer.id, Uuid::new_v4()] {
        let id = Uuid::new_v4();
        let lines = vec![receipt_line(id, &ssd, 1)];
        fx.catalog
            .insert_receipt(receipt_for(id, owner, ReceiptStatus::Pending, &lines), lines)
            .await
            .expect("seed receipt");
    }
    let page = PageRequest::default();
    let everyone = ReceiptQueryFilter::default();

    let own = fx
        .services
        .receipts
        .list(&fx.customer, &everyone, page)
        .await
        .expect("own receipts");
    assert_eq!(own.total, 1);
    assert_eq!(own.items[0].owner_id, fx.customer.id);
    assert_eq!(own.items[0].status, ReceiptStatus::Pending);

    let all = fx
        .services
        .receipts
        .list(&fx.admin, &everyone, page)
        .await
        .expect("all receipts");
    assert_eq!(all.total, 2);

    fx.services
        .receipts
        .update_status(&fx.admin, own.items[0].id, ReceiptStatus::Processing)
        .await
        .expect("status change");

    let own = fx
        .services
        .receipts
        .list(&fx.customer, &everyone, page)
        .await
        .expect("own receipts");
    assert_eq!(own.items[0].status, ReceiptStatus::Processing);
}

/// Every operation fails, as if the cache backend were unreachable.
#[derive(Default)]
struct UnreachableStore {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn get_string(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set_string(
        &self,
        _key: &str,
        _value: String,
        _options: EntryOptions,
    ) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }

    async fn remove_prefix(&self, _prefix: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn a_broken_cache_never_fails_reads_or_writes() {
    let store = Arc::new(UnreachableStore::default());
    let fx = fixture_with_store(store.clone(), CacheConfig::default());
    let fan = seed_component(&fx.catalog, "Fan", 15, 40).await;

    assert_eq!(fx.services.components.get(fan.id).await.expect("read").price, price(15));

    let updated = fx
        .services
        .components
        .update(
            &fx.admin,
            fan.id,
            UpdateComponentCommand {
                price: Some(price(16)),
                ..Default::default()
            },
        )
        .await
        .expect("write commits despite invalidation failure");
    assert_eq!(updated.price, price(16));

    assert_eq!(fx.services.components.get(fan.id).await.expect("read").price, price(16));
    assert!(store.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn disabled_cache_always_reads_through() {
    let store = Arc::new(UnreachableStore::default());
    let config = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let fx = fixture_with_store(store.clone(), config);
    let fan = seed_component(&fx.catalog, "Fan", 15, 40).await;

    fx.services.components.get(fan.id).await.expect("get");
    reprice_behind_the_cache(&fx.catalog, &fan, 19).await;

    assert_eq!(fx.services.components.get(fan.id).await.expect("get").price, price(19));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}
