mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use pcshop::application::builds::CreateBuildCommand;
use pcshop::application::components::{
    ComponentService, CreateComponentCommand, SpecCommand, UpdateComponentCommand,
};
use pcshop::application::deletion::DeletionGuard;
use pcshop::application::error::ServiceError;
use pcshop::application::repos::{
    ComponentsRepo, ComponentsWriteRepo, CreateComponentParams, CreateSpecParams, RepoError,
    UpdateComponentParams, UpdateSpecParams,
};
use pcshop::application::retry::OptimisticRetry;
use pcshop::cache::{CacheAside, CacheConfig, MemoryCacheStore};
use pcshop::domain::builds::BuildLine;
use pcshop::domain::entities::{ComponentRecord, ComponentSpecRecord};
use pcshop::domain::pricing::max_price;
use pcshop::domain::types::ReceiptStatus;
use pcshop::infra::memory::{InMemoryCatalog, receipt_for, receipt_line};

use support::{fixture, price, seed_category, seed_component};

#[tokio::test]
async fn component_on_an_open_receipt_cannot_be_deleted_until_it_closes() {
    let fx = fixture();
    let gpu = seed_component(&fx.catalog, "GPU", 700, 4).await;

    let receipt_id = Uuid::new_v4();
    let lines = vec![receipt_line(receipt_id, &gpu, 1)];
    fx.catalog
        .insert_receipt(
            receipt_for(receipt_id, fx.customer.id, ReceiptStatus::Pending, &lines),
            lines,
        )
        .await
        .expect("seed receipt");

    let err = fx
        .services
        .components
        .delete(&fx.admin, gpu.id)
        .await
        .expect_err("open receipt blocks delete");
    assert!(matches!(err, ServiceError::Conflict(_)));

    fx.services
        .receipts
        .update_status(&fx.admin, receipt_id, ReceiptStatus::Delivered)
        .await
        .expect("deliver receipt");

    fx.services
        .components
        .delete(&fx.admin, gpu.id)
        .await
        .expect("delete after delivery");

    let component = fx.services.components.get(gpu.id).await.expect("row kept");
    assert!(!component.is_active);

    let receipt = fx
        .services
        .receipts
        .get(&fx.customer, receipt_id)
        .await
        .expect("receipt still resolves");
    assert_eq!(receipt.lines.len(), 1);
}

#[tokio::test]
async fn component_used_by_a_build_cannot_be_deleted() {
    let fx = fixture();
    let cpu = seed_component(&fx.catalog, "CPU", 250, 3).await;
    fx.services
        .builds
        .create(
            &fx.customer,
            CreateBuildCommand {
                name: "Office".to_string(),
                description: None,
                is_public: true,
                components: vec![BuildLine::new(cpu.id, 1)],
            },
        )
        .await
        .expect("create build");

    let err = fx
        .services
        .components
        .delete(&fx.admin, cpu.id)
        .await
        .expect_err("build reference blocks delete");

    assert!(matches!(err, ServiceError::Conflict(ref message) if message.contains("1 build")));
    assert!(fx.services.components.get(cpu.id).await.expect("get").is_active);
}

#[tokio::test]
async fn terminal_receipts_do_not_move_again() {
    let fx = fixture();
    let ssd = seed_component(&fx.catalog, "SSD", 90, 10).await;
    let receipt_id = Uuid::new_v4();
    let lines = vec![receipt_line(receipt_id, &ssd, 2)];
    fx.catalog
        .insert_receipt(
            receipt_for(receipt_id, fx.customer.id, ReceiptStatus::Cancelled, &lines),
            lines,
        )
        .await
        .expect("seed receipt");

    let err = fx
        .services
        .receipts
        .update_status(&fx.admin, receipt_id, ReceiptStatus::Shipped)
        .await
        .expect_err("terminal receipt");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = fx
        .services
        .receipts
        .update_status(&fx.customer, receipt_id, ReceiptStatus::Pending)
        .await
        .expect_err("owner may not change status");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn customers_cannot_edit_the_catalog() {
    let fx = fixture();

    let err = fx
        .services
        .components
        .create(
            &fx.customer,
            CreateComponentCommand {
                name: "Case".to_string(),
                category_id: None,
                brand: None,
                price: price(60),
                stock_quantity: 5,
                description: None,
                image_url: None,
                is_active: None,
            },
        )
        .await
        .expect_err("customer create");

    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn create_reports_all_field_problems_together() {
    let fx = fixture();

    let err = fx
        .services
        .components
        .create(
            &fx.admin,
            CreateComponentCommand {
                name: "  ".to_string(),
                category_id: Some(Uuid::new_v4()),
                brand: None,
                price: Decimal::new(-1, 0),
                stock_quantity: -3,
                description: None,
                image_url: None,
                is_active: None,
            },
        )
        .await
        .expect_err("invalid component");

    assert_eq!(err.messages().len(), 4, "{:?}", err.messages());
}

#[tokio::test]
async fn unstorable_prices_are_rejected_and_the_largest_one_still_prices_builds() {
    let fx = fixture();
    let command = |price: Decimal| CreateComponentCommand {
        name: "Vault".to_string(),
        category_id: None,
        brand: None,
        price,
        stock_quantity: 10,
        description: None,
        image_url: None,
        is_active: None,
    };

    for price in [Decimal::MAX, Decimal::new(1_999, 3)] {
        let err = fx
            .services
            .components
            .create(&fx.admin, command(price))
            .await
            .expect_err("price out of range");
        assert!(matches!(err, ServiceError::Validation { .. }), "{err:?}");
    }

    let top = fx
        .services
        .components
        .create(&fx.admin, command(max_price()))
        .await
        .expect("largest storable price");
    let build = fx
        .services
        .builds
        .create(
            &fx.customer,
            CreateBuildCommand {
                name: "Vault rig".to_string(),
                description: None,
                is_public: true,
                components: vec![BuildLine::new(top.id, 2)],
            },
        )
        .await
        .expect("build priced without overflow");

    assert_eq!(build.total_price, max_price() * Decimal::from(2));
}

#[tokio::test]
async fn update_clears_nullable_fields_and_bumps_version() {
    let fx = fixture();
    let storage = seed_category(&fx.catalog, "Storage").await;
    let created = fx
        .services
        .components
        .create(
            &fx.admin,
            CreateComponentCommand {
                name: "NVMe 2TB".to_string(),
                category_id: Some(storage.id),
                brand: Some("Acme".to_string()),
                price: price(150),
                stock_quantity: 8,
                description: Some("fast".to_string()),
                image_url: None,
                is_active: None,
            },
        )
        .await
        .expect("create");
    assert_eq!(created.category_name, "Storage");

    let updated = fx
        .services
        .components
        .update(
            &fx.admin,
            created.id,
            UpdateComponentCommand {
                price: Some(price(140)),
                category_id: Some(None),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.price, price(140));
    assert_eq!(updated.category_name, "Uncategorized");
    assert_eq!(updated.description, None);
    assert_eq!(updated.brand.as_deref(), Some("Acme"));
    assert_eq!(updated.version, created.version + 1);
}

#[tokio::test]
async fn specs_are_embedded_in_display_order() {
    let fx = fixture();
    let cpu = seed_component(&fx.catalog, "CPU", 300, 5).await;

    for (key, value, order) in [("cache", "32MB", None), ("cores", "8", Some(1)), ("boost", "5GHz", Some(2))] {
        fx.services
            .components
            .add_spec(
                &fx.admin,
                cpu.id,
                SpecCommand {
                    spec_key: key.to_string(),
                    spec_value: value.to_string(),
                    display_order: order,
                },
            )
            .await
            .expect("add spec");
    }

    let err = fx
        .services
        .components
        .add_spec(
            &fx.admin,
            cpu.id,
            SpecCommand {
                spec_key: "cores".to_string(),
                spec_value: "16".to_string(),
                display_order: None,
            },
        )
        .await
        .expect_err("duplicate key");
    assert!(matches!(err, ServiceError::Conflict(_)));

    let keys: Vec<String> = fx
        .services
        .components
        .get(cpu.id)
        .await
        .expect("get")
        .specs
        .into_iter()
        .map(|spec| spec.spec_key)
        .collect();
    assert_eq!(keys, ["cores", "boost", "cache"]);
}

/// Delegates to the in-memory store but reports a version conflict for the
/// first `conflicts` update attempts.
struct ContendedWriter {
    inner: Arc<InMemoryCatalog>,
    conflicts: u32,
    attempts: AtomicU32,
}

#[async_trait]
impl ComponentsWriteRepo for ContendedWriter {
    async fn create_component(
        &self,
        params: CreateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        self.inner.create_component(params).await
    }

    async fn update_component(
        &self,
        params: UpdateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.conflicts {
            return Err(RepoError::VersionConflict {
                expected: params.expected_version,
            });
        }
        self.inner.update_component(params).await
    }

    async fn deactivate_component(&self, id: Uuid) -> Result<ComponentRecord, RepoError> {
        self.inner.deactivate_component(id).await
    }

    async fn create_spec(
        &self,
        params: CreateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        self.inner.create_spec(params).await
    }

    async fn update_spec(
        &self,
        params: UpdateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        self.inner.update_spec(params).await
    }

    async fn delete_spec(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_spec(id).await
    }
}

fn contended_service(
    catalog: Arc<InMemoryCatalog>,
    conflicts: u32,
) -> (ComponentService, Arc<ContendedWriter>) {
    let config = CacheConfig::default();
    let cache = CacheAside::new(Arc::new(MemoryCacheStore::new(&config)), config);
    let writer = Arc::new(ContendedWriter {
        inner: catalog.clone(),
        conflicts,
        attempts: AtomicU32::new(0),
    });
    let reader: Arc<dyn ComponentsRepo> = catalog.clone();
    let guard = DeletionGuard::new(reader.clone(), writer.clone(), catalog.clone(), cache.clone());
    let service = ComponentService::new(
        reader,
        writer.clone(),
        catalog,
        guard,
        OptimisticRetry::new(3),
        cache,
    );
    (service, writer)
}

#[tokio::test]
async fn update_retries_through_transient_conflicts() {
    let fx = fixture();
    let psu = seed_component(&fx.catalog, "PSU", 120, 6).await;
    let (service, writer) = contended_service(fx.catalog.clone(), 2);

    let updated = service
        .update(
            &fx.admin,
            psu.id,
            UpdateComponentCommand {
                stock_quantity: Some(2),
                ..Default::default()
            },
        )
        .await
        .expect("third attempt wins");

    assert_eq!(updated.stock_quantity, 2);
    assert_eq!(writer.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn update_gives_up_after_the_retry_budget() {
    let fx = fixture();
    let psu = seed_component(&fx.catalog, "PSU", 120, 6).await;
    let (service, writer) = contended_service(fx.catalog.clone(), u32::MAX);

    let err = service
        .update(
            &fx.admin,
            psu.id,
            UpdateComponentCommand {
                price: Some(price(99)),
                ..Default::default()
            },
        )
        .await
        .expect_err("budget exhausted");

    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(writer.attempts.load(Ordering::SeqCst), 3);

    let stored = fx.catalog.find_component(psu.id).await.expect("find").expect("row");
    assert_eq!(stored.price, price(120));
}
