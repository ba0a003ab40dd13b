//! Wiring of the catalog services over one store.

use std::sync::Arc;

use crate::application::builds::BuildService;
use crate::application::cart::CartService;
use crate::application::categories::CategoryService;
use crate::application::components::ComponentService;
use crate::application::deletion::DeletionGuard;
use crate::application::receipts::ReceiptService;
use crate::application::repos::{
    BuildsRepo, BuildsWriteRepo, CartRepo, CartWriteRepo, CategoriesRepo, CategoriesWriteRepo,
    ComponentsRepo, ComponentsWriteRepo, ReceiptsRepo, ReceiptsWriteRepo,
};
use crate::application::retry::OptimisticRetry;
use crate::cache::CacheAside;

/// A store implementing every repository contract.
pub trait CatalogStore:
    ComponentsRepo
    + ComponentsWriteRepo
    + CategoriesRepo
    + CategoriesWriteRepo
    + BuildsRepo
    + BuildsWriteRepo
    + ReceiptsRepo
    + ReceiptsWriteRepo
    + CartRepo
    + CartWriteRepo
{
}

impl<T> CatalogStore for T where
    T: ComponentsRepo
        + ComponentsWriteRepo
        + CategoriesRepo
        + CategoriesWriteRepo
        + BuildsRepo
        + BuildsWriteRepo
        + ReceiptsRepo
        + ReceiptsWriteRepo
        + CartRepo
        + CartWriteRepo
{
}

#[derive(Clone)]
pub struct CatalogServices {
    pub components: Arc<ComponentService>,
    pub categories: Arc<CategoryService>,
    pub builds: Arc<BuildService>,
    pub receipts: Arc<ReceiptService>,
    pub cart: Arc<CartService>,
}

impl CatalogServices {
    pub fn new<S>(store: Arc<S>, cache: CacheAside, retry: OptimisticRetry) -> Self
    where
        S: CatalogStore + 'static,
    {
        let components: Arc<dyn ComponentsRepo> = store.clone();
        let components_write: Arc<dyn ComponentsWriteRepo> = store.clone();
        let categories: Arc<dyn CategoriesRepo> = store.clone();
        let categories_write: Arc<dyn CategoriesWriteRepo> = store.clone();
        let builds: Arc<dyn BuildsRepo> = store.clone();
        let builds_write: Arc<dyn BuildsWriteRepo> = store.clone();
        let receipts: Arc<dyn ReceiptsRepo> = store.clone();
        let receipts_write: Arc<dyn ReceiptsWriteRepo> = store.clone();
        let cart: Arc<dyn CartRepo> = store.clone();
        let cart_write: Arc<dyn CartWriteRepo> = store;

        let guard = DeletionGuard::new(
            components.clone(),
            components_write.clone(),
            receipts.clone(),
            cache.clone(),
        );

        Self {
            components: Arc::new(ComponentService::new(
                components.clone(),
                components_write,
                categories.clone(),
                guard,
                retry,
                cache.clone(),
            )),
            categories: Arc::new(CategoryService::new(
                categories.clone(),
                categories_write,
                cache.clone(),
            )),
            builds: Arc::new(BuildService::new(
                builds,
                builds_write,
                components.clone(),
                categories,
                cache.clone(),
            )),
            receipts: Arc::new(ReceiptService::new(receipts, receipts_write, cache.clone())),
            cart: Arc::new(CartService::new(cart, cart_write, components, cache)),
        }
    }
}
