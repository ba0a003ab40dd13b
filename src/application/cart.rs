//! Shopping cart.
//!
//! A cart holds at most one item per component; adding a component that is
//! already present raises that item's quantity. Every add and quantity change
//! is checked against stock and activity the same way build lines are, and like
//! builds the stock is only checked, never reserved. Items are priced at the
//! component's current price when read.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::dto::CartItemDto;
use crate::application::error::ServiceError;
use crate::application::identity::Actor;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{AddCartItemParams, CartRepo, CartWriteRepo, ComponentsRepo};
use crate::application::stock::StockValidator;
use crate::cache::{CacheAside, CacheKey, CacheNamespace, Invalidation};
use crate::domain::builds::{BuildLine, LineError, normalize_lines};
use crate::domain::entities::{CartItemRecord, ComponentRecord};
use crate::domain::pricing::line_subtotal;

#[derive(Debug, Clone, Copy)]
pub struct AddToCartCommand {
    pub component_id: Uuid,
    pub quantity: i32,
}

#[derive(Clone)]
pub struct CartService {
    reader: Arc<dyn CartRepo>,
    writer: Arc<dyn CartWriteRepo>,
    components: Arc<dyn ComponentsRepo>,
    validator: StockValidator,
    cache: CacheAside,
}

impl CartService {
    pub fn new(
        reader: Arc<dyn CartRepo>,
        writer: Arc<dyn CartWriteRepo>,
        components: Arc<dyn ComponentsRepo>,
        cache: CacheAside,
    ) -> Self {
        let validator = StockValidator::new(components.clone());
        Self {
            reader,
            writer,
            components,
            validator,
            cache,
        }
    }

    /// The caller's own cart, oldest item first.
    pub async fn list(
        &self,
        actor: &Actor,
        page: PageRequest,
    ) -> Result<Paged<CartItemDto>, ServiceError> {
        let key = CacheKey::list(
            CacheNamespace::Cart,
            &format!("owner={};{}", actor.id, page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let Paged {
                    items,
                    total,
                    page,
                    page_size,
                } = self.reader.list_cart_items(actor.id, page).await?;
                let items = self.assemble(items).await?;
                Ok(Paged {
                    items,
                    total,
                    page,
                    page_size,
                })
            })
            .await
    }

    pub async fn add(
        &self,
        actor: &Actor,
        command: AddToCartCommand,
    ) -> Result<CartItemDto, ServiceError> {
        let existing = self
            .reader
            .find_cart_item_for(actor.id, command.component_id)
            .await?;

        let mut requested = vec![BuildLine::new(command.component_id, command.quantity)];
        if let Some(item) = &existing {
            requested.push(BuildLine::new(item.component_id, item.quantity));
        }
        let line = combined_line(&requested)?;
        let component = self.checked_component(line).await?;

        let item = match existing {
            Some(item) => {
                self.writer
                    .set_cart_item_quantity(item.id, line.quantity)
                    .await?
            }
            None => {
                self.writer
                    .add_cart_item(AddCartItemParams {
                        owner_id: actor.id,
                        component_id: line.component_id,
                        quantity: line.quantity,
                    })
                    .await?
            }
        };

        info!(
            target = "pcshop::cart",
            item_id = %item.id,
            actor_id = %actor.id,
            component_id = %item.component_id,
            quantity = item.quantity,
            "cart item added"
        );

        self.invalidate().await;
        Ok(CartItemDto::from_parts(item, &component)?)
    }

    /// Replace an item's quantity. The new value is absolute, not a delta.
    pub async fn update_quantity(
        &self,
        actor: &Actor,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemDto, ServiceError> {
        let item = self.owned_item(actor, item_id).await?;
        let line = combined_line(&[BuildLine::new(item.component_id, quantity)])?;
        let component = self.checked_component(line).await?;

        let item = self.writer.set_cart_item_quantity(item_id, quantity).await?;

        info!(
            target = "pcshop::cart",
            item_id = %item_id,
            actor_id = %actor.id,
            quantity,
            "cart item quantity changed"
        );

        self.invalidate().await;
        Ok(CartItemDto::from_parts(item, &component)?)
    }

    pub async fn remove(&self, actor: &Actor, item_id: Uuid) -> Result<(), ServiceError> {
        self.owned_item(actor, item_id).await?;
        self.writer.remove_cart_item(item_id).await?;

        info!(
            target = "pcshop::cart",
            item_id = %item_id,
            actor_id = %actor.id,
            "cart item removed"
        );

        self.invalidate().await;
        Ok(())
    }

    /// Empty the caller's cart. Returns the number of items removed.
    pub async fn clear(&self, actor: &Actor) -> Result<u64, ServiceError> {
        let removed = self.writer.clear_cart(actor.id).await?;

        info!(
            target = "pcshop::cart",
            actor_id = %actor.id,
            removed,
            "cart cleared"
        );

        if removed > 0 {
            self.invalidate().await;
        }
        Ok(removed)
    }

    /// Missing items are `NotFound`; another customer's items are `Forbidden`.
    async fn owned_item(&self, actor: &Actor, id: Uuid) -> Result<CartItemRecord, ServiceError> {
        let item = self
            .reader
            .find_cart_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("cart item", id))?;

        if !actor.may_manage(item.owner_id) {
            return Err(ServiceError::forbidden(format!(
                "actor {} does not own cart item {id}",
                actor.id
            )));
        }
        Ok(item)
    }

    /// Stock, activity and price range for the quantity the item would end up with.
    async fn checked_component(&self, line: BuildLine) -> Result<ComponentRecord, ServiceError> {
        let mut found = self.validator.validate(&[line]).await?;
        let component = found
            .remove(&line.component_id)
            .ok_or_else(|| ServiceError::not_found("component", line.component_id))?;
        line_subtotal(component.price, line.quantity).map_err(|_| {
            ServiceError::validation("cart item subtotal exceeds the supported price range")
        })?;
        Ok(component)
    }

    async fn invalidate(&self) {
        self.cache
            .invalidate(&Invalidation::lists(CacheNamespace::Cart))
            .await;
    }

    /// Items whose component cannot be resolved are left out.
    async fn assemble(&self, items: Vec<CartItemRecord>) -> Result<Vec<CartItemDto>, ServiceError> {
        let mut component_ids: Vec<Uuid> = items.iter().map(|item| item.component_id).collect();
        component_ids.sort_unstable();
        component_ids.dedup();

        let components: HashMap<Uuid, ComponentRecord> = self
            .components
            .find_components(&component_ids)
            .await?
            .into_iter()
            .map(|component| (component.id, component))
            .collect();

        items
            .into_iter()
            .filter_map(|item| {
                let component = components.get(&item.component_id)?;
                Some(CartItemDto::from_parts(item, component).map_err(ServiceError::from))
            })
            .collect()
    }
}

/// Fold the requested quantities for one component into a single positive line.
fn combined_line(lines: &[BuildLine]) -> Result<BuildLine, ServiceError> {
    let merged = normalize_lines(lines).map_err(|errors| {
        ServiceError::validation_many(errors.iter().map(LineError::to_string).collect())
    })?;
    merged
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::validation("a cart item needs a component"))
}
