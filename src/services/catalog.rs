use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{coin_bundle, partner_product, subscription_plan},
    errors::ServiceError,
    models::{ItemType, PurchasableItem},
};

/// Looks up the current catalog record for a purchasable item and returns
/// an immutable snapshot with an exactly-parsed price. Side-effect-free.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    async fn resolve(
        &self,
        item_type: ItemType,
        item_id: &str,
        partner_id: Option<&str>,
    ) -> Result<PurchasableItem, ServiceError>;
}

/// Parses a catalog display price ("₹499", "$4.99", "1,299") into an exact
/// decimal. Rejects empty, non-numeric and non-positive values.
pub fn parse_display_price(raw: &str) -> Result<Decimal, ServiceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    // A stripped abbreviation like "Rs." leaves a leading dot behind.
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(ServiceError::InvalidPrice(format!(
            "price '{}' has no numeric value",
            raw
        )));
    }

    let amount = Decimal::from_str(cleaned)
        .map_err(|_| ServiceError::InvalidPrice(format!("price '{}' is not numeric", raw)))?;

    if amount <= Decimal::ZERO {
        return Err(ServiceError::InvalidPrice(format!(
            "price '{}' must be positive",
            raw
        )));
    }

    Ok(amount)
}

/// Catalog resolver backed by the platform's catalog tables.
#[derive(Clone)]
pub struct SeaOrmCatalogResolver {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCatalogResolver {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogResolver for SeaOrmCatalogResolver {
    #[instrument(skip(self), fields(item_type = %item_type, item_id = %item_id))]
    async fn resolve(
        &self,
        item_type: ItemType,
        item_id: &str,
        partner_id: Option<&str>,
    ) -> Result<PurchasableItem, ServiceError> {
        let db = &*self.db;

        match item_type {
            ItemType::CoinBundle => {
                let bundle = coin_bundle::Entity::find_by_id(item_id)
                    .filter(coin_bundle::Column::IsActive.eq(true))
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;

                Ok(PurchasableItem::CoinBundle {
                    id: bundle.id,
                    name: bundle.name,
                    price: parse_display_price(&bundle.price)?,
                    coins: bundle.coins,
                })
            }
            ItemType::SubscriptionPlan => {
                let plan = subscription_plan::Entity::find_by_id(item_id)
                    .filter(subscription_plan::Column::IsActive.eq(true))
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;

                Ok(PurchasableItem::SubscriptionPlan {
                    id: plan.id,
                    plan_name: plan.plan_name,
                    term_days: plan.term_days,
                    price: parse_display_price(&plan.price)?,
                })
            }
            ItemType::PartnerProduct => {
                let mut query = partner_product::Entity::find_by_id(item_id)
                    .filter(partner_product::Column::IsActive.eq(true));
                if let Some(partner) = partner_id {
                    query = query.filter(partner_product::Column::PartnerId.eq(partner));
                }

                let product = query
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::ItemNotFound(item_id.to_string()))?;

                Ok(PurchasableItem::PartnerProduct {
                    id: product.id,
                    title: product.title,
                    price: parse_display_price(&product.price)?,
                    partner_id: product.partner_id,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_plain_and_decorated_prices() {
        assert_eq!(parse_display_price("499").unwrap(), dec!(499));
        assert_eq!(parse_display_price("₹499").unwrap(), dec!(499));
        assert_eq!(parse_display_price("$4.99").unwrap(), dec!(4.99));
        assert_eq!(parse_display_price("1,299").unwrap(), dec!(1299));
        assert_eq!(parse_display_price(" Rs. 150 ").unwrap(), dec!(150));
    }

    #[test]
    fn rejects_empty_and_non_numeric() {
        assert!(matches!(
            parse_display_price(""),
            Err(ServiceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_display_price("free"),
            Err(ServiceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_display_price("1.2.3"),
            Err(ServiceError::InvalidPrice(_))
        ));
    }

    #[test]
    fn rejects_non_positive() {
        assert!(matches!(
            parse_display_price("0"),
            Err(ServiceError::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_display_price("-50"),
            Err(ServiceError::InvalidPrice(_))
        ));
    }
}
