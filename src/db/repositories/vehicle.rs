use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::entities::{prelude::*, vehicles};

/// Filter parameters for the public vehicle listing.
#[derive(Debug, Default, Clone)]
pub struct VehicleFilter {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub fuel_type: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Fields accepted by `upsert`-style create/update operations.
#[derive(Debug, Clone)]
pub struct VehicleInput {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub description: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    pub mileage: i32,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VehiclePage {
    pub items: Vec<vehicles::Model>,
    pub total_items: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone)]
pub struct VehicleStats {
    pub total_active: u64,
    pub total_inactive: u64,
    pub categories: Vec<(String, i64)>,
    pub makes: Vec<(String, i64)>,
}

pub struct VehicleRepository {
    conn: DatabaseConnection,
}

impl VehicleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Active vehicles only, with filters, sorting, and pagination.
    pub async fn list_public(
        &self,
        filter: &VehicleFilter,
        page: u64,
        per_page: u64,
    ) -> Result<VehiclePage> {
        let mut query = Vehicles::find().filter(vehicles::Column::IsActive.eq(true));

        if let Some(make) = &filter.make {
            query = query.filter(vehicles::Column::Make.contains(make));
        }
        if let Some(model) = &filter.model {
            query = query.filter(vehicles::Column::Model.contains(model));
        }
        if let Some(year_min) = filter.year_min {
            query = query.filter(vehicles::Column::Year.gte(year_min));
        }
        if let Some(year_max) = filter.year_max {
            query = query.filter(vehicles::Column::Year.lte(year_max));
        }
        if let Some(price_min) = filter.price_min {
            query = query.filter(vehicles::Column::Price.gte(price_min));
        }
        if let Some(price_max) = filter.price_max {
            query = query.filter(vehicles::Column::Price.lte(price_max));
        }
        if let Some(fuel) = &filter.fuel_type {
            query = query.filter(vehicles::Column::FuelType.eq(fuel));
        }
        if let Some(category) = &filter.category {
            query = query.filter(vehicles::Column::Category.eq(category));
        }
        if let Some(search) = &filter.search {
            query = query.filter(
                Condition::any()
                    .add(vehicles::Column::Make.contains(search))
                    .add(vehicles::Column::Model.contains(search))
                    .add(vehicles::Column::Description.contains(search)),
            );
        }

        let sort_column = match filter.sort_by.as_deref() {
            Some("price") => vehicles::Column::Price,
            Some("year") => vehicles::Column::Year,
            Some("mileage") => vehicles::Column::Mileage,
            Some("make") => vehicles::Column::Make,
            _ => vehicles::Column::CreatedAt,
        };
        query = if filter.sort_order.as_deref() == Some("asc") {
            query.order_by_asc(sort_column)
        } else {
            query.order_by_desc(sort_column)
        };

        let paginator = query.paginate(&self.conn, per_page);
        let counts = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(VehiclePage {
            items,
            total_items: counts.number_of_items,
            total_pages: counts.number_of_pages,
        })
    }

    /// All vehicles, inactive included, newest first.
    pub async fn list_all(&self, page: u64, per_page: u64) -> Result<VehiclePage> {
        let paginator = Vehicles::find()
            .order_by_desc(vehicles::Column::CreatedAt)
            .paginate(&self.conn, per_page);
        let counts = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(VehiclePage {
            items,
            total_items: counts.number_of_items,
            total_pages: counts.number_of_pages,
        })
    }

    pub async fn get(&self, id: i32) -> Result<Option<vehicles::Model>> {
        Ok(Vehicles::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_active(&self, id: i32) -> Result<Option<vehicles::Model>> {
        Ok(Vehicles::find_by_id(id)
            .filter(vehicles::Column::IsActive.eq(true))
            .one(&self.conn)
            .await?)
    }

    pub async fn create(&self, input: &VehicleInput) -> Result<vehicles::Model> {
        let now = Utc::now().to_rfc3339();

        let active = vehicles::ActiveModel {
            make: Set(input.make.clone()),
            model: Set(input.model.clone()),
            year: Set(input.year),
            price: Set(input.price),
            description: Set(input.description.clone()),
            fuel_type: Set(input.fuel_type.clone()),
            transmission: Set(input.transmission.clone()),
            color: Set(input.color.clone()),
            mileage: Set(input.mileage),
            category: Set(input.category.clone()),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        info!("Added vehicle: {} {}", model.make, model.model);
        Ok(model)
    }

    pub async fn update(&self, id: i32, input: &VehicleInput) -> Result<Option<vehicles::Model>> {
        let Some(existing) = Vehicles::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let mut active: vehicles::ActiveModel = existing.into();
        active.make = Set(input.make.clone());
        active.model = Set(input.model.clone());
        active.year = Set(input.year);
        active.price = Set(input.price);
        active.description = Set(input.description.clone());
        active.fuel_type = Set(input.fuel_type.clone());
        active.transmission = Set(input.transmission.clone());
        active.color = Set(input.color.clone());
        active.mileage = Set(input.mileage);
        active.category = Set(input.category.clone());
        active.updated_at = Set(Utc::now().to_rfc3339());

        Ok(Some(active.update(&self.conn).await?))
    }

    /// Soft delete: the record stays, the public surface no longer shows it.
    pub async fn deactivate(&self, id: i32) -> Result<bool> {
        let Some(existing) = Vehicles::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: vehicles::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn stats(&self) -> Result<VehicleStats> {
        let total_active = Vehicles::find()
            .filter(vehicles::Column::IsActive.eq(true))
            .count(&self.conn)
            .await?;

        let total_inactive = Vehicles::find()
            .filter(vehicles::Column::IsActive.eq(false))
            .count(&self.conn)
            .await?;

        let categories: Vec<(Option<String>, i64)> = Vehicles::find()
            .select_only()
            .column(vehicles::Column::Category)
            .column_as(Expr::col(vehicles::Column::Id).count(), "count")
            .filter(vehicles::Column::IsActive.eq(true))
            .group_by(vehicles::Column::Category)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let makes: Vec<(Option<String>, i64)> = Vehicles::find()
            .select_only()
            .column(vehicles::Column::Make)
            .column_as(Expr::col(vehicles::Column::Id).count(), "count")
            .filter(vehicles::Column::IsActive.eq(true))
            .group_by(vehicles::Column::Make)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(VehicleStats {
            total_active,
            total_inactive,
            categories: categories
                .into_iter()
                .filter_map(|(name, count)| name.map(|n| (n, count)))
                .collect(),
            makes: makes
                .into_iter()
                .filter_map(|(name, count)| name.map(|n| (n, count)))
                .collect(),
        })
    }
}
