use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::entities::{prelude::*, vehicle_images};

pub struct VehicleImageRepository {
    conn: DatabaseConnection,
}

impl VehicleImageRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(
        &self,
        vehicle_id: i32,
        filename: &str,
        original_filename: Option<&str>,
        file_size: i64,
        sort_index: i32,
    ) -> Result<vehicle_images::Model> {
        let active = vehicle_images::ActiveModel {
            vehicle_id: Set(vehicle_id),
            filename: Set(filename.to_string()),
            original_filename: Set(original_filename.map(str::to_string)),
            file_size: Set(file_size),
            mime_type: Set("image/jpeg".to_string()),
            sort_index: Set(sort_index),
            created_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };

        Ok(active.insert(&self.conn).await?)
    }

    pub async fn get(&self, id: i32) -> Result<Option<vehicle_images::Model>> {
        Ok(VehicleImages::find_by_id(id).one(&self.conn).await?)
    }

    /// Gallery order: sort_index ascending, insertion order as tie-break.
    pub async fn list_for_vehicle(&self, vehicle_id: i32) -> Result<Vec<vehicle_images::Model>> {
        Ok(VehicleImages::find()
            .filter(vehicle_images::Column::VehicleId.eq(vehicle_id))
            .order_by_asc(vehicle_images::Column::SortIndex)
            .order_by_asc(vehicle_images::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// Gallery contents for a batch of vehicles in one query, grouped by
    /// vehicle and sorted into display order.
    pub async fn list_for_vehicles(
        &self,
        vehicle_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<vehicle_images::Model>>> {
        if vehicle_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = VehicleImages::find()
            .filter(vehicle_images::Column::VehicleId.is_in(vehicle_ids.iter().copied()))
            .order_by_asc(vehicle_images::Column::SortIndex)
            .order_by_asc(vehicle_images::Column::Id)
            .all(&self.conn)
            .await?;

        let mut grouped: HashMap<i32, Vec<vehicle_images::Model>> = HashMap::new();
        for row in rows {
            grouped.entry(row.vehicle_id).or_default().push(row);
        }
        Ok(grouped)
    }

    pub async fn count_for_vehicle(&self, vehicle_id: i32) -> Result<u64> {
        Ok(VehicleImages::find()
            .filter(vehicle_images::Column::VehicleId.eq(vehicle_id))
            .count(&self.conn)
            .await?)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        VehicleImages::delete_by_id(id).exec(&self.conn).await?;
        Ok(())
    }

    /// Reassign sort indices from the given id order. Ids that do not belong
    /// to the vehicle are skipped; images not named keep their relative order
    /// after the named ones. Indices come out dense either way.
    pub async fn reorder(
        &self,
        vehicle_id: i32,
        ordered_ids: &[i32],
    ) -> Result<Vec<vehicle_images::Model>> {
        let existing = self.list_for_vehicle(vehicle_id).await?;

        let mut ordered: Vec<&vehicle_images::Model> = Vec::with_capacity(existing.len());
        for id in ordered_ids {
            if let Some(image) = existing.iter().find(|img| img.id == *id) {
                if !ordered.iter().any(|img| img.id == *id) {
                    ordered.push(image);
                }
            }
        }
        for image in &existing {
            if !ordered.iter().any(|img| img.id == image.id) {
                ordered.push(image);
            }
        }

        let txn = self.conn.begin().await?;
        for (index, image) in ordered.iter().enumerate() {
            let mut active: vehicle_images::ActiveModel = (*image).clone().into();
            active.sort_index = Set(i32::try_from(index).unwrap_or(i32::MAX));
            active.update(&txn).await?;
        }
        txn.commit().await?;

        self.list_for_vehicle(vehicle_id).await
    }
}
