use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{users, vehicle_images, vehicles};

pub mod migrator;
pub mod repositories;

pub use repositories::user::Account;
pub use repositories::vehicle::{VehicleFilter, VehicleInput, VehiclePage, VehicleStats};

/// Persistence facade. Cloned freely; an explicit handle is threaded through
/// every operation instead of any process-wide state.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn vehicle_repo(&self) -> repositories::vehicle::VehicleRepository {
        repositories::vehicle::VehicleRepository::new(self.conn.clone())
    }

    fn vehicle_image_repo(&self) -> repositories::vehicle_image::VehicleImageRepository {
        repositories::vehicle_image::VehicleImageRepository::new(self.conn.clone())
    }

    // ---- accounts -------------------------------------------------------

    pub async fn find_active_account_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.user_repo().find_active_by_email(email).await
    }

    pub async fn get_account_by_id(&self, id: i32) -> Result<Option<Account>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn record_login_failure(
        &self,
        user: users::Model,
        max_attempts: i32,
        lockout_minutes: i64,
    ) -> Result<()> {
        self.user_repo()
            .record_login_failure(user, max_attempts, lockout_minutes)
            .await
    }

    pub async fn record_login_success(&self, user: users::Model) -> Result<Account> {
        self.user_repo().record_login_success(user).await
    }

    pub async fn create_account(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Account> {
        self.user_repo().create(email, password_hash, role).await
    }

    // ---- vehicles -------------------------------------------------------

    pub async fn list_public_vehicles(
        &self,
        filter: &VehicleFilter,
        page: u64,
        per_page: u64,
    ) -> Result<VehiclePage> {
        self.vehicle_repo().list_public(filter, page, per_page).await
    }

    pub async fn list_all_vehicles(&self, page: u64, per_page: u64) -> Result<VehiclePage> {
        self.vehicle_repo().list_all(page, per_page).await
    }

    pub async fn get_vehicle(&self, id: i32) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().get(id).await
    }

    pub async fn get_active_vehicle(&self, id: i32) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().get_active(id).await
    }

    pub async fn create_vehicle(&self, input: &VehicleInput) -> Result<vehicles::Model> {
        self.vehicle_repo().create(input).await
    }

    pub async fn update_vehicle(
        &self,
        id: i32,
        input: &VehicleInput,
    ) -> Result<Option<vehicles::Model>> {
        self.vehicle_repo().update(id, input).await
    }

    pub async fn deactivate_vehicle(&self, id: i32) -> Result<bool> {
        self.vehicle_repo().deactivate(id).await
    }

    pub async fn vehicle_stats(&self) -> Result<VehicleStats> {
        self.vehicle_repo().stats().await
    }

    // ---- vehicle images -------------------------------------------------

    pub async fn insert_vehicle_image(
        &self,
        vehicle_id: i32,
        filename: &str,
        original_filename: Option<&str>,
        file_size: i64,
        sort_index: i32,
    ) -> Result<vehicle_images::Model> {
        self.vehicle_image_repo()
            .insert(vehicle_id, filename, original_filename, file_size, sort_index)
            .await
    }

    pub async fn get_vehicle_image(&self, id: i32) -> Result<Option<vehicle_images::Model>> {
        self.vehicle_image_repo().get(id).await
    }

    pub async fn list_vehicle_images(&self, vehicle_id: i32) -> Result<Vec<vehicle_images::Model>> {
        self.vehicle_image_repo().list_for_vehicle(vehicle_id).await
    }

    pub async fn list_images_for_vehicles(
        &self,
        vehicle_ids: &[i32],
    ) -> Result<std::collections::HashMap<i32, Vec<vehicle_images::Model>>> {
        self.vehicle_image_repo()
            .list_for_vehicles(vehicle_ids)
            .await
    }

    pub async fn count_vehicle_images(&self, vehicle_id: i32) -> Result<u64> {
        self.vehicle_image_repo().count_for_vehicle(vehicle_id).await
    }

    pub async fn delete_vehicle_image(&self, id: i32) -> Result<()> {
        self.vehicle_image_repo().delete(id).await
    }

    pub async fn reorder_vehicle_images(
        &self,
        vehicle_id: i32,
        ordered_ids: &[i32],
    ) -> Result<Vec<vehicle_images::Model>> {
        self.vehicle_image_repo()
            .reorder(vehicle_id, ordered_ids)
            .await
    }
}
