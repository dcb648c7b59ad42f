use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash (PHC string)
    pub password_hash: String,

    /// Open string; "admin" is the only role provisioned today.
    pub role: String,

    pub is_active: bool,

    pub created_at: String,

    pub last_login: Option<String>,

    pub failed_login_attempts: i32,

    /// RFC3339; account is locked while now < locked_until (exclusive).
    pub locked_until: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
