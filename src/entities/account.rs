use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Staff role; every account has exactly one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "cashier")]
    Cashier,
}

/// Staff account. E-mail and username are unique per role.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub role: Role,

    #[validate(length(min = 1, max = 30, message = "Full name must be 1-30 characters"))]
    pub full_name: String,

    #[validate(email(message = "Invalid e-mail address"))]
    pub email: String,

    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    pub username: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_parses_case_insensitively_and_displays_lowercase() {
        assert_eq!(Role::from_str("Manager").unwrap(), Role::Manager);
        assert_eq!(Role::from_str("cashier").unwrap(), Role::Cashier);
        assert!(Role::from_str("owner").is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
