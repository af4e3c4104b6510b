//! Account entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Account, AccountRole};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for account_role that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRoleDb {
    Guardian,
    Student,
    Admin,
}

impl From<AccountRoleDb> for AccountRole {
    fn from(db_role: AccountRoleDb) -> Self {
        match db_role {
            AccountRoleDb::Guardian => AccountRole::Guardian,
            AccountRoleDb::Student => AccountRole::Student,
            AccountRoleDb::Admin => AccountRole::Admin,
        }
    }
}

impl From<AccountRole> for AccountRoleDb {
    fn from(role: AccountRole) -> Self {
        match role {
            AccountRole::Guardian => AccountRoleDb::Guardian,
            AccountRole::Student => AccountRoleDb::Student,
            AccountRole::Admin => AccountRoleDb::Admin,
        }
    }
}

/// Database row mapping for the accounts table.
#[derive(Debug, Clone, FromRow)]
pub struct AccountEntity {
    pub id: Uuid,
    pub school_id: Uuid,
    pub role: AccountRoleDb,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub password_hash: Option<String>,
    pub active: bool,
    pub associated_student_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountEntity> for Account {
    fn from(entity: AccountEntity) -> Self {
        Self {
            id: entity.id,
            school_id: entity.school_id,
            role: entity.role.into(),
            name: entity.name,
            last_name: entity.last_name,
            email: entity.email,
            phone: entity.phone,
            code: entity.code,
            password_hash: entity.password_hash,
            active: entity.active,
            associated_student_ids: entity.associated_student_ids,
            created_at: entity.created_at,
        }
    }
}
