use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// Lifecycle state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    /// Registered, email not yet confirmed
    Unconfirmed,
    Confirmed,
    /// Locked by an administrator
    Banned,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Unconfirmed => "unconfirmed",
            AccountState::Confirmed => "confirmed",
            AccountState::Banned => "banned",
        }
    }

    /// Unknown values are treated as banned so a corrupt row never grants access.
    pub fn from_db(s: &str) -> Self {
        match s {
            "unconfirmed" => AccountState::Unconfirmed,
            "confirmed" => AccountState::Confirmed,
            _ => AccountState::Banned,
        }
    }
}

/// Lowercase and trim an email so lookups and token subjects agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub account_state: AccountState,
}

/// Fields required to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub uuid: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    account_state: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role: UserRole::from_db(&row.role),
            account_state: AccountState::from_db(&row.account_state),
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new unconfirmed user with role `user`. Returns the user ID.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, email, password_hash, first_name, last_name, role, account_state)
             VALUES (?, ?, ?, ?, ?, 'user', 'unconfirmed')",
        )
        .bind(user.uuid)
        .bind(normalize_email(user.email))
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email, ignoring case and surrounding whitespace.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, email, password_hash, first_name, last_name, role, account_state
             FROM users WHERE email = ? COLLATE NOCASE",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, uuid, email, password_hash, first_name, last_name, role, account_state
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Mark an unconfirmed user as confirmed. Banned users stay banned.
    pub async fn confirm(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET account_state = 'confirmed' WHERE id = ? AND account_state = 'unconfirmed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the account state for a user.
    pub async fn set_state(&self, id: i64, state: AccountState) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET account_state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the role for a user.
    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
