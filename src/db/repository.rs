//! Database repository for users and document collections.
//!
//! Uses prepared statements and transactions for data integrity.

use chrono::Utc;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{ApprovalStatus, Entity, NewUser, Role, UserAccount};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, approval_status, \
     is_approved, is_active, created_at, last_login, updated_by, updated_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Start a transaction spanning several document writes.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    // ==================== USER OPERATIONS ====================

    /// Insert a user. Duplicate usernames or emails are validation errors.
    pub async fn create_user(&self, user: &NewUser) -> Result<UserAccount, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let approved = user.approval_status == ApprovalStatus::Approved;

        let result = sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, approval_status, is_approved, is_active, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.approval_status.as_str())
        .bind(approved as i32)
        .bind(user.is_active as i32)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::Validation(
                    "Username or email already exists".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(UserAccount {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            approval_status: user.approval_status,
            is_approved: approved,
            is_active: user.is_active,
            created_at: now,
            last_login: None,
            updated_by: None,
            updated_at: None,
        })
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<UserAccount>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn admin_exists(&self) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE role = ?")
            .bind(Role::Admin.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn record_login(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set the approval state; `is_approved` and `is_active` follow it in the same statement.
    pub async fn set_approval(
        &self,
        id: &str,
        status: ApprovalStatus,
        actor: &str,
    ) -> Result<UserAccount, AppError> {
        let approved = status == ApprovalStatus::Approved;

        let result = sqlx::query(
            "UPDATE users SET approval_status = ?, is_approved = ?, is_active = ?, updated_by = ?, updated_at = ? WHERE id = ?"
        )
        .bind(status.as_str())
        .bind(approved as i32)
        .bind(approved as i32)
        .bind(actor)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    // ==================== DOCUMENT OPERATIONS ====================

    /// List every document of a collection in insertion order.
    pub async fn list_documents<T: Entity>(&self) -> Result<Vec<T>, AppError> {
        let rows = sqlx::query("SELECT id, body FROM documents WHERE collection = ? ORDER BY rowid")
            .bind(T::COLLECTION)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| decode_document(row.get("id"), row.get("body")))
            .collect()
    }

    pub async fn get_document<T: Entity>(&self, id: &str) -> Result<Option<T>, AppError> {
        let row = sqlx::query("SELECT id, body FROM documents WHERE collection = ? AND id = ?")
            .bind(T::COLLECTION)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_document(row.get("id"), row.get("body")))
            .transpose()
    }

    pub async fn find_by_natural_key<T: Entity>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self.pool.acquire().await?;
        find_by_key_in(&mut conn, key).await
    }

    pub async fn insert_document<T: Entity>(&self, record: &T) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_document_in(&mut conn, record).await
    }

    /// Overwrite an existing document. Fails with `NotFound` when the id is unknown.
    pub async fn replace_document<T: Entity>(&self, record: &T) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        if !replace_document_in(&mut conn, record).await? {
            return Err(AppError::NotFound(format!(
                "{} {} not found",
                T::LABEL,
                record.id()
            )));
        }
        Ok(())
    }

    pub async fn delete_document<T: Entity>(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(T::COLLECTION)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", T::LABEL, id)));
        }

        Ok(())
    }

    /// Delete several documents at once, returning how many were removed.
    pub async fn delete_documents<T: Entity>(&self, ids: &[String]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for id in ids {
            deleted += sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(T::COLLECTION)
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }
}

// Connection-level helpers, shared by pool methods and import transactions

pub async fn find_by_key_in<T: Entity>(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<Option<T>, AppError> {
    let row = sqlx::query(
        "SELECT id, body FROM documents WHERE collection = ? AND natural_key = ? ORDER BY rowid LIMIT 1",
    )
    .bind(T::COLLECTION)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| decode_document(row.get("id"), row.get("body")))
        .transpose()
}

pub async fn key_exists_in<T: Entity>(
    conn: &mut SqliteConnection,
    key: &str,
) -> Result<bool, AppError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM documents WHERE collection = ? AND natural_key = ?",
    )
    .bind(T::COLLECTION)
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get::<i64, _>("n") > 0)
}

pub async fn insert_document_in<T: Entity>(
    conn: &mut SqliteConnection,
    record: &T,
) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    let body = encode_document(record)?;

    sqlx::query(
        "INSERT INTO documents (collection, id, natural_key, body, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(T::COLLECTION)
    .bind(record.id())
    .bind(record.natural_key())
    .bind(&body)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns false when no document with the record's id exists.
pub async fn replace_document_in<T: Entity>(
    conn: &mut SqliteConnection,
    record: &T,
) -> Result<bool, AppError> {
    let body = encode_document(record)?;

    let result = sqlx::query(
        "UPDATE documents SET natural_key = ?, body = ?, updated_at = ? WHERE collection = ? AND id = ?",
    )
    .bind(record.natural_key())
    .bind(&body)
    .bind(Utc::now().to_rfc3339())
    .bind(T::COLLECTION)
    .bind(record.id())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

// Helper functions for row conversion

fn encode_document<T: Entity>(record: &T) -> Result<String, AppError> {
    serde_json::to_string(record).map_err(|e| {
        AppError::Internal(format!("Failed to encode {} {}: {}", T::LABEL, record.id(), e))
    })
}

fn decode_document<T: Entity>(id: String, body: String) -> Result<T, AppError> {
    serde_json::from_str(&body).map_err(|e| {
        tracing::error!("Corrupt {} document {}: {}", T::COLLECTION, id, e);
        AppError::Storage(format!("Stored {} {} is unreadable", T::LABEL, id))
    })
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserAccount, AppError> {
    let role: String = row.get("role");
    let status: String = row.get("approval_status");
    let is_approved: i32 = row.get("is_approved");
    let is_active: i32 = row.get("is_active");

    Ok(UserAccount {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role)
            .ok_or_else(|| AppError::Storage(format!("Unknown role '{}' in users table", role)))?,
        approval_status: ApprovalStatus::from_str(&status).ok_or_else(|| {
            AppError::Storage(format!("Unknown approval status '{}' in users table", status))
        })?,
        is_approved: is_approved != 0,
        is_active: is_active != 0,
        created_at: row.get("created_at"),
        last_login: row.get("last_login"),
        updated_by: row.get("updated_by"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{stamp_new, RseActivity};
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (Repository::new(pool), dir)
    }

    fn activity(promotion: &str, hours: f64) -> RseActivity {
        let mut record = RseActivity {
            year: 2024,
            promotion: promotion.into(),
            semester: "S1".into(),
            activity_type: "Projet".into(),
            lecture_hours: hours,
            ..Default::default()
        };
        stamp_new(&mut record, "tester");
        record
    }

    #[tokio::test]
    async fn test_insert_then_fetch_by_natural_key() {
        let (repo, _dir) = repo().await;
        let record = activity("FIE3", 4.0);
        repo.insert_document(&record).await.unwrap();

        let key = record.natural_key().unwrap();
        let fetched: RseActivity = repo.find_by_natural_key(&key).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let by_id: RseActivity = repo.get_document(&record.id).await.unwrap().unwrap();
        assert_eq!(by_id, record);
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order_and_delete() {
        let (repo, _dir) = repo().await;
        let a = activity("FIE1", 1.0);
        let b = activity("FIE2", 2.0);
        repo.insert_document(&a).await.unwrap();
        repo.insert_document(&b).await.unwrap();

        let listed: Vec<RseActivity> = repo.list_documents().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);

        repo.delete_document::<RseActivity>(&a.id).await.unwrap();
        assert!(matches!(
            repo.delete_document::<RseActivity>(&a.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(repo.list_documents::<RseActivity>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_unknown_document_is_not_found() {
        let (repo, _dir) = repo().await;
        assert!(matches!(
            repo.replace_document(&activity("FIE1", 1.0)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_user_uniqueness_and_approval() {
        let (repo, _dir) = repo().await;
        let new_user = NewUser {
            username: "alice".into(),
            email: "alice@example.org".into(),
            password_hash: "hash".into(),
            role: Role::Secretary,
            approval_status: ApprovalStatus::Pending,
            is_active: false,
        };

        let user = repo.create_user(&new_user).await.unwrap();
        assert!(!user.is_approved && !user.is_active);
        assert!(matches!(
            repo.create_user(&new_user).await,
            Err(AppError::Validation(_))
        ));
        assert!(repo.email_taken("alice@example.org").await.unwrap());
        assert!(!repo.admin_exists().await.unwrap());

        let approved = repo
            .set_approval(&user.id, ApprovalStatus::Approved, "admin")
            .await
            .unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
        assert!(approved.is_approved);
        assert!(approved.is_active);
        assert_eq!(approved.updated_by.as_deref(), Some("admin"));

        let rejected = repo
            .set_approval(&user.id, ApprovalStatus::Rejected, "admin")
            .await
            .unwrap();
        assert!(!rejected.is_approved && !rejected.is_active);

        assert!(matches!(
            repo.set_approval("missing", ApprovalStatus::Approved, "admin")
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
