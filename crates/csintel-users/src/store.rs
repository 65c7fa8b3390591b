use std::sync::Mutex;

use chrono::{DateTime, Utc};
use csintel_core::types::UserRole;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{Result, UserError};
use crate::hash::{hash_password, verify_password};
use crate::types::User;

const SEED_ADMIN_EMAIL: &str = "admin@csintel.local";
const SEED_ADMIN_PASSWORD: &str = "1234";

pub struct UserStore {
    db: Mutex<Connection>,
}

impl UserStore {
    /// Opens the store and, if `users` is empty, seeds a single admin
    /// account,
    /// the same one-time bootstrap shape as `SessionManager::get_or_create`
    /// applied to a singleton row instead of a keyed one.
    pub fn new(conn: Connection) -> Result<Self> {
        let store = Self { db: Mutex::new(conn) };
        store.bootstrap_admin()?;
        Ok(store)
    }

    fn bootstrap_admin(&self) -> Result<()> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }
        drop(db);

        info!("no users present, seeding default admin account");
        self.create("admin", SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD, UserRole::Admin)?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub fn create(&self, name: &str, email: &str, password: &str, role: UserRole) -> Result<User> {
        let db = self.db.lock().unwrap();
        let existing: Option<String> = db.query_row("SELECT id FROM users WHERE email = ?1", rusqlite::params![email], |r| r.get(0)).optional()?;
        if existing.is_some() {
            return Err(UserError::DuplicateEmail { email: email.to_string() });
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let password_hash = hash_password(password)?;
        db.execute(
            "INSERT INTO users (id, email, name, password_hash, role, created_at) VALUES (?1,?2,?3,?4,?5,?6)",
            rusqlite::params![id, email, name, password_hash, role.to_string(), now.to_rfc3339()],
        )?;
        Ok(User { id, email: email.to_string(), name: name.to_string(), password_hash, role, created_at: now })
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let db = self.db.lock().unwrap();
        let user = db
            .query_row(
                "SELECT id, email, name, password_hash, role, created_at FROM users WHERE email = ?1",
                rusqlite::params![email],
                row_to_user,
            )
            .optional()?
            .ok_or(UserError::InvalidCredentials)?;
        drop(db);

        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(UserError::InvalidCredentials)
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<User>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, email, name, password_hash, role, created_at FROM users WHERE id = ?1",
            rusqlite::params![id],
            row_to_user,
        )
        .optional()
        .map_err(UserError::Database)
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT id, email, name, password_hash, role, created_at FROM users ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let affected = db.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])?;
        if affected == 0 {
            return Err(UserError::NotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: role.parse().unwrap_or_default(),
        created_at: parse_dt(&created_at),
    })
}

fn parse_dt(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        UserStore::new(conn).unwrap()
    }

    #[test]
    fn opening_an_empty_store_seeds_a_single_admin() {
        let s = store();
        let users = s.list().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, UserRole::Admin);
        assert!(s.authenticate(SEED_ADMIN_EMAIL, SEED_ADMIN_PASSWORD).is_ok());
    }

    #[test]
    fn reopening_a_seeded_store_does_not_duplicate_the_admin() {
        let suffix = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let path = std::env::temp_dir().join(format!("csintel-users-test-{suffix}.db"));

        {
            let conn = Connection::open(&path).unwrap();
            crate::db::init_db(&conn).unwrap();
            let s = UserStore::new(conn).unwrap();
            assert_eq!(s.list().unwrap().len(), 1);
        }

        let conn = Connection::open(&path).unwrap();
        let s = UserStore::new(conn).unwrap();
        assert_eq!(s.list().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let s = store();
        let err = s.create("Dup", SEED_ADMIN_EMAIL, "whatever", UserRole::Member).unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail { .. }));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let s = store();
        let err = s.authenticate(SEED_ADMIN_EMAIL, "wrong").unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[test]
    fn delete_removes_the_user() {
        let s = store();
        let created = s.create("Member One", "member@csintel.local", "pw", UserRole::Member).unwrap();
        s.delete(&created.id).unwrap();
        assert!(s.get(&created.id).unwrap().is_none());
    }
}
