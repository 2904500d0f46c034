use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::{Database, now_timestamp};
use crate::Error;
use crate::metabolic::derive_all;
use crate::models::{NewUser, User};
use crate::profile::{ProfileUpdate, Recompute, apply_derived, reconcile};

const USER_COLUMNS: &str = "id, email, password_hash, name, age, gender, height, weight, target_weight,
     activity_level, goal, bmr, tdee, daily_calories, daily_protein, daily_carbs, daily_fat,
     is_admin, created_at";

impl Database {
    // --- Users ---

    /// Insert a user, filling derived fields when the body metrics are complete.
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        if self.get_user_by_email(&new.email)?.is_some() {
            return Err(Error::conflict("Email is already registered").into());
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (email, password_hash, name, age, gender, height, weight, target_weight,
                                activity_level, goal, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.email.to_lowercase(),
                new.password_hash,
                new.name,
                new.age,
                new.gender,
                new.height,
                new.weight,
                new.target_weight,
                new.activity_level,
                new.goal,
                new.is_admin,
                now_timestamp(),
            ],
        )
        .context("Failed to insert user")?;
        let id = tx.last_insert_rowid();
        let mut user = fetch_user(&tx, id)?;
        if let Some(metrics) = user.body_metrics() {
            apply_derived(&mut user, &derive_all(&metrics));
            write_user(&tx, &user)?;
        }
        tx.commit()?;
        Ok(user)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        fetch_user(&self.conn, id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email.to_lowercase()],
                user_from_row,
            )
            .optional()
            .context("Failed to look up user by email")
    }

    /// Apply a partial update through the reconciler. Nothing is written
    /// when the reconcile step fails.
    pub fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(User, Recompute)> {
        if update.is_empty() {
            return Err(Error::validation("No fields to update").into());
        }
        update.validate()?;
        let tx = self.conn.unchecked_transaction()?;
        let existing = fetch_user(&tx, id)?;
        let (merged, outcome) = reconcile(&existing, update).map_err(Error::from)?;
        write_user(&tx, &merged)?;
        tx.commit()?;
        Ok((merged, outcome))
    }

    /// Create an admin account, or promote and re-key an existing one.
    pub fn upsert_admin(&self, email: &str, password_hash: &str, name: Option<&str>) -> Result<User> {
        if let Some(existing) = self.get_user_by_email(email)? {
            self.conn
                .execute(
                    "UPDATE users SET password_hash = ?1, is_admin = 1, name = COALESCE(?2, name)
                     WHERE id = ?3",
                    params![password_hash, name, existing.id],
                )
                .context("Failed to promote user")?;
            return self.get_user(existing.id);
        }
        self.create_user(&NewUser {
            email: email.to_lowercase(),
            password_hash: password_hash.to_string(),
            name: name.map(str::to_string),
            is_admin: true,
            ..Default::default()
        })
    }
}

pub(super) fn fetch_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
    .context("Failed to load user")?
    .ok_or_else(|| Error::not_found("User not found").into())
}

/// Overwrite every mutable column with the values on `user`.
pub(super) fn write_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "UPDATE users SET name = ?1, age = ?2, gender = ?3, height = ?4, weight = ?5,
                target_weight = ?6, activity_level = ?7, goal = ?8, bmr = ?9, tdee = ?10,
                daily_calories = ?11, daily_protein = ?12, daily_carbs = ?13, daily_fat = ?14
         WHERE id = ?15",
        params![
            user.name,
            user.age,
            user.gender,
            user.height,
            user.weight,
            user.target_weight,
            user.activity_level,
            user.goal,
            user.bmr,
            user.tdee,
            user.daily_calories,
            user.daily_protein,
            user.daily_carbs,
            user.daily_fat,
            user.id,
        ],
    )
    .context("Failed to update user")?;
    Ok(())
}

pub(super) fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        age: row.get(4)?,
        gender: row.get(5)?,
        height: row.get(6)?,
        weight: row.get(7)?,
        target_weight: row.get(8)?,
        activity_level: row.get(9)?,
        goal: row.get(10)?,
        bmr: row.get(11)?,
        tdee: row.get(12)?,
        daily_calories: row.get(13)?,
        daily_protein: row.get(14)?,
        daily_carbs: row.get(15)?,
        daily_fat: row.get(16)?,
        is_admin: row.get(17)?,
        created_at: row.get(18)?,
    })
}
