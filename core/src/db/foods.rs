use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use super::users::fetch_user;
use super::{Database, like_pattern, now_timestamp};
use crate::Error;
use crate::models::{
    DEFAULT_FOOD_CATEGORY, FavoriteFood, Food, FoodListing, NewFood, Pagination, validate_food,
};

const FOOD_COLUMNS: &str =
    "id, name, calories, protein, carbs, fat, serving_size, barcode, category, created_at";

/// Maximum rows returned by the user-facing catalog search.
pub const CATALOG_LIMIT: i64 = 200;

/// `WHERE` body for the optional name search and exact category filter.
fn food_filter(search: Option<&str>, category: Option<&str>) -> (String, Vec<Value>) {
    let mut conditions = vec!["1=1".to_string()];
    let mut values = Vec::new();
    if let Some(query) = search.map(str::trim).filter(|q| !q.is_empty()) {
        conditions.push("name LIKE ? ESCAPE '\\'".to_string());
        values.push(Value::Text(like_pattern(query)));
    }
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        conditions.push("category = ?".to_string());
        values.push(Value::Text(category.to_string()));
    }
    (conditions.join(" AND "), values)
}

impl Database {
    // --- Foods ---

    pub fn create_food(&self, food: &NewFood) -> Result<Food> {
        validate_food(food)?;
        self.conn
            .execute(
                "INSERT INTO foods (name, calories, protein, carbs, fat, serving_size, barcode, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    food.name.trim(),
                    food.calories,
                    food.protein,
                    food.carbs,
                    food.fat,
                    food.serving_size,
                    food.barcode,
                    food.category.as_deref().unwrap_or(DEFAULT_FOOD_CATEGORY),
                    now_timestamp(),
                ],
            )
            .context("Failed to insert food")?;
        self.get_food(self.conn.last_insert_rowid())
    }

    pub fn get_food(&self, id: i64) -> Result<Food> {
        self.conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} FROM foods WHERE id = ?1"),
                params![id],
                food_from_row,
            )
            .optional()
            .context("Failed to load food")?
            .ok_or_else(|| Error::not_found("Food not found").into())
    }

    /// Replace every editable field of an existing food.
    pub fn update_food(&self, id: i64, food: &NewFood) -> Result<Food> {
        validate_food(food)?;
        let rows = self
            .conn
            .execute(
                "UPDATE foods SET name = ?1, calories = ?2, protein = ?3, carbs = ?4, fat = ?5,
                        serving_size = ?6, barcode = ?7, category = ?8
                 WHERE id = ?9",
                params![
                    food.name.trim(),
                    food.calories,
                    food.protein,
                    food.carbs,
                    food.fat,
                    food.serving_size,
                    food.barcode,
                    food.category.as_deref().unwrap_or(DEFAULT_FOOD_CATEGORY),
                    id,
                ],
            )
            .context("Failed to update food")?;
        if rows == 0 {
            return Err(Error::not_found("Food not found").into());
        }
        self.get_food(id)
    }

    /// Favorites go with the food; log snapshots keep their copy and lose
    /// the reference.
    pub fn delete_food(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM foods WHERE id = ?1", params![id])
            .context("Failed to delete food")?;
        if rows == 0 {
            return Err(Error::not_found("Food not found").into());
        }
        Ok(())
    }

    /// Catalog search ordered by name, plus every distinct category.
    pub fn list_foods(&self, search: Option<&str>, category: Option<&str>) -> Result<FoodListing> {
        let (where_clause, mut values) = food_filter(search, category);
        values.push(Value::Integer(CATALOG_LIMIT));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods WHERE {where_clause} ORDER BY name LIMIT ?"
        ))?;
        let foods = stmt
            .query_map(params_from_iter(values), food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FoodListing {
            foods,
            categories: self.food_categories()?,
        })
    }

    pub fn food_categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM foods WHERE category IS NOT NULL ORDER BY category",
        )?;
        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Paged catalog for the admin console, with the filtered total.
    pub fn admin_list_foods(
        &self,
        page: Pagination,
        search: Option<&str>,
        category: Option<&str>,
    ) -> Result<(Vec<Food>, i64)> {
        let (where_clause, values) = food_filter(search, category);
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM foods WHERE {where_clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let mut paged = values;
        paged.push(Value::Integer(page.limit));
        paged.push(Value::Integer(page.offset()));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods WHERE {where_clause}
             ORDER BY name LIMIT ? OFFSET ?"
        ))?;
        let foods = stmt
            .query_map(params_from_iter(paged), food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((foods, total))
    }

    // --- Favorites ---

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<FavoriteFood>> {
        let mut stmt = self.conn.prepare(
            "SELECT ff.id, ff.created_at,
                    f.id, f.name, f.calories, f.protein, f.carbs, f.fat, f.serving_size,
                    f.barcode, f.category, f.created_at
             FROM favorite_foods ff
             JOIN foods f ON ff.food_id = f.id
             WHERE ff.user_id = ?1
             ORDER BY ff.created_at DESC, ff.id DESC",
        )?;
        let favorites = stmt
            .query_map(params![user_id], |row| {
                Ok(FavoriteFood {
                    favorite_id: row.get(0)?,
                    favorited_at: row.get(1)?,
                    food: Food {
                        id: row.get(2)?,
                        name: row.get(3)?,
                        calories: row.get(4)?,
                        protein: row.get(5)?,
                        carbs: row.get(6)?,
                        fat: row.get(7)?,
                        serving_size: row.get(8)?,
                        barcode: row.get(9)?,
                        category: row.get(10)?,
                        created_at: row.get(11)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    pub fn add_favorite(&self, user_id: i64, food_id: i64) -> Result<()> {
        fetch_user(&self.conn, user_id)?;
        self.get_food(food_id)?;
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM favorite_foods WHERE user_id = ?1 AND food_id = ?2)",
            params![user_id, food_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::conflict("Food is already a favorite").into());
        }
        self.conn
            .execute(
                "INSERT INTO favorite_foods (user_id, food_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, food_id, now_timestamp()],
            )
            .context("Failed to add favorite")?;
        Ok(())
    }

    pub fn remove_favorite(&self, user_id: i64, food_id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM favorite_foods WHERE user_id = ?1 AND food_id = ?2",
                params![user_id, food_id],
            )
            .context("Failed to remove favorite")?;
        if rows == 0 {
            return Err(Error::not_found("Favorite not found").into());
        }
        Ok(())
    }
}

pub(super) fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
    Ok(Food {
        id: row.get(0)?,
        name: row.get(1)?,
        calories: row.get(2)?,
        protein: row.get(3)?,
        carbs: row.get(4)?,
        fat: row.get(5)?,
        serving_size: row.get(6)?,
        barcode: row.get(7)?,
        category: row.get(8)?,
        created_at: row.get(9)?,
    })
}
