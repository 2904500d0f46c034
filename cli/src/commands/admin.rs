use anyhow::Result;
use tracing::info;

use crate::auth::hash_password;
use dietlog_core::db::Database;
use dietlog_core::models::{User, validate_credentials};

/// Create an admin account, or promote an existing user and reset their
/// password.
pub(crate) fn cmd_admin_create(
    db: &Database,
    email: &str,
    password: &str,
    name: Option<&str>,
    cost: u32,
) -> Result<User> {
    let (email, password) = validate_credentials(Some(email), Some(password))?;
    let hash = hash_password(&password, cost)?;
    let admin = db.upsert_admin(&email, &hash, name)?;
    info!(user_id = admin.id, "admin account ready");
    println!("Admin account ready: {} (id {})", admin.email, admin.id);
    Ok(admin)
}
