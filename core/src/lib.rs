pub mod admin_logs;
pub mod aggregate;
pub mod db;
pub mod error;
pub mod metabolic;
pub mod models;
pub mod profile;
pub mod recommendations;

pub use error::Error;
