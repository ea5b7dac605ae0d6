pub mod config;
pub mod errors;
pub mod record_types;
pub mod user_store;
pub mod userdir_utils;
