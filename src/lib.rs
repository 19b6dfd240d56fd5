pub mod access;
pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod logging;

pub use error::{Error, Result};
