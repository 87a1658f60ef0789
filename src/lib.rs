//! Book catalog server
//!
//! A REST JSON API for creating, reading, updating and deleting book
//! records, with field validation and ISBN uniqueness.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::BookStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            services: Arc::new(services::Services::new(store)),
        }
    }
}
