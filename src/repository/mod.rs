//! Repository layer for book storage

pub mod books;
pub mod memory;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::book::{Book, BookChanges, NewBook},
};

pub use books::PgBookRepository;
pub use memory::InMemoryBookRepository;

/// Storage operations for books.
///
/// Absence is reported through `Option`/`bool`, never as an error. A write
/// that breaks isbn uniqueness fails with `AppError::Conflict`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a new book and return it with its assigned id
    async fn create(&self, book: &NewBook) -> AppResult<Book>;

    /// Every stored book, ordered by id
    async fn find_all(&self) -> AppResult<Vec<Book>>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Apply `changes` onto the stored book; `None` if the id does not exist
    async fn update(&self, id: i32, changes: &BookChanges) -> AppResult<Option<Book>>;

    /// Returns whether a row was removed
    async fn delete(&self, id: i32) -> AppResult<bool>;

    async fn exists_by_isbn(&self, isbn: &str) -> AppResult<bool>;

    /// Round-trip to the backing store, used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}
