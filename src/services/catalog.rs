//! Catalog management service

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookChanges, BookPayload},
    repository::BookStore,
};

fn book_not_found(id: i32) -> AppError {
    tracing::debug!("Book {} not found", id);
    AppError::NotFound("Book not found.".to_string())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn BookStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    /// Validate and insert a new book. The isbn must not be registered yet.
    pub async fn create_book(&self, payload: &BookPayload) -> AppResult<Book> {
        let book = payload.validate_full().map_err(AppError::Validation)?;

        if self.store.exists_by_isbn(&book.isbn).await? {
            tracing::warn!("Catalog create: isbn {} already registered", book.isbn);
            return Err(AppError::Conflict("ISBN already registered.".to_string()));
        }

        let created = self.store.create(&book).await?;
        tracing::info!("Catalog create: book id={} isbn={}", created.id, created.isbn);
        Ok(created)
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.store.find_all().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| book_not_found(id))
    }

    /// Replace every field of an existing book
    pub async fn replace_book(&self, id: i32, payload: &BookPayload) -> AppResult<Book> {
        let book = payload.validate_full().map_err(AppError::Validation)?;
        let current = self.get_book(id).await?;

        self.ensure_isbn_free(&current, &book.isbn).await?;

        let updated = self
            .store
            .update(id, &BookChanges::from(book))
            .await?
            .ok_or_else(|| book_not_found(id))?;
        tracing::info!("Catalog replace: book id={}", id);
        Ok(updated)
    }

    /// Apply the fields present in `patch` onto the stored book.
    ///
    /// The merged record is validated as a whole before anything is written.
    /// The read and the write are separate storage calls.
    pub async fn patch_book(&self, id: i32, patch: &BookPayload) -> AppResult<Book> {
        let current = self.get_book(id).await?;

        let merged = BookPayload::from(&current).merged_with(patch);
        let book = merged.validate_full().map_err(AppError::Validation)?;

        self.ensure_isbn_free(&current, &book.isbn).await?;

        let changes = BookChanges {
            title: patch.title.as_ref().map(|_| book.title.clone()),
            author: patch.author.as_ref().map(|_| book.author.clone()),
            isbn: patch.isbn.as_ref().map(|_| book.isbn.clone()),
            publication_year: patch.publication_year.as_ref().map(|_| book.publication_year),
            available: patch.available.as_ref().map(|_| book.available),
        };

        let updated = self
            .store
            .update(id, &changes)
            .await?
            .ok_or_else(|| book_not_found(id))?;
        tracing::info!("Catalog patch: book id={}", id);
        Ok(updated)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        if !self.store.delete(id).await? {
            return Err(book_not_found(id));
        }
        tracing::info!("Catalog delete: book id={}", id);
        Ok(())
    }

    /// Keeping the current isbn is always allowed
    async fn ensure_isbn_free(&self, current: &Book, isbn: &str) -> AppResult<()> {
        if current.isbn != isbn && self.store.exists_by_isbn(isbn).await? {
            tracing::warn!(
                "Catalog update: isbn {} already registered to another book (id={})",
                isbn,
                current.id
            );
            return Err(AppError::Conflict(
                "ISBN already registered to another book.".to_string(),
            ));
        }
        Ok(())
    }

    /// Readiness of the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
