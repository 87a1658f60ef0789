//! In-memory book repository for tests and local runs without PostgreSQL

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::BookStore;
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookChanges, NewBook},
};

#[derive(Default)]
struct Table {
    rows: BTreeMap<i32, Book>,
    last_id: i32,
}

impl Table {
    fn isbn_taken(&self, isbn: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|book| book.isbn == isbn && Some(book.id) != except)
    }
}

/// Ids are never reused, even after deletes.
#[derive(Default)]
pub struct InMemoryBookRepository {
    table: RwLock<Table>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate_isbn() -> AppError {
    AppError::Conflict("ISBN already registered.".to_string())
}

#[async_trait]
impl BookStore for InMemoryBookRepository {
    async fn create(&self, book: &NewBook) -> AppResult<Book> {
        let mut table = self.table.write().await;
        if table.isbn_taken(&book.isbn, None) {
            return Err(duplicate_isbn());
        }

        table.last_id += 1;
        let row = Book {
            id: table.last_id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            publication_year: book.publication_year,
            available: book.available,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_all(&self) -> AppResult<Vec<Book>> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, id: i32, changes: &BookChanges) -> AppResult<Option<Book>> {
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Ok(None);
        }
        if let Some(ref isbn) = changes.isbn {
            if table.isbn_taken(isbn, Some(id)) {
                return Err(duplicate_isbn());
            }
        }

        Ok(table.rows.get_mut(&id).map(|book| {
            changes.apply_to(book);
            book.clone()
        }))
    }

    async fn delete(&self, id: i32) -> AppResult<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn exists_by_isbn(&self, isbn: &str) -> AppResult<bool> {
        Ok(self.table.read().await.isbn_taken(isbn, None))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
