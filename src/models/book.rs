//! Book model, request payloads and field validation

use std::borrow::Cow;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

/// Earliest accepted publication year
pub const MIN_PUBLICATION_YEAR: i32 = 1450;

/// Book record as stored in the `books` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: i32,
    pub available: bool,
}

/// Validated fields of a book about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: i32,
    pub available: bool,
}

/// Validated set of columns to overwrite on an existing book.
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub available: Option<bool>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.publication_year.is_none()
            && self.available.is_none()
    }

    /// Overwrite the fields of `book` that this change set carries
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(year) = self.publication_year {
            book.publication_year = year;
        }
        if let Some(available) = self.available {
            book.available = available;
        }
    }
}

impl From<NewBook> for BookChanges {
    fn from(book: NewBook) -> Self {
        Self {
            title: Some(book.title),
            author: Some(book.author),
            isbn: Some(book.isbn),
            publication_year: Some(book.publication_year),
            available: Some(book.available),
        }
    }
}

/// Raw create/update request body.
///
/// Fields are kept as untyped JSON so that wrong types end up in the
/// violation list instead of failing deserialization. An explicit `null`
/// is kept as `Some(Value::Null)` so it is distinguishable from an absent
/// field in partial updates.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    #[serde(default, alias = "titulo", deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Dune")]
    pub title: Option<Value>,
    #[serde(default, alias = "autor", deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Frank Herbert")]
    pub author: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "9780441013593")]
    pub isbn: Option<Value>,
    #[serde(default, alias = "anoPublicacao", deserialize_with = "present")]
    #[schema(value_type = Option<i32>, example = 1965)]
    pub publication_year: Option<Value>,
    #[serde(default, alias = "disponivel", deserialize_with = "present")]
    #[schema(value_type = Option<bool>, example = true)]
    pub available: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl From<&Book> for BookPayload {
    fn from(book: &Book) -> Self {
        Self {
            title: Some(Value::from(book.title.as_str())),
            author: Some(Value::from(book.author.as_str())),
            isbn: Some(Value::from(book.isbn.as_str())),
            publication_year: Some(Value::from(book.publication_year)),
            available: Some(Value::Bool(book.available)),
        }
    }
}

impl BookPayload {
    /// Copy of `self` with every field present in `patch` overwritten
    pub fn merged_with(&self, patch: &BookPayload) -> BookPayload {
        BookPayload {
            title: patch.title.clone().or_else(|| self.title.clone()),
            author: patch.author.clone().or_else(|| self.author.clone()),
            isbn: patch.isbn.clone().or_else(|| self.isbn.clone()),
            publication_year: patch
                .publication_year
                .clone()
                .or_else(|| self.publication_year.clone()),
            available: patch.available.clone().or_else(|| self.available.clone()),
        }
    }

    /// Check every rule and return the typed book, or every violation found
    pub fn validate_full(&self) -> Result<NewBook, Vec<String>> {
        let candidate = BookCandidate::from(self);
        candidate.validate().map_err(|e| violation_messages(&e))?;

        match candidate {
            BookCandidate {
                title: Some(title),
                author: Some(author),
                isbn: Some(isbn),
                publication_year: Some(publication_year),
                available: Some(available),
            } => Ok(NewBook {
                title,
                author,
                isbn,
                publication_year,
                available,
            }),
            // `required` on every field makes this unreachable after a passing validate()
            _ => Err(vec!["Incomplete book record.".to_string()]),
        }
    }
}

/// Payload coerced to typed values; a field that is absent or cannot be
/// coerced is `None`.
#[derive(Debug, Validate)]
pub struct BookCandidate {
    #[validate(
        required(message = "title is required and must have at least 2 characters."),
        length(min = 2, max = 200, message = "title must have between 2 and 200 characters.")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "author is required and must have at least 2 characters."),
        length(min = 2, max = 150, message = "author must have between 2 and 150 characters.")
    )]
    pub author: Option<String>,
    #[validate(
        required(message = "isbn is required and must have between 10 and 17 characters."),
        length(min = 10, max = 17, message = "isbn must have between 10 and 17 characters.")
    )]
    pub isbn: Option<String>,
    #[validate(
        required(message = "publicationYear is required and must be a whole number."),
        custom(function = "validate_publication_year")
    )]
    pub publication_year: Option<i32>,
    #[validate(required(message = "available must be a boolean (true/false)."))]
    pub available: Option<bool>,
}

impl From<&BookPayload> for BookCandidate {
    fn from(payload: &BookPayload) -> Self {
        Self {
            title: payload.title.as_ref().and_then(coerce_text),
            author: payload.author.as_ref().and_then(coerce_text),
            isbn: payload.isbn.as_ref().and_then(coerce_text),
            publication_year: payload.publication_year.as_ref().and_then(coerce_year),
            available: payload.available.as_ref().and_then(Value::as_bool),
        }
    }
}

/// Strings and numbers become trimmed text; everything else is missing.
fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integers, integral floats and numeric strings become a year.
fn coerce_year(value: &Value) -> Option<i32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.fract() != 0.0 || number < i32::MIN as f64 || number > i32::MAX as f64 {
        return None;
    }
    Some(number as i32)
}

fn validate_publication_year(year: i32) -> Result<(), ValidationError> {
    let current_year = Utc::now().year();
    if (MIN_PUBLICATION_YEAR..=current_year).contains(&year) {
        return Ok(());
    }
    let mut error = ValidationError::new("publication_year_range");
    error.message = Some(Cow::Owned(format!(
        "publicationYear must be a whole number between {} and {}.",
        MIN_PUBLICATION_YEAR, current_year
    )));
    Err(error)
}

const FIELD_ORDER: [&str; 5] = ["title", "author", "isbn", "publication_year", "available"];

/// Flatten validator errors into messages, in declaration order
fn violation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| {
        let name: &str = field.as_ref();
        FIELD_ORDER
            .iter()
            .position(|known| *known == name)
            .unwrap_or(FIELD_ORDER.len())
    });

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            let name: &str = field.as_ref();
            let name = name.to_string();
            errs.iter().map(move |e| match e.message {
                Some(ref msg) => msg.to_string(),
                None => format!("{} is invalid.", name),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> BookPayload {
        serde_json::from_value(value).unwrap()
    }

    fn dune() -> Value {
        json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "isbn": "9780441013593",
            "publicationYear": 1965,
            "available": true
        })
    }

    #[test]
    fn test_valid_payload() {
        let book = payload(dune()).validate_full().unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.publication_year, 1965);
        assert!(book.available);
    }

    #[test]
    fn test_portuguese_aliases() {
        let book = payload(json!({
            "titulo": "Dune",
            "autor": "Frank Herbert",
            "isbn": "9780441013593",
            "anoPublicacao": 1965,
            "disponivel": false
        }))
        .validate_full()
        .unwrap();
        assert_eq!(book.author, "Frank Herbert");
        assert!(!book.available);
    }

    #[test]
    fn test_empty_payload_reports_every_field() {
        let errors = payload(json!({})).validate_full().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors[0].starts_with("title"));
        assert!(errors[1].starts_with("author"));
        assert!(errors[2].starts_with("isbn"));
        assert!(errors[3].starts_with("publicationYear"));
        assert!(errors[4].starts_with("available"));
    }

    #[test]
    fn test_title_is_trimmed_before_length_check() {
        let mut body = dune();
        body["title"] = json!("  D  ");
        let errors = payload(body).validate_full().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("title"));
    }

    #[test]
    fn test_stored_strings_are_trimmed() {
        let mut body = dune();
        body["author"] = json!("  Frank Herbert ");
        let book = payload(body).validate_full().unwrap();
        assert_eq!(book.author, "Frank Herbert");
    }

    #[test]
    fn test_title_upper_bound() {
        let mut body = dune();
        body["title"] = json!("x".repeat(201));
        assert!(payload(body).validate_full().is_err());
    }

    #[test]
    fn test_isbn_length_bounds() {
        for (isbn, ok) in [
            ("123456789", false),
            ("1234567890", true),
            ("12345678901234567", true),
            ("123456789012345678", false),
        ] {
            let mut body = dune();
            body["isbn"] = json!(isbn);
            assert_eq!(payload(body).validate_full().is_ok(), ok, "isbn {}", isbn);
        }
    }

    #[test]
    fn test_numeric_isbn_is_coerced_to_text() {
        let mut body = dune();
        body["isbn"] = json!(9780441013593u64);
        let book = payload(body).validate_full().unwrap();
        assert_eq!(book.isbn, "9780441013593");
    }

    #[test]
    fn test_publication_year_coercion() {
        assert_eq!(coerce_year(&json!(1965)), Some(1965));
        assert_eq!(coerce_year(&json!(1965.0)), Some(1965));
        assert_eq!(coerce_year(&json!(" 1965 ")), Some(1965));
        assert_eq!(coerce_year(&json!(1965.5)), None);
        assert_eq!(coerce_year(&json!("nineteen")), None);
        assert_eq!(coerce_year(&json!(true)), None);
        assert_eq!(coerce_year(&Value::Null), None);
    }

    #[test]
    fn test_year_check_accepts_bounds() {
        let current_year = Utc::now().year();
        assert!(validate_publication_year(MIN_PUBLICATION_YEAR).is_ok());
        assert!(validate_publication_year(current_year).is_ok());
        assert!(validate_publication_year(MIN_PUBLICATION_YEAR - 1).is_err());
        assert!(validate_publication_year(current_year + 1).is_err());
    }

    #[test]
    fn test_publication_year_range() {
        let current_year = Utc::now().year();
        for (year, ok) in [
            (1449, false),
            (1450, true),
            (current_year, true),
            (current_year + 1, false),
        ] {
            let mut body = dune();
            body["publicationYear"] = json!(year);
            assert_eq!(payload(body).validate_full().is_ok(), ok, "year {}", year);
        }
    }

    #[test]
    fn test_out_of_range_message_names_current_year() {
        let mut body = dune();
        body["publicationYear"] = json!(1200);
        let errors = payload(body).validate_full().unwrap_err();
        assert_eq!(
            errors,
            vec![format!(
                "publicationYear must be a whole number between 1450 and {}.",
                Utc::now().year()
            )]
        );
    }

    #[test]
    fn test_available_is_not_coerced() {
        for value in [json!("true"), json!(1), json!(null)] {
            let mut body = dune();
            body["available"] = value;
            let errors = payload(body).validate_full().unwrap_err();
            assert_eq!(errors, vec!["available must be a boolean (true/false).".to_string()]);
        }
    }

    #[test]
    fn test_explicit_null_is_kept_apart_from_absent() {
        let p = payload(json!({ "title": null }));
        assert_eq!(p.title, Some(Value::Null));
        assert!(p.author.is_none());
    }

    #[test]
    fn test_merge_overwrites_only_present_fields() {
        let stored = Book {
            id: 7,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "9780441013593".into(),
            publication_year: 1965,
            available: true,
        };
        let merged = BookPayload::from(&stored).merged_with(&payload(json!({ "disponivel": false })));
        let book = merged.validate_full().unwrap();
        assert_eq!(book.title, stored.title);
        assert_eq!(book.isbn, stored.isbn);
        assert!(!book.available);
    }

    #[test]
    fn test_changes_apply_to() {
        let mut book = Book {
            id: 1,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "9780441013593".into(),
            publication_year: 1965,
            available: true,
        };
        let changes = BookChanges {
            available: Some(false),
            ..Default::default()
        };
        changes.apply_to(&mut book);
        assert!(!book.available);
        assert_eq!(book.title, "Dune");
        assert!(BookChanges::default().is_empty());
        assert!(!changes.is_empty());
    }
}
