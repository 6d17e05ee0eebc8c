use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::slugify;

use super::repo::CatalogError;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Country a book has been published in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Country {
    pub id: i64,
    pub name: String,
    /// Two-letter country code, stored uppercase
    pub code: String,
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Postal address owned by exactly one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub id: i64,
    pub street: String,
    pub postal_code: String,
    pub city: String,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} {}", self.street, self.postal_code, self.city)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub address_id: Option<i64>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Persisted book row. `slug` is always `slugify(title)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub rating: i64,
    pub author_id: Option<i64>,
    pub is_bestselling: bool,
    pub slug: String,
}

impl Book {
    /// Canonical URL of the book's detail page
    pub fn absolute_url(&self) -> String {
        format!("/{}", self.slug)
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.rating)
    }
}

/// Book joined with its author's display name, as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BookListing {
    pub id: i64,
    pub title: String,
    pub rating: i64,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub is_bestselling: bool,
    pub slug: String,
}

impl BookListing {
    pub fn absolute_url(&self) -> String {
        format!("/{}", self.slug)
    }
}

impl fmt::Display for BookListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.rating)
    }
}

/// Aggregates over every persisted book.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CatalogStats {
    pub total: i64,
    pub average_rating: Option<f64>,
    pub min_rating: Option<i64>,
    pub max_rating: Option<i64>,
}

/// Optional list filters, mirroring the admin's `author` and `rating` filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookFilter {
    pub author: Option<i64>,
    pub rating: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryInput {
    pub name: String,
    pub code: String,
}

impl CountryInput {
    pub fn validated(self) -> Result<Self, CatalogError> {
        let name = required_text("name", &self.name, 80)?;
        let code = self.code.trim();
        if code.chars().count() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CatalogError::invalid("code", "must be exactly two letters"));
        }
        Ok(Self {
            name,
            code: code.to_ascii_uppercase(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub postal_code: String,
    pub city: String,
}

impl AddressInput {
    pub fn validated(self) -> Result<Self, CatalogError> {
        Ok(Self {
            street: required_text("street", &self.street, 80)?,
            postal_code: required_text("postal_code", &self.postal_code, 5)?,
            city: required_text("city", &self.city, 50)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address_id: Option<i64>,
}

impl AuthorInput {
    pub fn validated(self) -> Result<Self, CatalogError> {
        Ok(Self {
            first_name: required_text("first_name", &self.first_name, 100)?,
            last_name: required_text("last_name", &self.last_name, 100)?,
            address_id: self.address_id,
        })
    }
}

/// Writable book fields; the slug is derived from `title` on save.
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub rating: i64,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub is_bestselling: bool,
    #[serde(default)]
    pub published_countries: Vec<i64>,
}

impl BookInput {
    pub fn validated(mut self) -> Result<Self, CatalogError> {
        self.title = required_text("title", &self.title, 50)?;
        if slugify(&self.title).is_empty() {
            return Err(CatalogError::invalid(
                "title",
                "must contain at least one letter or digit",
            ));
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(CatalogError::invalid(
                "rating",
                format!("must be between {MIN_RATING} and {MAX_RATING}"),
            ));
        }
        self.published_countries.sort_unstable();
        self.published_countries.dedup();
        Ok(self)
    }

    /// Slug this input will be stored under
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

fn required_text(field: &'static str, value: &str, max_chars: usize) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::invalid(field, "may not be blank"));
    }
    if value.chars().count() > max_chars {
        return Err(CatalogError::invalid(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(value.to_string())
}
