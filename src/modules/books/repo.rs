//! Catalog repository over the shared SQLite pool.
//!
//! Every write validates its input first; cascades are declared in the schema
//! (see the module migrations) and enforced by SQLite's foreign keys.

use outlet_http::error::AppError;
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{
    Address, AddressInput, Author, AuthorInput, Book, BookFilter, BookInput, BookListing,
    CatalogStats, Country, CountryInput,
};

/// Catalog error type
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CatalogError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    fn not_found(resource: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation { field, message } => AppError::invalid_field(field, message),
            CatalogError::NotFound { .. } => AppError::not_found(err.to_string()),
            CatalogError::Database(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

const LISTING_SELECT: &str = r#"
    SELECT
        b.id,
        b.title,
        b.rating,
        b.author_id,
        a.first_name || ' ' || a.last_name AS author_name,
        b.is_bestselling,
        b.slug
    FROM books b
    LEFT JOIN authors a ON a.id = b.author_id
"#;

/// Typed access to countries, addresses, authors and books
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Countries
    // ------------------------------------------------------------------

    pub async fn create_country(&self, input: CountryInput) -> Result<Country> {
        let input = input.validated()?;
        let result = sqlx::query("INSERT INTO countries (name, code) VALUES (?, ?)")
            .bind(&input.name)
            .bind(&input.code)
            .execute(&self.pool)
            .await?;

        tracing::info!(country_id = result.last_insert_rowid(), code = %input.code, "country created");
        self.get_country(result.last_insert_rowid()).await
    }

    pub async fn get_country(&self, id: i64) -> Result<Country> {
        sqlx::query_as::<_, Country>("SELECT id, name, code FROM countries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found("country", id))
    }

    pub async fn list_countries(&self) -> Result<Vec<Country>> {
        let countries =
            sqlx::query_as::<_, Country>("SELECT id, name, code FROM countries ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?;
        Ok(countries)
    }

    pub async fn update_country(&self, id: i64, input: CountryInput) -> Result<Country> {
        let input = input.validated()?;
        let result = sqlx::query("UPDATE countries SET name = ?, code = ? WHERE id = ?")
            .bind(&input.name)
            .bind(&input.code)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("country", id));
        }
        self.get_country(id).await
    }

    pub async fn delete_country(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM countries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("country", id));
        }
        tracing::info!(country_id = id, "country deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Addresses
    // ------------------------------------------------------------------

    pub async fn create_address(&self, input: AddressInput) -> Result<Address> {
        let input = input.validated()?;
        let result = sqlx::query("INSERT INTO addresses (street, postal_code, city) VALUES (?, ?, ?)")
            .bind(&input.street)
            .bind(&input.postal_code)
            .bind(&input.city)
            .execute(&self.pool)
            .await?;

        tracing::info!(address_id = result.last_insert_rowid(), "address created");
        self.get_address(result.last_insert_rowid()).await
    }

    pub async fn get_address(&self, id: i64) -> Result<Address> {
        sqlx::query_as::<_, Address>(
            "SELECT id, street, postal_code, city FROM addresses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found("address", id))
    }

    pub async fn list_addresses(&self) -> Result<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(
            "SELECT id, street, postal_code, city FROM addresses ORDER BY city, street, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(addresses)
    }

    pub async fn update_address(&self, id: i64, input: AddressInput) -> Result<Address> {
        let input = input.validated()?;
        let result =
            sqlx::query("UPDATE addresses SET street = ?, postal_code = ?, city = ? WHERE id = ?")
                .bind(&input.street)
                .bind(&input.postal_code)
                .bind(&input.city)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("address", id));
        }
        self.get_address(id).await
    }

    /// Deleting an address removes the author living there, and with it
    /// that author's books.
    pub async fn delete_address(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("address", id));
        }
        tracing::info!(address_id = id, "address deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Authors
    // ------------------------------------------------------------------

    pub async fn create_author(&self, input: AuthorInput) -> Result<Author> {
        let input = input.validated()?;
        let mut tx = self.pool.begin().await?;

        if let Some(address_id) = input.address_id {
            ensure_address_available(&mut tx, address_id, None).await?;
        }
        let result =
            sqlx::query("INSERT INTO authors (first_name, last_name, address_id) VALUES (?, ?, ?)")
                .bind(&input.first_name)
                .bind(&input.last_name)
                .bind(input.address_id)
                .execute(&mut *tx)
                .await?;
        let author = fetch_author(&mut tx, result.last_insert_rowid()).await?;
        tx.commit().await?;

        tracing::info!(author_id = author.id, name = %author.full_name(), "author created");
        Ok(author)
    }

    pub async fn get_author(&self, id: i64) -> Result<Author> {
        let mut conn = self.pool.acquire().await?;
        fetch_author(&mut conn, id).await
    }

    pub async fn list_authors(&self) -> Result<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, address_id FROM authors ORDER BY last_name, first_name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    pub async fn update_author(&self, id: i64, input: AuthorInput) -> Result<Author> {
        let input = input.validated()?;
        let mut tx = self.pool.begin().await?;

        fetch_author(&mut tx, id).await?;
        if let Some(address_id) = input.address_id {
            ensure_address_available(&mut tx, address_id, Some(id)).await?;
        }
        sqlx::query("UPDATE authors SET first_name = ?, last_name = ?, address_id = ? WHERE id = ?")
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(input.address_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let author = fetch_author(&mut tx, id).await?;
        tx.commit().await?;
        Ok(author)
    }

    /// Remove an author together with every book they wrote and the address
    /// they own.
    pub async fn delete_author(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let author = fetch_author(&mut tx, id).await?;

        let removed_books = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM books WHERE author_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM authors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if let Some(address_id) = author.address_id {
            sqlx::query("DELETE FROM addresses WHERE id = ?")
                .bind(address_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!(author_id = id, removed_books, "author deleted");
        Ok(())
    }

    /// Books written by an author (the reverse side of `Book.author`)
    pub async fn author_books(&self, author_id: i64) -> Result<Vec<Book>> {
        self.get_author(author_id).await?;
        let books = sqlx::query_as::<_, Book>(
            "SELECT id, title, rating, author_id, is_bestselling, slug FROM books WHERE author_id = ? ORDER BY title, id",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    pub async fn create_book(&self, input: BookInput) -> Result<Book> {
        self.save_book(None, input).await
    }

    pub async fn update_book(&self, id: i64, input: BookInput) -> Result<Book> {
        self.save_book(Some(id), input).await
    }

    /// Insert (`id = None`) or update a book. The slug is recomputed from the
    /// title and the published countries are replaced by `input`'s set.
    pub async fn save_book(&self, id: Option<i64>, input: BookInput) -> Result<Book> {
        let input = input.validated()?;
        let slug = input.slug();
        let mut tx = self.pool.begin().await?;

        if let Some(author_id) = input.author_id {
            if let Err(err) = fetch_author(&mut tx, author_id).await {
                return Err(match err {
                    CatalogError::NotFound { .. } => CatalogError::invalid(
                        "author_id",
                        format!("author {author_id} does not exist"),
                    ),
                    other => other,
                });
            }
        }
        for &country_id in &input.published_countries {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM countries WHERE id = ?")
                .bind(country_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(CatalogError::invalid(
                    "published_countries",
                    format!("country {country_id} does not exist"),
                ));
            }
        }

        let book_id = match id {
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE books SET title = ?, rating = ?, author_id = ?, is_bestselling = ?, slug = ? WHERE id = ?",
                )
                .bind(&input.title)
                .bind(input.rating)
                .bind(input.author_id)
                .bind(input.is_bestselling)
                .bind(&slug)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(CatalogError::not_found("book", id));
                }
                id
            }
            None => sqlx::query(
                "INSERT INTO books (title, rating, author_id, is_bestselling, slug) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&input.title)
            .bind(input.rating)
            .bind(input.author_id)
            .bind(input.is_bestselling)
            .bind(&slug)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        sqlx::query("DELETE FROM book_published_countries WHERE book_id = ?")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;
        for &country_id in &input.published_countries {
            sqlx::query("INSERT INTO book_published_countries (book_id, country_id) VALUES (?, ?)")
                .bind(book_id)
                .bind(country_id)
                .execute(&mut *tx)
                .await?;
        }

        let book = fetch_book(&mut tx, book_id).await?;
        tx.commit().await?;

        tracing::info!(book_id, slug = %book.slug, created = id.is_none(), "book saved");
        Ok(book)
    }

    pub async fn get_book(&self, id: i64) -> Result<Book> {
        let mut conn = self.pool.acquire().await?;
        fetch_book(&mut conn, id).await
    }

    /// Look a book up by slug. Slugs are not unique; the oldest match wins.
    pub async fn get_book_by_slug(&self, slug: &str) -> Result<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT id, title, rating, author_id, is_bestselling, slug FROM books WHERE slug = ? ORDER BY id LIMIT 1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CatalogError::not_found("book", slug))
    }

    /// All books, highest rated first, narrowed by the optional filters
    pub async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookListing>> {
        let query = format!(
            "{LISTING_SELECT}
            WHERE (?1 IS NULL OR b.author_id = ?1)
              AND (?2 IS NULL OR b.rating = ?2)
            ORDER BY b.rating DESC, b.title, b.id"
        );
        let books = sqlx::query_as::<_, BookListing>(&query)
            .bind(filter.author)
            .bind(filter.rating)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    pub async fn delete_book(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::not_found("book", id));
        }
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

    /// Countries a book was published in, by name
    pub async fn book_countries(&self, book_id: i64) -> Result<Vec<Country>> {
        let countries = sqlx::query_as::<_, Country>(
            r#"
            SELECT c.id, c.name, c.code
            FROM countries c
            JOIN book_published_countries bpc ON bpc.country_id = c.id
            WHERE bpc.book_id = ?
            ORDER BY c.name, c.id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(countries)
    }

    /// Distinct ratings currently in use, ascending
    pub async fn ratings_in_use(&self) -> Result<Vec<i64>> {
        let ratings = sqlx::query_scalar::<_, i64>("SELECT DISTINCT rating FROM books ORDER BY rating")
            .fetch_all(&self.pool)
            .await?;
        Ok(ratings)
    }

    /// Count and rating aggregates over the books matching `filter`
    pub async fn stats(&self, filter: &BookFilter) -> Result<CatalogStats> {
        let stats = sqlx::query_as::<_, CatalogStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                AVG(rating) AS average_rating,
                MIN(rating) AS min_rating,
                MAX(rating) AS max_rating
            FROM books
            WHERE (?1 IS NULL OR author_id = ?1)
              AND (?2 IS NULL OR rating = ?2)
            "#,
        )
        .bind(filter.author)
        .bind(filter.rating)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}

async fn fetch_author(conn: &mut SqliteConnection, id: i64) -> Result<Author> {
    sqlx::query_as::<_, Author>(
        "SELECT id, first_name, last_name, address_id FROM authors WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CatalogError::not_found("author", id))
}

async fn fetch_book(conn: &mut SqliteConnection, id: i64) -> Result<Book> {
    sqlx::query_as::<_, Book>(
        "SELECT id, title, rating, author_id, is_bestselling, slug FROM books WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CatalogError::not_found("book", id))
}

/// The address must exist and must not belong to another author.
async fn ensure_address_available(
    conn: &mut SqliteConnection,
    address_id: i64,
    author_id: Option<i64>,
) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM addresses WHERE id = ?")
        .bind(address_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(CatalogError::invalid(
            "address_id",
            format!("address {address_id} does not exist"),
        ));
    }

    let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM authors WHERE address_id = ?")
        .bind(address_id)
        .fetch_optional(&mut *conn)
        .await?;
    match owner {
        Some(owner) if Some(owner) != author_id => Err(CatalogError::invalid(
            "address_id",
            format!("address {address_id} already belongs to author {owner}"),
        )),
        _ => Ok(()),
    }
}
