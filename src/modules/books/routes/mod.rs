//! Book list and detail views.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use outlet_http::error::AppError;
use serde::Serialize;
use tera::{Context, Tera};

use super::models::{Book, BookFilter, BookListing, CatalogStats, Country};
use super::repo::CatalogError;
use super::{templates, BooksState};

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/{slug}", get(book_detail_by_slug))
        .route("/book/{id}", get(book_detail_by_id))
        .route("/api/books", get(api_list_books))
        .route("/api/books/{slug}", get(api_book_by_slug))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct BookLink {
    title: String,
    rating: i64,
    author_name: Option<String>,
    url: String,
}

impl From<BookListing> for BookLink {
    fn from(book: BookListing) -> Self {
        Self {
            url: book.absolute_url(),
            title: book.title,
            rating: book.rating,
            author_name: book.author_name,
        }
    }
}

/// JSON form of the list view
#[derive(Debug, Serialize)]
pub struct BookList {
    pub books: Vec<BookListing>,
    pub total_number_of_books: i64,
    pub average_rating: Option<f64>,
    pub min_rating: Option<i64>,
    pub max_rating: Option<i64>,
}

/// A book with its relations resolved for display
#[derive(Debug, Serialize)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<String>,
    pub countries: Vec<Country>,
    pub url: String,
}

fn render(templates: &Tera, name: &str, context: &Context) -> Result<Html<String>, AppError> {
    templates
        .render(name, context)
        .map(Html)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context(format!("failed to render {name}"))))
}

async fn resolve_detail(state: &BooksState, book: Book) -> Result<BookDetail, CatalogError> {
    let author = match book.author_id {
        Some(author_id) => Some(state.catalog.get_author(author_id).await?.full_name()),
        None => None,
    };
    let countries = state.catalog.book_countries(book.id).await?;
    Ok(BookDetail {
        url: book.absolute_url(),
        book,
        author,
        countries,
    })
}

fn render_detail(state: &BooksState, detail: BookDetail) -> Result<Html<String>, AppError> {
    let mut context = Context::new();
    context.insert("title", &detail.book.title);
    context.insert("author", &detail.author);
    context.insert("rating", &detail.book.rating);
    context.insert("is_bestseller", &detail.book.is_bestselling);
    context.insert("countries", &detail.countries);
    render(&state.templates, templates::BOOK_DETAIL, &context)
}

/// GET / - every book, highest rated first, with count and rating aggregates
async fn index(State(state): State<BooksState>) -> Result<Html<String>, AppError> {
    let filter = BookFilter::default();
    let books = state.catalog.list_books(&filter).await?;
    let CatalogStats {
        total,
        average_rating,
        min_rating,
        ..
    } = state.catalog.stats(&filter).await?;

    let links: Vec<BookLink> = books.into_iter().map(BookLink::from).collect();
    let mut context = Context::new();
    context.insert("books", &links);
    context.insert("total_number_of_books", &total);
    context.insert("average_rating", &average_rating.map(|avg| format!("{avg:.2}")));
    context.insert("min_rating", &min_rating);

    render(&state.templates, templates::INDEX, &context)
}

/// GET /{slug}
async fn book_detail_by_slug(
    State(state): State<BooksState>,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let book = state.catalog.get_book_by_slug(&slug).await?;
    let detail = resolve_detail(&state, book).await?;
    render_detail(&state, detail)
}

/// GET /book/{id} - a non-numeric id matches no book
async fn book_detail_by_id(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::not_found(format!("book '{id}' not found")))?;
    let book = state.catalog.get_book(id).await?;
    let detail = resolve_detail(&state, book).await?;
    render_detail(&state, detail)
}

/// GET /api/books
async fn api_list_books(
    State(state): State<BooksState>,
    filter: Result<Query<BookFilter>, QueryRejection>,
) -> Result<Json<BookList>, AppError> {
    let Query(filter) = filter?;
    let books = state.catalog.list_books(&filter).await?;
    let stats = state.catalog.stats(&filter).await?;
    Ok(Json(BookList {
        books,
        total_number_of_books: stats.total,
        average_rating: stats.average_rating,
        min_rating: stats.min_rating,
        max_rating: stats.max_rating,
    }))
}

/// GET /api/books/{slug}
async fn api_book_by_slug(
    State(state): State<BooksState>,
    Path(slug): Path<String>,
) -> Result<Json<BookDetail>, AppError> {
    let book = state.catalog.get_book_by_slug(&slug).await?;
    Ok(Json(resolve_detail(&state, book).await?))
}
