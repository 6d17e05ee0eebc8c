//! JSON change lists and change forms for the administered models.

use std::collections::BTreeMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use outlet_http::error::AppError;
use serde::{Deserialize, Serialize};

use super::options::{AdminRecord, AdminSite, ChangeListRow, ModelAdmin, ADDRESSES, AUTHORS, BOOKS, COUNTRIES};
use super::AdminState;
use crate::modules::books::models::{
    Address, AddressInput, Author, AuthorInput, Book, BookFilter, BookInput, Country, CountryInput,
};
use crate::utils::slugify;

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(site_index))
        .route("/books", get(list_books).post(create_book))
        .route("/books/prepopulate", get(prepopulate_slug))
        .route("/books/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/authors", get(list_authors).post(create_author))
        .route("/authors/{id}", get(get_author).put(update_author).delete(delete_author))
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/{id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/countries", get(list_countries).post(create_country))
        .route(
            "/countries/{id}",
            get(get_country).put(update_country).delete(delete_country),
        )
        .with_state(state)
}

/// A selectable value of a list filter
#[derive(Debug, Clone, Serialize)]
pub struct FilterChoice {
    pub value: i64,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeList {
    pub model: &'static str,
    pub verbose_name_plural: String,
    pub list_display: Vec<&'static str>,
    pub count: usize,
    pub results: Vec<ChangeListRow>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<&'static str, Vec<FilterChoice>>,
}

impl ChangeList {
    /// Rows are listed in the model's admin `ordering`
    fn new<R: AdminRecord>(admin: &ModelAdmin, records: Vec<R>) -> Self {
        let records = admin.sort(records);
        Self {
            model: admin.model_name,
            verbose_name_plural: admin.verbose_name_plural.clone(),
            list_display: admin.list_display.clone(),
            count: records.len(),
            results: records.iter().map(|r| admin.row(r)).collect(),
            filters: BTreeMap::new(),
        }
    }
}

/// Book change form: the row plus its published country ids
#[derive(Debug, Serialize)]
pub struct BookChange {
    #[serde(flatten)]
    pub book: Book,
    pub published_countries: Vec<i64>,
}

/// Author change form with the books that reference the author
#[derive(Debug, Serialize)]
pub struct AuthorChange {
    #[serde(flatten)]
    pub author: Author,
    pub books: Vec<Book>,
}

#[derive(Debug, Deserialize)]
pub struct PrepopulateQuery {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct Prepopulated {
    pub title: String,
    pub slug: String,
}

fn model_admin<'a>(site: &'a AdminSite, path: &str) -> Result<&'a ModelAdmin, AppError> {
    site.get(path)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("model '{path}' is not registered")))
}

/// Primary keys arrive as path text; anything non-numeric matches no row.
fn parse_id(resource: &str, raw: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("{resource} '{raw}' not found")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    Ok(payload?.0)
}

/// GET /admin
async fn site_index(State(state): State<AdminState>) -> Json<AdminSite> {
    Json(state.site.as_ref().clone())
}

// ----------------------------------------------------------------------
// Books
// ----------------------------------------------------------------------

async fn book_change(state: &AdminState, book: Book) -> Result<BookChange, AppError> {
    let published_countries = state
        .catalog
        .book_countries(book.id)
        .await?
        .into_iter()
        .map(|country| country.id)
        .collect();
    Ok(BookChange {
        book,
        published_countries,
    })
}

/// GET /admin/books?author=&rating=
async fn list_books(
    State(state): State<AdminState>,
    filter: Result<Query<BookFilter>, QueryRejection>,
) -> Result<Json<ChangeList>, AppError> {
    let Query(filter) = filter?;
    let admin = model_admin(&state.site, BOOKS)?;
    let books = state.catalog.list_books(&filter).await?;
    let mut list = ChangeList::new(admin, books);

    for &name in &admin.list_filter {
        let choices: Vec<FilterChoice> = match name {
            "author" => state
                .catalog
                .list_authors()
                .await?
                .into_iter()
                .map(|author| FilterChoice {
                    value: author.id,
                    label: author.full_name(),
                })
                .collect(),
            "rating" => state
                .catalog
                .ratings_in_use()
                .await?
                .into_iter()
                .map(|rating| FilterChoice {
                    value: rating,
                    label: rating.to_string(),
                })
                .collect(),
            _ => continue,
        };
        list.filters.insert(name, choices);
    }
    Ok(Json(list))
}

/// POST /admin/books
async fn create_book(
    State(state): State<AdminState>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookChange>), AppError> {
    let book = state.catalog.create_book(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(book_change(&state, book).await?)))
}

/// GET /admin/books/{id}
async fn get_book(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<BookChange>, AppError> {
    let book = state.catalog.get_book(parse_id("book", &id)?).await?;
    Ok(Json(book_change(&state, book).await?))
}

/// PUT /admin/books/{id}
async fn update_book(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<BookChange>, AppError> {
    let id = parse_id("book", &id)?;
    let book = state.catalog.update_book(id, body(payload)?).await?;
    Ok(Json(book_change(&state, book).await?))
}

/// DELETE /admin/books/{id}
async fn delete_book(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_book(parse_id("book", &id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/books/prepopulate?title= - the slug the form would fill in
async fn prepopulate_slug(
    query: Result<Query<PrepopulateQuery>, QueryRejection>,
) -> Result<Json<Prepopulated>, AppError> {
    let Query(query) = query?;
    Ok(Json(Prepopulated {
        slug: slugify(&query.title),
        title: query.title,
    }))
}

// ----------------------------------------------------------------------
// Authors
// ----------------------------------------------------------------------

async fn author_change(state: &AdminState, author: Author) -> Result<AuthorChange, AppError> {
    let books = state.catalog.author_books(author.id).await?;
    Ok(AuthorChange { author, books })
}

async fn list_authors(State(state): State<AdminState>) -> Result<Json<ChangeList>, AppError> {
    let admin = model_admin(&state.site, AUTHORS)?;
    let authors = state.catalog.list_authors().await?;
    Ok(Json(ChangeList::new(admin, authors)))
}

async fn create_author(
    State(state): State<AdminState>,
    payload: Result<Json<AuthorInput>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthorChange>), AppError> {
    let author = state.catalog.create_author(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(author_change(&state, author).await?)))
}

async fn get_author(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<AuthorChange>, AppError> {
    let author = state.catalog.get_author(parse_id("author", &id)?).await?;
    Ok(Json(author_change(&state, author).await?))
}

async fn update_author(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    payload: Result<Json<AuthorInput>, JsonRejection>,
) -> Result<Json<AuthorChange>, AppError> {
    let id = parse_id("author", &id)?;
    let author = state.catalog.update_author(id, body(payload)?).await?;
    Ok(Json(author_change(&state, author).await?))
}

/// DELETE /admin/authors/{id} - takes the author's books and address with it
async fn delete_author(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_author(parse_id("author", &id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Addresses
// ----------------------------------------------------------------------

async fn list_addresses(State(state): State<AdminState>) -> Result<Json<ChangeList>, AppError> {
    let admin = model_admin(&state.site, ADDRESSES)?;
    let addresses = state.catalog.list_addresses().await?;
    Ok(Json(ChangeList::new(admin, addresses)))
}

async fn create_address(
    State(state): State<AdminState>,
    payload: Result<Json<AddressInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let address = state.catalog.create_address(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn get_address(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<Address>, AppError> {
    Ok(Json(state.catalog.get_address(parse_id("address", &id)?).await?))
}

async fn update_address(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    payload: Result<Json<AddressInput>, JsonRejection>,
) -> Result<Json<Address>, AppError> {
    let id = parse_id("address", &id)?;
    Ok(Json(state.catalog.update_address(id, body(payload)?).await?))
}

async fn delete_address(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_address(parse_id("address", &id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------
// Countries
// ----------------------------------------------------------------------

async fn list_countries(State(state): State<AdminState>) -> Result<Json<ChangeList>, AppError> {
    let admin = model_admin(&state.site, COUNTRIES)?;
    let countries = state.catalog.list_countries().await?;
    Ok(Json(ChangeList::new(admin, countries)))
}

async fn create_country(
    State(state): State<AdminState>,
    payload: Result<Json<CountryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Country>), AppError> {
    let country = state.catalog.create_country(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(country)))
}

async fn get_country(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<Country>, AppError> {
    Ok(Json(state.catalog.get_country(parse_id("country", &id)?).await?))
}

async fn update_country(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    payload: Result<Json<CountryInput>, JsonRejection>,
) -> Result<Json<Country>, AppError> {
    let id = parse_id("country", &id)?;
    Ok(Json(state.catalog.update_country(id, body(payload)?).await?))
}

async fn delete_country(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete_country(parse_id("country", &id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::admin::options::catalog_site;
    use crate::modules::books::repo::tests::test_catalog;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> AdminState {
        AdminState {
            catalog: test_catalog().await,
            site: Arc::new(catalog_site()),
        }
    }

    async fn call(state: &AdminState, method: Method, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match payload {
            Some(payload) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn seed_author(state: &AdminState) -> i64 {
        let (status, author) = call(
            state,
            Method::POST,
            "/authors",
            Some(json!({ "first_name": "Frank", "last_name": "Herbert" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        author["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn site_index_describes_registered_models() {
        let state = test_state().await;
        let (status, site) = call(&state, Method::GET, "/", None).await;

        assert_eq!(status, StatusCode::OK);
        let models = site["models"].as_array().unwrap();
        assert_eq!(models.len(), 4);
        assert_eq!(models[0]["path"], "books");
        assert_eq!(models[0]["list_display"], json!(["title", "author", "rating"]));
        assert_eq!(models[0]["prepopulated_fields"]["slug"], json!(["title"]));
        assert_eq!(models[2]["verbose_name_plural"], "Address Entries");
        assert_eq!(models[3]["verbose_name_plural"], "Countries");
    }

    #[tokio::test]
    async fn book_crud_keeps_slug_in_sync() {
        let state = test_state().await;
        let author_id = seed_author(&state).await;
        let (_, country) = call(
            &state,
            Method::POST,
            "/countries",
            Some(json!({ "name": "United States", "code": "us" })),
        )
        .await;

        let (status, created) = call(
            &state,
            Method::POST,
            "/books",
            Some(json!({
                "title": "Dune",
                "rating": 5,
                "author_id": author_id,
                "is_bestselling": true,
                "published_countries": [country["id"]]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["slug"], "dune");
        assert_eq!(created["published_countries"], json!([country["id"]]));
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = call(
            &state,
            Method::PUT,
            &format!("/books/{id}"),
            Some(json!({ "title": "Dune Messiah", "rating": 4, "author_id": author_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["slug"], "dune-messiah");
        assert_eq!(updated["published_countries"], json!([]));

        let (status, list) = call(&state, Method::GET, "/books", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);
        assert_eq!(list["results"][0]["columns"]["author"], "Frank Herbert");
        assert_eq!(list["filters"]["rating"][0]["value"], 4);
        assert_eq!(list["filters"]["author"][0]["label"], "Frank Herbert");

        let (status, _) = call(&state, Method::DELETE, &format!("/books/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, Method::GET, &format!("/books/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn book_list_filters_narrow_results() {
        let state = test_state().await;
        let author_id = seed_author(&state).await;
        for (title, rating, author) in [("Dune", 5, Some(author_id)), ("Anonymous", 2, None)] {
            let (status, _) = call(
                &state,
                Method::POST,
                "/books",
                Some(json!({ "title": title, "rating": rating, "author_id": author })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, list) = call(&state, Method::GET, &format!("/books?author={author_id}"), None).await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["results"][0]["columns"]["title"], "Dune");

        let (_, list) = call(&state, Method::GET, "/books?rating=2", None).await;
        assert_eq!(list["count"], 1);
        assert_eq!(list["results"][0]["columns"]["author"], Value::Null);
    }

    #[tokio::test]
    async fn malformed_filters_are_bad_requests() {
        let state = test_state().await;

        for uri in ["/books?author=abc", "/books?rating=five"] {
            let (status, error) = call(&state, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(error["error"]["code"], "bad_request");
            assert!(error["error"]["trace_id"].is_string());
        }
    }

    #[tokio::test]
    async fn change_lists_follow_admin_ordering() {
        let state = test_state().await;
        for (title, rating) in [("Emma", 4), ("Dune", 5), ("Beloved", 4)] {
            let (status, _) = call(
                &state,
                Method::POST,
                "/books",
                Some(json!({ "title": title, "rating": rating })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        for (name, code) in [("Germany", "DE"), ("Austria", "AT")] {
            call(&state, Method::POST, "/countries", Some(json!({ "name": name, "code": code }))).await;
        }

        let (_, list) = call(&state, Method::GET, "/books", None).await;
        let titles: Vec<_> = list["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["columns"]["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Dune", "Beloved", "Emma"]);

        let (_, list) = call(&state, Method::GET, "/countries", None).await;
        assert_eq!(list["results"][0]["columns"]["__str__"], "Austria");
        assert_eq!(list["results"][1]["columns"]["__str__"], "Germany");
    }

    #[tokio::test]
    async fn invalid_input_is_unprocessable() {
        let state = test_state().await;

        let (status, error) = call(&state, Method::POST, "/books", Some(json!({ "title": "Dune", "rating": 9 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"]["details"][0]["field"], "rating");

        let (status, error) = call(
            &state,
            Method::POST,
            "/books",
            Some(json!({ "title": "Dune", "rating": 3, "author_id": 404 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"]["details"][0]["field"], "author_id");

        let (status, error) = call(
            &state,
            Method::POST,
            "/addresses",
            Some(json!({ "street": "Main St 1", "postal_code": "1234567", "city": "Springfield" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error"]["details"][0]["field"], "postal_code");

        let (status, error) = call(&state, Method::POST, "/countries", Some(json!({ "name": "Nowhere" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn deleting_an_author_removes_their_books_and_address() {
        let state = test_state().await;
        let (_, address) = call(
            &state,
            Method::POST,
            "/addresses",
            Some(json!({ "street": "Arrakis Way 1", "postal_code": "12345", "city": "Arrakeen" })),
        )
        .await;
        let (status, author) = call(
            &state,
            Method::POST,
            "/authors",
            Some(json!({ "first_name": "Frank", "last_name": "Herbert", "address_id": address["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let author_id = author["id"].as_i64().unwrap();
        call(
            &state,
            Method::POST,
            "/books",
            Some(json!({ "title": "Dune", "rating": 5, "author_id": author_id })),
        )
        .await;

        let (_, author) = call(&state, Method::GET, &format!("/authors/{author_id}"), None).await;
        assert_eq!(author["books"].as_array().unwrap().len(), 1);

        let (status, _) = call(&state, Method::DELETE, &format!("/authors/{author_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, books) = call(&state, Method::GET, "/books", None).await;
        assert_eq!(books["count"], 0);
        let (status, _) = call(&state, Method::GET, &format!("/addresses/{}", address["id"]), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prepopulate_returns_slug_for_title() {
        let state = test_state().await;
        let (status, result) = call(
            &state,
            Method::GET,
            "/books/prepopulate?title=Who%27s%20Afraid%3F",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["slug"], "whos-afraid");
        assert_eq!(result["title"], "Who's Afraid?");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let state = test_state().await;
        for uri in ["/books/999", "/books/abc", "/authors/7", "/addresses/7", "/countries/7"] {
            let (status, error) = call(&state, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(error["error"]["code"], "not_found", "{uri}");
        }
        let (status, _) = call(&state, Method::DELETE, "/countries/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
