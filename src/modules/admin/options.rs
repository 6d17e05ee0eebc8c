//! Per-model admin configuration and the registry of administered models.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::modules::books::models::{Address, Author, BookListing, Country};

/// Pseudo-column that renders a record through its `Display` impl
pub const STR_COLUMN: &str = "__str__";

/// How one model is listed, filtered and edited in the admin.
///
/// ```
/// use book_outlet::modules::admin::options::ModelAdmin;
///
/// let admin = ModelAdmin::new("country", "countries").verbose_name_plural("Countries");
/// assert_eq!(admin.list_display, vec!["__str__"]);
/// assert_eq!(admin.verbose_name_plural, "Countries");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ModelAdmin {
    pub model_name: &'static str,
    /// Path segment under `/admin`
    pub path: &'static str,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub list_display: Vec<&'static str>,
    pub list_filter: Vec<&'static str>,
    /// Column names; a leading `-` means descending
    pub ordering: Vec<&'static str>,
    /// Target field -> source fields it is derived from
    pub prepopulated_fields: BTreeMap<&'static str, Vec<&'static str>>,
}

impl ModelAdmin {
    pub fn new(model_name: &'static str, path: &'static str) -> Self {
        let verbose_name = model_name.replace('_', " ");
        Self {
            model_name,
            path,
            verbose_name_plural: format!("{verbose_name}s"),
            verbose_name,
            list_display: vec![STR_COLUMN],
            list_filter: Vec::new(),
            ordering: Vec::new(),
            prepopulated_fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    #[must_use]
    pub fn list_display(mut self, fields: Vec<&'static str>) -> Self {
        self.list_display = fields;
        self
    }

    #[must_use]
    pub fn list_filter(mut self, fields: Vec<&'static str>) -> Self {
        self.list_filter = fields;
        self
    }

    #[must_use]
    pub fn ordering(mut self, fields: Vec<&'static str>) -> Self {
        self.ordering = fields;
        self
    }

    #[must_use]
    pub fn prepopulated_field(mut self, field: &'static str, sources: Vec<&'static str>) -> Self {
        self.prepopulated_fields.insert(field, sources);
        self
    }

    /// Order records by `ordering`; ties keep their incoming order
    pub fn sort<R: AdminRecord>(&self, records: Vec<R>) -> Vec<R> {
        if self.ordering.is_empty() {
            return records;
        }
        let mut keyed: Vec<(Vec<serde_json::Value>, R)> = records
            .into_iter()
            .map(|record| {
                let value = serde_json::to_value(&record).unwrap_or_default();
                let keys = self
                    .ordering
                    .iter()
                    .map(|field| record.column(field.trim_start_matches('-'), &value))
                    .collect();
                (keys, record)
            })
            .collect();
        keyed.sort_by(|(left, _), (right, _)| {
            self.ordering
                .iter()
                .zip(left.iter().zip(right))
                .map(|(field, (a, b))| {
                    let order = compare_values(a, b);
                    if field.starts_with('-') {
                        order.reverse()
                    } else {
                        order
                    }
                })
                .find(|order| order.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        keyed.into_iter().map(|(_, record)| record).collect()
    }

    /// Project a record onto the configured `list_display` columns
    pub fn row<R: AdminRecord>(&self, record: &R) -> ChangeListRow {
        let value = serde_json::to_value(record).unwrap_or_default();
        let columns = self
            .list_display
            .iter()
            .map(|&column| (column.to_string(), record.column(column, &value)))
            .collect();
        ChangeListRow {
            id: record.id(),
            columns,
        }
    }
}

/// Nulls sort first, then booleans, numbers and strings
fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value;

    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// One line of a change list: the primary key plus the displayed columns
#[derive(Debug, Clone, Serialize)]
pub struct ChangeListRow {
    pub id: i64,
    pub columns: serde_json::Map<String, serde_json::Value>,
}

/// A record that can appear in an admin change list.
pub trait AdminRecord: Serialize + fmt::Display {
    fn id(&self) -> i64;

    /// Value of a display column, given the record's serialized form
    fn column(&self, name: &str, value: &serde_json::Value) -> serde_json::Value {
        if name == STR_COLUMN {
            return serde_json::Value::String(self.to_string());
        }
        value.get(name).cloned().unwrap_or(serde_json::Value::Null)
    }
}

impl AdminRecord for BookListing {
    fn id(&self) -> i64 {
        self.id
    }

    fn column(&self, name: &str, value: &serde_json::Value) -> serde_json::Value {
        match name {
            "author" => serde_json::json!(self.author_name),
            STR_COLUMN => serde_json::Value::String(self.to_string()),
            _ => value.get(name).cloned().unwrap_or(serde_json::Value::Null),
        }
    }
}

impl AdminRecord for Author {
    fn id(&self) -> i64 {
        self.id
    }
}

impl AdminRecord for Address {
    fn id(&self) -> i64 {
        self.id
    }
}

impl AdminRecord for Country {
    fn id(&self) -> i64 {
        self.id
    }
}

/// The set of administered models, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSite {
    pub site_header: &'static str,
    pub models: Vec<ModelAdmin>,
}

impl AdminSite {
    pub fn new(site_header: &'static str) -> Self {
        Self {
            site_header,
            models: Vec::new(),
        }
    }

    pub fn register(&mut self, admin: ModelAdmin) {
        tracing::debug!(model = admin.model_name, path = admin.path, "model registered with admin");
        self.models.push(admin);
    }

    pub fn get(&self, path: &str) -> Option<&ModelAdmin> {
        self.models.iter().find(|m| m.path == path)
    }
}

pub const BOOKS: &str = "books";
pub const AUTHORS: &str = "authors";
pub const ADDRESSES: &str = "addresses";
pub const COUNTRIES: &str = "countries";

/// The catalog's admin registrations
pub fn catalog_site() -> AdminSite {
    let mut site = AdminSite::new("Book Outlet administration");
    site.register(
        ModelAdmin::new("book", BOOKS)
            .list_display(vec!["title", "author", "rating"])
            .list_filter(vec!["author", "rating"])
            .ordering(vec!["-rating", "title"])
            .prepopulated_field("slug", vec!["title"]),
    );
    site.register(ModelAdmin::new("author", AUTHORS).ordering(vec!["last_name", "first_name"]));
    site.register(
        ModelAdmin::new("address", ADDRESSES)
            .verbose_name_plural("Address Entries")
            .ordering(vec!["city", "street"]),
    );
    site.register(
        ModelAdmin::new("country", COUNTRIES)
            .verbose_name_plural("Countries")
            .ordering(vec!["name"]),
    );
    site
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plural_appends_s() {
        assert_eq!(ModelAdmin::new("author", AUTHORS).verbose_name_plural, "authors");
        assert_eq!(ModelAdmin::new("book_club", "clubs").verbose_name, "book club");
    }

    #[test]
    fn catalog_registrations() {
        let site = catalog_site();
        let paths: Vec<_> = site.models.iter().map(|m| m.path).collect();
        assert_eq!(paths, vec![BOOKS, AUTHORS, ADDRESSES, COUNTRIES]);

        let book = site.get(BOOKS).unwrap();
        assert_eq!(book.list_display, vec!["title", "author", "rating"]);
        assert_eq!(book.list_filter, vec!["author", "rating"]);
        assert_eq!(book.prepopulated_fields["slug"], vec!["title"]);

        assert_eq!(site.get(ADDRESSES).unwrap().verbose_name_plural, "Address Entries");
        assert_eq!(site.get(COUNTRIES).unwrap().verbose_name_plural, "Countries");
        assert!(site.get("users").is_none());
    }

    fn listing(id: i64, title: &str, rating: i64) -> BookListing {
        BookListing {
            id,
            title: title.into(),
            rating,
            author_id: None,
            author_name: None,
            is_bestselling: rating > 4,
            slug: title.to_lowercase(),
        }
    }

    #[test]
    fn sort_follows_ordering() {
        let site = catalog_site();
        let books = vec![
            listing(1, "Emma", 4),
            listing(2, "Dune", 5),
            listing(3, "Beloved", 4),
            listing(4, "Atonement", 5),
        ];
        let books = site.get(BOOKS).unwrap().sort(books);
        let ids: Vec<_> = books.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);

        let by_title_desc = ModelAdmin::new("book", BOOKS).ordering(vec!["-title"]);
        let books = by_title_desc.sort(books);
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Emma", "Dune", "Beloved", "Atonement"]);
    }

    #[test]
    fn sort_without_ordering_keeps_input_order() {
        let books = vec![listing(2, "Dune", 5), listing(1, "Emma", 4)];
        let books = ModelAdmin::new("book", BOOKS).sort(books);
        assert_eq!(books[0].id, 2);
    }

    #[test]
    fn sort_puts_missing_authors_first() {
        let admin = ModelAdmin::new("book", BOOKS).ordering(vec!["author", "title"]);
        let mut named = listing(1, "Dune", 5);
        named.author_name = Some("Frank Herbert".into());
        let books = admin.sort(vec![named, listing(2, "Beowulf", 3)]);
        assert_eq!(books[0].id, 2);
    }

    #[test]
    fn rows_project_list_display() {
        let site = catalog_site();
        let listing = BookListing {
            id: 3,
            title: "Dune".into(),
            rating: 5,
            author_id: Some(1),
            author_name: Some("Frank Herbert".into()),
            is_bestselling: true,
            slug: "dune".into(),
        };
        let row = site.get(BOOKS).unwrap().row(&listing);
        assert_eq!(row.id, 3);
        assert_eq!(row.columns.len(), 3);
        assert_eq!(row.columns["title"], "Dune");
        assert_eq!(row.columns["author"], "Frank Herbert");
        assert_eq!(row.columns["rating"], 5);

        let country = Country {
            id: 1,
            name: "Germany".into(),
            code: "DE".into(),
        };
        let row = site.get(COUNTRIES).unwrap().row(&country);
        assert_eq!(row.columns[STR_COLUMN], "Germany");
    }
}
