//! HTML templates compiled into the binary.

use tera::Tera;

pub const INDEX: &str = "book_outlet/index.html";
pub const BOOK_DETAIL: &str = "book_outlet/book_detail.html";

/// Build the template set used by the book views
pub fn load() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (
            "book_outlet/base.html",
            include_str!("../../../templates/book_outlet/base.html"),
        ),
        (INDEX, include_str!("../../../templates/book_outlet/index.html")),
        (
            BOOK_DETAIL,
            include_str!("../../../templates/book_outlet/book_detail.html"),
        ),
    ])?;
    Ok(tera)
}
