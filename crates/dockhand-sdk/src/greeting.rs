use scraper::{Html, Selector};

pub const DEFAULT_GREETING: &str =
    "Hello! I'm your warehouse assistant. Please provide your email address to get started.";

/// Text of the first `.initial-message` element on the landing page.
pub fn extract_initial_message(page: &str) -> Option<String> {
    let selector = Selector::parse(".initial-message").ok()?;
    let document = Html::parse_document(page);
    let element = document.select(&selector).next()?;
    let text = element.text().collect::<String>();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
