//! HTML helpers shared by the source adapters
//!
//! This module handles:
//! - Compiling configured CSS selectors
//! - Flattening an element subtree into line-separated text
//! - Reading `<time datetime="...">` markers

use crate::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Compiles a CSS selector from configuration
pub fn compile_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", selector, e)))
}

/// Returns the text of `element` as trimmed, non-empty text runs joined by newlines
///
/// Text inside `<script>`/`<style>` and inside any subtree matching `exclude`
/// is left out.
///
/// # Example
///
/// ```no_run
/// use press_harvest::crawler::{compile_selector, element_text};
/// use scraper::Html;
///
/// let doc = Html::parse_fragment("<div><p> one </p><p>two</p></div>");
/// let div = doc.select(&compile_selector("div").unwrap()).next().unwrap();
/// assert_eq!(element_text(div, None), "one\ntwo");
/// ```
pub fn element_text(element: ElementRef<'_>, exclude: Option<&Selector>) -> String {
    let excluded: HashSet<_> = exclude
        .map(|selector| element.select(selector).map(|e| e.id()).collect())
        .unwrap_or_default();
    let root = element.id();

    let mut lines = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root)
            .chain(std::iter::once(*element))
            .any(|ancestor| {
                excluded.contains(&ancestor.id())
                    || ancestor
                        .value()
                        .as_element()
                        .map(|e| matches!(e.name(), "script" | "style"))
                        .unwrap_or(false)
            });
        if !hidden {
            lines.push(trimmed);
        }
    }

    lines.join("\n")
}

/// Returns the text of the first element matching `selector` in `document`
pub fn select_text(document: &Html, selector: &Selector, exclude: Option<&Selector>) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(|element| element_text(element, exclude))
}

/// Reads the calendar date out of a `datetime` attribute value
///
/// Full timestamps keep the date in their own offset; anything else falls
/// back to a leading `YYYY-MM-DD`.
pub fn parse_time_marker(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value.replace('Z', "+00:00")) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = value.parse::<NaiveDateTime>() {
        return Some(dt.date());
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
