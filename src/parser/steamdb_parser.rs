// SteamDB chart page parsing
use crate::model::{ParserError, RawTable};
use scraper::{ElementRef, Html, Selector};

pub const MONTH_TABLE_ID: &str = "chart-month-table";

const TITLE_SUFFIXES: [&str; 3] = ["· SteamDB", "Steam Charts", "Price history"];

pub trait Parser {
    fn parse(&self, html: &str) -> Result<RawTable, ParserError>;
}

pub struct MonthTableParser;

impl MonthTableParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MonthTableParser {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::HtmlParseError(e.to_string()))
}

/// Cell text with inner whitespace collapsed.
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn texts(parent: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    parent.select(sel).map(cell_text).collect()
}

impl Parser for MonthTableParser {
    fn parse(&self, html: &str) -> Result<RawTable, ParserError> {
        let document = Html::parse_document(html);

        let table_selector = selector(&format!("table#{}", MONTH_TABLE_ID))?;
        let head_selector = selector("thead tr th")?;
        let first_row_th = selector("tbody tr:first-child th")?;
        let first_row_td = selector("tbody tr:first-child td")?;
        let body_row_selector = selector("tbody tr")?;
        let td_selector = selector("td")?;

        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| ParserError::MissingTable(MONTH_TABLE_ID.to_string()))?;

        let mut headers = texts(table, &head_selector);
        if headers.is_empty() {
            headers = texts(table, &first_row_th);
        }
        if headers.is_empty() {
            headers = texts(table, &first_row_td);
        }
        if headers.iter().all(|h| h.is_empty()) {
            let width = table.select(&first_row_td).count().max(1);
            headers = (1..=width).map(|i| format!("Column_{}", i)).collect();
        }

        let records: Vec<Vec<String>> = table
            .select(&body_row_selector)
            .map(|row| texts(row, &td_selector))
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        if records.is_empty() {
            return Err(ParserError::EmptyTable(MONTH_TABLE_ID.to_string()));
        }
        Ok(RawTable::from_records(headers, records))
    }
}

/// Game name shown on the page: the `h1[itemprop=name]` heading, else the
/// `<title>` without the site suffixes.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Ok(h1) = Selector::parse("h1[itemprop='name']") {
        if let Some(name) = document.select(&h1).next().map(cell_text) {
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    let title_selector = Selector::parse("title").ok()?;
    let mut title = document.select(&title_selector).next().map(cell_text)?;
    if let Some((head, _)) = title.split_once(TITLE_SUFFIXES[0]) {
        title = head.to_string();
    }
    for suffix in &TITLE_SUFFIXES[1..] {
        title = title.replace(suffix, "");
    }
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
