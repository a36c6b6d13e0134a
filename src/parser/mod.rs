// Parser module: extracts the monthly player-count table from chart pages.

pub mod steamdb_parser;

pub use steamdb_parser::{page_title, MonthTableParser, Parser};
