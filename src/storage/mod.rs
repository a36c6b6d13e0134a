// Storage module: CSV persistence of scraped month tables.

pub mod csv_store;

pub use csv_store::{list_tables, read_table, source_label, write_table};
