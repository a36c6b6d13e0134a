pub mod aligner;
pub mod analyzer;
pub mod chart;
pub mod combiner;
pub mod config;
pub mod model;
pub mod month;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod scraper;
pub mod storage;
pub mod utils;

pub use aligner::align;
pub use analyzer::analyze_impact;
pub use combiner::combine;
pub use normalizer::normalize;
