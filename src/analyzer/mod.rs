// Analyzer module: release-impact analysis and the statistics behind it.

pub mod descriptive;
pub mod impact;
pub mod mann_whitney;
pub mod normality;
pub mod selection;
pub mod t_test;

// Re-export the main Analyzer implementation for ease of use.
pub use impact::{analyze_impact, Analyzer, ImpactAnalyzer, ImpactReport};
