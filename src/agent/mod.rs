//! Agent-side in-process span collector, linked into traced applications
//! to buffer spans for the collector's scraper to pick up.

pub mod collector;
pub mod http;

pub use collector::Collector;
