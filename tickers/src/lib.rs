pub mod catalog;
pub mod extract;

pub use catalog::TickerCatalog;
pub use extract::TickerExtractor;
