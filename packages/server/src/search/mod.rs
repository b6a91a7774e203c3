pub mod query_parser;
pub mod ranker;
pub mod searcher;
pub mod similarity;
pub mod types;

pub use searcher::Searcher;
pub use types::{SearchConfig, SearchItem, SearchResult};
