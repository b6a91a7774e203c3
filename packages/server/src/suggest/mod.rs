pub mod autocomplete;
pub mod suggestor;
pub mod types;

pub use autocomplete::AutoCompletor;
pub use suggestor::Suggestor;
