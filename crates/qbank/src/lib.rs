pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod service;
pub mod store;

pub use config::{load_config, Config};
pub use enrich::{EnrichError, EnrichedMetadata, EnrichmentClient, ProviderKind};
pub use error::{ConfigError, ExtractError, QbankError, Result, StoreError};
pub use extractor::{ImageRecord, TextExtractor};
pub use service::QuestionService;
pub use store::{MetadataRecord, MetadataStore};
