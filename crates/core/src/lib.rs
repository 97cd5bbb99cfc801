pub mod client;
pub mod config;
pub mod endpoint;
pub mod enricher;
pub mod fetcher;
pub mod metrics;
pub mod pagination;
pub mod pipeline;
pub mod runner;
pub mod sink;
pub mod table;
pub mod testing;
pub mod types;

pub use client::{ApiResponse, ApiTransport, ClientError, ResilientClient};
pub use config::{
    load_config, load_config_from_str, validate_config, ApiConfig, ChecksSource,
    ConcurrencyConfig, Config, ConfigError, OutputConfig, OutputFormat, RetryConfig, SourceConfig,
};
pub use endpoint::{CollectionEndpoint, LookupRoutes};
pub use enricher::{enrich_all, EnrichError, ItemEnricher};
pub use fetcher::{fetch_page, PageError, PageFetchOutcome, ParallelPageFetcher};
pub use pagination::{last_page, PageCountDiscoverer, PaginationError};
pub use pipeline::{HarvestError, HarvestPipeline, HarvestReport};
pub use runner::{BatchReport, BoundedBatchRunner, TaskFailure, DEFAULT_CONCURRENCY};
pub use sink::{create_sink, write_snapshot, JsonSink, SinkError, SqliteSink, TableSink};
pub use table::{aggregate, Table, TableRow, COLUMNS};
pub use types::{ChecksStatus, EnrichedRecord, ItemParseError, RawItem};
