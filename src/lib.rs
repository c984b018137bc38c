pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::application::{
    collect_keyword_stats, convert_and_repackage, ensure_all_converted, extract_and_convert,
    list_native_entries, BatchError, ConversionOutcome, FilePorts, ModelConverter, ProgressReporter,
};
pub use crate::config::{Config, ConfigError, ConfigLayer};
pub use crate::domain::{
    parse_keyword, BatchStats, KeywordCount, KeywordIndex, PathMapping, ARCHIVE_EXTENSION,
    EXCHANGE_MODEL_EXTENSION, LOG_FILE_NAME, NATIVE_MODEL_EXTENSION, STATS_FILE_NAME,
};
pub use crate::infrastructure::{
    read_keyword_report, write_keyword_report, FsPorts, IndicatifProgressReporter,
    LineProgressReporter, NoProgressReporter, ProcessConverter,
};
