use flexi_logger::{
    colored_default_format, detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger,
    LoggerHandle, Naming,
};
use std::path::Path;

use crate::{PassgateError, Result};

const ROTATE_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 7;

/// Start the global logger. `RUST_LOG` wins over `level`.
///
/// With a log directory, records go to rotating files and are duplicated to stderr. The returned
/// handle must be kept alive for the lifetime of the process.
pub fn setup_logging(level: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str(level).map_err(logger_error)?;

    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename("passgate"))
            .format_for_files(detailed_format)
            .format_for_stderr(colored_default_format)
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::Size(ROTATE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(KEEP_LOG_FILES),
            ),
        None => logger.format(colored_default_format),
    };

    logger.start().map_err(logger_error)
}

fn logger_error(e: flexi_logger::FlexiLoggerError) -> PassgateError {
    PassgateError::Config(format!("logger: {e}"))
}
