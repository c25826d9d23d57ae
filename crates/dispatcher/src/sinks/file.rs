//! FileSink - appends records to a JSON document or a CSV file
//!
//! The format follows the destination's extension:
//! - `.json`: a single `{"data": [...]}` document, rewritten whole on every
//!   record through a temp file renamed over the destination
//! - `.csv`: a header row followed by one appended row per record
//!
//! CSV rows follow `field_names`: a missing key becomes an empty cell and keys
//! outside `field_names` are dropped (logged at debug level). Rows end in a
//! bare `\n`, not the `\r\n` the `csv` crate writes by default.
//!
//! The extension is whatever follows the last `.` of the file name, so a bare
//! `.json` is a JSON destination.

use contracts::{
    require_param, ContractError, DataSink, Delivery, Record, SinkConfig, SinkOptions,
    TimedRecord, Value,
};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, instrument, warn};

/// Directory used when `output_dir` is not configured
pub const DEFAULT_OUTPUT_DIR: &str = "dump";

/// `mode` value that reinitializes the destination at configure time
pub const OVERWRITE_MODE: &str = "w";

/// On-disk format, derived from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Csv,
}

impl FileFormat {
    /// Infer format from the file name suffix (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// What happens to existing destination content at configure time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate and write an empty document / header-only file
    Overwrite,
    /// Leave existing content untouched
    Append,
}

impl WriteMode {
    /// `"w"` means overwrite, anything else appends
    pub fn from_param(mode: &str) -> Self {
        if mode == OVERWRITE_MODE {
            Self::Overwrite
        } else {
            Self::Append
        }
    }
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory, created if absent
    pub output_dir: PathBuf,
    /// Destination file name inside `output_dir`
    pub file_name: String,
    /// Initialization mode
    pub mode: WriteMode,
}

impl FileSinkConfig {
    /// Create config from a sink configuration
    pub fn from_config(config: &SinkConfig) -> Result<Self, ContractError> {
        let file_name = require_param(config, "file_name")?;
        if file_name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.file_name", config.name),
                "file_name cannot be empty",
            ));
        }
        let mode = WriteMode::from_param(require_param(config, "mode")?);
        let output_dir = config
            .param("output_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            output_dir,
            file_name: file_name.to_string(),
            mode,
        })
    }

    /// Full destination path
    pub fn path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

/// Sink that appends records to a file on disk
pub struct FileSink {
    options: SinkOptions,
    config: FileSinkConfig,
    path: PathBuf,
    format: Option<FileFormat>,
}

impl FileSink {
    /// Create a new FileSink
    ///
    /// Creates the output directory and, in overwrite mode, replaces the
    /// destination with an empty document (JSON) or a header row (CSV).
    pub fn new(options: SinkOptions, config: FileSinkConfig) -> Result<Self, ContractError> {
        let path = config.path();
        let format = FileFormat::from_path(&path);

        if format == Some(FileFormat::Csv) && options.field_names.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].field_names", options.name),
                "field_names cannot be empty for a CSV destination",
            ));
        }

        fs::create_dir_all(&config.output_dir)?;

        let sink = Self {
            options,
            config,
            path,
            format,
        };
        if sink.config.mode == WriteMode::Overwrite {
            sink.initialize()?;
        }
        Ok(sink)
    }

    /// Validate configuration and prepare the destination
    #[instrument(name = "file_sink_configure", skip(config), fields(sink = %config.name))]
    pub fn configure(config: &SinkConfig) -> Result<Self, ContractError> {
        let options = SinkOptions::from_config(config)?;
        let file_config = FileSinkConfig::from_config(config)?;
        Self::new(options, file_config)
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination format, `None` if the extension is unsupported
    pub fn format(&self) -> Option<FileFormat> {
        self.format
    }

    fn initialize(&self) -> Result<(), ContractError> {
        match self.format {
            Some(FileFormat::Json) => {
                self.replace_contents(&self.encode_document(&empty_document())?)?;
            }
            Some(FileFormat::Csv) => {
                self.replace_contents(&self.csv_line(&self.options.field_names)?)?;
            }
            None => return Ok(()),
        }
        info!(
            sink = %self.options.name,
            path = %self.path.display(),
            "Destination initialized"
        );
        Ok(())
    }

    /// Atomically replace the destination with `contents`
    ///
    /// The replacement keeps the destination's permissions. A missing
    /// destination is created first so it gets the process default (umask)
    /// instead of the temp file's owner-only mode.
    fn replace_contents(&self, contents: &[u8]) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let permissions = self.destination_permissions()?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn destination_permissions(&self) -> io::Result<fs::Permissions> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(file.metadata()?.permissions())
    }

    fn load_document(&self) -> Result<Value, ContractError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(empty_document()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ContractError::sink_write(
                    &self.options.name,
                    format!("malformed JSON document {}: {}", self.path.display(), e),
                )
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(empty_document()),
            Err(e) => Err(e.into()),
        }
    }

    fn encode_document(&self, document: &Value) -> Result<Vec<u8>, ContractError> {
        serde_json::to_vec(document)
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))
    }

    fn append_json(&self, record: &Record) -> Result<(), ContractError> {
        let mut document = self.load_document()?;
        let data = document
            .get_mut("data")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| {
                ContractError::sink_write(
                    &self.options.name,
                    format!("{} has no 'data' array", self.path.display()),
                )
            })?;
        data.push(Value::Object(record.clone()));
        let len = data.len();

        self.replace_contents(&self.encode_document(&document)?)?;
        debug!(sink = %self.options.name, records = len, "JSON document rewritten");
        Ok(())
    }

    fn append_csv(&self, record: &Record) -> Result<(), ContractError> {
        let extra: Vec<&str> = record
            .keys()
            .filter(|key| !self.options.field_names.contains(key))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            debug!(sink = %self.options.name, fields = ?extra, "Dropping fields not in field_names");
        }

        let cells: Vec<String> = self
            .options
            .field_names
            .iter()
            .map(|field| record.get(field).map(cell_text).unwrap_or_default())
            .collect();

        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let mut bytes = if needs_header {
            self.csv_line(&self.options.field_names)?
        } else {
            Vec::new()
        };
        bytes.extend(self.csv_line(&cells)?);

        // one write per row keeps appends from interleaving
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn csv_line<T: AsRef<[u8]>>(&self, cells: &[T]) -> Result<Vec<u8>, ContractError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer
            .write_record(cells)
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| ContractError::sink_write(&self.options.name, e.to_string()))
    }

    fn persist_record(&self, record: &Record) -> Result<Delivery, ContractError> {
        let result = match self.format {
            Some(FileFormat::Json) => self.append_json(record),
            Some(FileFormat::Csv) => self.append_csv(record),
            None => {
                warn!(
                    sink = %self.options.name,
                    path = %self.path.display(),
                    "Unsupported output file type, record skipped"
                );
                return Ok(Delivery::Unsupported);
            }
        };
        result.map(|()| Delivery::Delivered).inspect_err(|e| {
            error!(sink = %self.options.name, path = %self.path.display(), error = %e, "Write failed");
        })
    }
}

fn empty_document() -> Value {
    json!({ "data": [] })
}

/// Render a value as a CSV cell
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.options.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, item),
        fields(sink = %self.options.name)
    )]
    async fn write(&mut self, item: &TimedRecord) -> Result<Delivery, ContractError> {
        if !self.options.is_eligible(&item.timestamp) {
            return Ok(Delivery::OutsideWindow);
        }
        self.persist_record(&item.record)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // every write goes straight to disk
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.options.name, "FileSink closed");
        Ok(())
    }
}
