//! FileSink - appends operator output to JSON-lines files
//!
//! One file per operator under `base_path`: `<operator>.jsonl`.

use chrono::{DateTime, Utc};
use contracts::{ContractError, DataSink, Message, OperatorOutput, Payload};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// Also record watermarks, not only data messages
    pub watermarks: bool,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let watermarks = params
            .get("watermarks")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Self {
            base_path,
            watermarks,
        }
    }
}

/// One line of an output file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub recorded_at: DateTime<Utc>,
    pub operator: String,
    pub message: Message<Payload>,
}

/// Sink that writes output messages to disk
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writers: HashMap<String, BufWriter<File>>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            writers: HashMap::new(),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    /// Path of the file holding `operator`'s output
    pub fn path_for(&self, operator: &str) -> PathBuf {
        self.config.base_path.join(format!("{operator}.jsonl"))
    }

    fn writer(&mut self, operator: &str) -> std::io::Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(operator) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(operator))?;
            self.writers
                .insert(operator.to_string(), BufWriter::new(file));
        }
        self.writers
            .get_mut(operator)
            .ok_or_else(|| std::io::Error::other("writer missing after insert"))
    }

    fn append(&mut self, output: &OperatorOutput) -> std::io::Result<()> {
        let record = OutputRecord {
            recorded_at: Utc::now(),
            operator: output.operator.clone(),
            message: output.message.clone(),
        };
        let writer = self.writer(&output.operator)?;
        serde_json::to_writer(&mut *writer, &record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }

    fn persist_output(&mut self, output: &OperatorOutput) -> Result<(), ContractError> {
        self.append(output).map_err(|e| {
            error!(sink = %self.name, operator = %output.operator, error = %e, "Write failed");
            ContractError::sink(&self.name, e)
        })
    }

    fn flush_all(&mut self) -> Result<(), ContractError> {
        for writer in self.writers.values_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink(&self.name, e))?;
        }
        Ok(())
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, output),
        fields(sink = %self.name, operator = %output.operator)
    )]
    async fn write(&mut self, output: &OperatorOutput) -> Result<(), ContractError> {
        if output.message.is_watermark() && !self.config.watermarks {
            return Ok(());
        }
        self.persist_output(output)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.flush_all()
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush_all()?;
        self.writers.clear();
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
