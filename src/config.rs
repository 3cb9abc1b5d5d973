use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, RouteError, tracer::DefaultTraceFormatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// record the nodes every exchange passed, defaults to true
    pub message_history: bool,
    /// cache stream bodies on every route, defaults to false
    pub stream_caching: bool,
    pub tracer: TracerConfig,
    pub debugger: DebuggerConfig,
    pub mock: MockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    pub enabled: bool,
    /// trace an in/out pair per node instead of one completion event
    pub trace_out_exchanges: bool,
    pub trace_exceptions: bool,
    /// endpoint receiving every trace event as JSON
    pub destination_uri: Option<String>,
    /// number of recent trace events kept in memory
    pub backlog_size: usize,
    /// level of the trace log lines: trace, debug, info, warn or error
    pub log_level: String,
    pub formatter: DefaultTraceFormatter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// how long `assert_is_satisfied` waits for expected messages
    pub result_wait_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_worker_thread_number: 16,
            message_history: true,
            stream_caching: false,
            tracer: TracerConfig::default(),
            debugger: DebuggerConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trace_out_exchanges: false,
            trace_exceptions: true,
            destination_uri: None,
            backlog_size: 1000,
            log_level: "info".to_string(),
            formatter: DefaultTraceFormatter::default(),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            result_wait_millis: 5000,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| RouteError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        if config.async_worker_thread_number == 0 {
            return Err(RouteError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        Ok(config)
    }
}
