use clap::{Parser, ValueEnum};
use snip_deleter::DeleterConfig;
use snip_gateway::TrustedSubnet;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNIP_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const MYSQL_DSN_ENV: &str = "SNIP_MYSQL_DSN";
pub const CODE_LENGTH_ENV: &str = "SNIP_CODE_LENGTH";
pub const TRUSTED_SUBNET_ENV: &str = "SNIP_TRUSTED_SUBNET";
pub const DELETER_STOPPING_TIMEOUT_ENV: &str = "SNIP_DELETER_STOPPING_TIMEOUT_MS";
pub const DELETER_MAX_BATCH_SIZE_ENV: &str = "SNIP_DELETER_MAX_BATCH_SIZE";
pub const DELETER_BATCH_WAITING_TIME_ENV: &str = "SNIP_DELETER_BATCH_WAITING_TIME_MS";
pub const DELETER_QUEUE_CAPACITY_ENV: &str = "SNIP_DELETER_QUEUE_CAPACITY";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/short-url-db.json";
pub const DEFAULT_CODE_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway", about = "HTTP URL shortener")]
pub struct Cli {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every returned short URL.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_path: PathBuf,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = CODE_LENGTH_ENV, default_value_t = DEFAULT_CODE_LENGTH)]
    pub code_length: usize,

    /// CIDR allowed to read internal stats, matched against `X-Real-IP`.
    #[arg(long, env = TRUSTED_SUBNET_ENV)]
    pub trusted_subnet: Option<TrustedSubnet>,

    /// Milliseconds `stop` waits for in-flight deletions. 0 selects the default.
    #[arg(long, env = DELETER_STOPPING_TIMEOUT_ENV, default_value_t = 0)]
    pub deleter_stopping_timeout: u64,

    #[arg(long, env = DELETER_MAX_BATCH_SIZE_ENV, default_value_t = 0)]
    pub deleter_max_batch_size: usize,

    /// Milliseconds between timer flushes. 0 selects the default.
    #[arg(long, env = DELETER_BATCH_WAITING_TIME_ENV, default_value_t = 0)]
    pub deleter_batch_waiting_time: u64,

    #[arg(long, env = DELETER_QUEUE_CAPACITY_ENV, default_value_t = 0)]
    pub deleter_queue_capacity: usize,
}

impl Cli {
    pub fn deleter_config(&self) -> DeleterConfig {
        DeleterConfig::builder()
            .stopping_timeout(Duration::from_millis(self.deleter_stopping_timeout))
            .max_batch_size(self.deleter_max_batch_size)
            .batch_waiting_time(Duration::from_millis(self.deleter_batch_waiting_time))
            .queue_capacity(self.deleter_queue_capacity)
            .build()
            .normalized()
    }
}
