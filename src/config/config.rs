use crate::common::constants::BUCKET_SIZE;
use once_cell::sync::Lazy;
use serde::Deserialize;

/// Directory where database files are created by default.
pub const FERRITE_DB_DATA_DIR: &str = "data";

/// Storage-engine knobs, resolved once at startup from defaults, an optional
/// `ferritedb.toml`, and `FERRITEDB_*` environment variables (highest
/// precedence last).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// Bucket capacity of the page-table extendible hash.
    pub bucket_size: usize,
    /// Directory for database files.
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            bucket_size: BUCKET_SIZE,
            data_dir: FERRITE_DB_DATA_DIR.to_owned(),
        }
    }
}

impl StorageConfig {
    pub fn load() -> Self {
        let defaults = StorageConfig::default();
        let loaded = config::Config::builder()
            .set_default("pool_size", defaults.pool_size as u64)
            .and_then(|b| b.set_default("bucket_size", defaults.bucket_size as u64))
            .and_then(|b| b.set_default("data_dir", defaults.data_dir.clone()))
            .map(|b| {
                b.add_source(config::File::with_name("ferritedb").required(false))
                    .add_source(config::Environment::with_prefix("FERRITEDB"))
            })
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize::<StorageConfig>());
        match loaded {
            Ok(config) => config,
            Err(err) => {
                log::warn!("falling back to default storage config: {err}");
                defaults
            }
        }
    }
}

pub static STORAGE_CONFIG: Lazy<StorageConfig> = Lazy::new(StorageConfig::load);
