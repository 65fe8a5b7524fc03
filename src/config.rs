use std::path::PathBuf;

use crate::access::Role;

/// Process configuration loaded from environment variables.
///
/// | Env Var                      | Default   |
/// |------------------------------|-----------|
/// | `DORMROTA_DATA_DIR`          | `./data`  |
/// | `DORMROTA_TENANT`            | `default` |
/// | `DORMROTA_ROLE`              | `admin`   |
/// | `DORMROTA_METRICS_PORT`      | unset     |
/// | `DORMROTA_COMPACT_THRESHOLD` | `1000`    |
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Dormitory the console operates on.
    pub tenant: String,
    /// Role of the console operator.
    pub role: Role,
    pub metrics_port: Option<u16>,
    /// WAL appends before the compactor rewrites the log.
    pub compact_threshold: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("DORMROTA_DATA_DIR").unwrap_or_else(|| "./data".into());
        let tenant = lookup("DORMROTA_TENANT").unwrap_or_else(|| "default".into());

        let role = match lookup("DORMROTA_ROLE") {
            None => Role::Admin,
            Some(raw) => Role::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("unknown DORMROTA_ROLE {raw:?}, running as occupant");
                Role::Occupant
            }),
        };

        let metrics_port: Option<u16> = lookup("DORMROTA_METRICS_PORT").and_then(|s| s.parse().ok());
        let compact_threshold: u64 = lookup("DORMROTA_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        Self {
            data_dir: PathBuf::from(data_dir),
            tenant,
            role,
            metrics_port,
            compact_threshold,
        }
    }
}
