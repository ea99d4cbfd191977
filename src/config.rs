use crate::error::{BadEnvVarSnafu, BadTimeZoneSnafu, CreateDataDirSnafu, IndukResult};
use dotenvy::var;
use jiff::tz::{self, TimeZone};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::{path::PathBuf, sync::Arc, time::Duration};

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    service_config: Arc<ServiceConfig>,
    storage_config: Arc<StorageConfig>,
}

impl RuntimeConfiguration {
    pub fn new() -> IndukResult<Self> {
        Ok(Self {
            service_config: Arc::new(ServiceConfig::new()?),
            storage_config: Arc::new(StorageConfig::new()?),
        })
    }

    pub fn service_config(&self) -> Arc<ServiceConfig> {
        self.service_config.clone()
    }

    pub fn storage_config(&self) -> Arc<StorageConfig> {
        self.storage_config.clone()
    }
}

/// Where the spreadsheet script lives and how long we're willing to wait for it.
///
/// The script URL carries its deployment key, so it is kept out of `Debug` output.
#[derive(Debug)]
pub struct ServiceConfig {
    endpoint: SecretString,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub call_timeout: Duration,
    ///the sheet's own time zone, used to read the instants it sends for date cells
    pub time_zone: TimeZone,
}

impl ServiceConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    pub const CALL_TIMEOUT: Duration = Duration::from_secs(6 * 60);

    pub fn new() -> IndukResult<Self> {
        let endpoint = var("INDUK_WEB_APP_URL").context(BadEnvVarSnafu {
            name: "INDUK_WEB_APP_URL",
        })?;

        let mut config = Self::with_endpoint(endpoint);
        if let Ok(name) = var("INDUK_TIME_ZONE") {
            config.time_zone = TimeZone::get(&name).context(BadTimeZoneSnafu { name })?;
        }
        Ok(config)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: SecretString::from(endpoint.into()),
            connect_timeout: Self::CONNECT_TIMEOUT,
            read_timeout: Self::READ_TIMEOUT,
            call_timeout: Self::CALL_TIMEOUT,
            //WIB, Asia/Jakarta has had no other offset since the sixties
            time_zone: TimeZone::fixed(tz::offset(7)),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.expose_secret()
    }
}

#[derive(Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub scanner_command: Option<PathBuf>,
}

impl StorageConfig {
    pub fn new() -> IndukResult<Self> {
        let data_dir = var("INDUK_DATA_DIR").map_or_else(|_| PathBuf::from("./scans"), PathBuf::from);
        let scanner_command = var("INDUK_SCANNER_COMMAND")
            .ok()
            .filter(|cmd| !cmd.trim().is_empty())
            .map(PathBuf::from);

        std::fs::create_dir_all(&data_dir).context(CreateDataDirSnafu {
            path: data_dir.clone(),
        })?;

        Ok(Self {
            data_dir,
            scanner_command,
        })
    }
}
