use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize, Deserialize, Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Configuration {
    #[clap(long, env = "INDEX_PATH", default_value_os_t = default_index_dir())]
    #[serde(default = "default_index_dir")]
    /// Directory holding the physical index directories
    pub index_path: PathBuf,

    #[clap(long, env = "PUBLIC_PORT", default_value_t = default_public_port())]
    #[serde(default = "default_public_port")]
    /// Port of the public JSON API
    pub public_port: u16,

    #[clap(long, env = "PRIVATE_PORT", default_value_t = default_private_port())]
    #[serde(default = "default_private_port")]
    /// Port of the private metrics/health listener
    pub private_port: u16,

    #[clap(long, default_value_t = default_host())]
    #[serde(default = "default_host")]
    /// Address both listeners bind to
    pub host: String,

    #[clap(long, env = "CONFIG_DIR_PATH", default_value_os_t = default_config_dir())]
    #[serde(default = "default_config_dir")]
    /// Directory the schema files default into
    pub config_dir_path: PathBuf,

    #[clap(long, env = "INDEX_CONFIG_PATH")]
    #[serde(default)]
    /// Index schema file; defaults to `<configDir>/index.json`
    pub index_config_path: Option<PathBuf>,

    #[clap(long, env = "FILTER_CONFIG_PATH")]
    #[serde(default)]
    /// Filter catalogue file; defaults to `<configDir>/filters.json`
    pub filter_config_path: Option<PathBuf>,

    #[clap(long, env = "RANK_CONFIG_PATH")]
    #[serde(default)]
    /// Ranking profile file; defaults to `<configDir>/ranking.json`
    pub rank_config_path: Option<PathBuf>,

    #[clap(long, env = "SYNONYM_CONFIG_PATH")]
    #[serde(default)]
    /// Synonym dictionary; defaults to `<configDir>/synonyms.json`
    pub synonym_config_path: Option<PathBuf>,

    #[clap(long, env = "DATE_LAYOUT")]
    #[serde(default)]
    /// chrono format string for timestamps; unset means strict RFC3339
    pub date_layout: Option<String>,

    #[clap(long, env = "LOGS_DIR")]
    #[serde(default)]
    /// Log directory; defaults to `<indexPath>/logs`
    pub logs_dir: Option<PathBuf>,

    #[clap(long, env = "NATS_URL")]
    #[serde(default)]
    pub nats_url: Option<String>,

    #[clap(long, env = "NATS_SUBJECT")]
    #[serde(default)]
    pub nats_subject: Option<String>,

    #[clap(long, env = "KAFKA_URL")]
    #[serde(default)]
    pub kafka_url: Option<String>,

    #[clap(long, env = "KAFKA_TOPIC")]
    #[serde(default)]
    pub kafka_topic: Option<String>,
}

impl Configuration {
    /// Directory where logs are written to
    pub fn log_dir(&self) -> PathBuf {
        self.logs_dir
            .clone()
            .unwrap_or_else(|| self.index_path.join("logs"))
    }

    pub fn index_config_path(&self) -> PathBuf {
        self.index_config_path
            .clone()
            .unwrap_or_else(|| self.config_dir_path.join("index.json"))
    }

    pub fn filter_config_path(&self) -> PathBuf {
        self.filter_config_path
            .clone()
            .unwrap_or_else(|| self.config_dir_path.join("filters.json"))
    }

    pub fn rank_config_path(&self) -> PathBuf {
        self.rank_config_path
            .clone()
            .unwrap_or_else(|| self.config_dir_path.join("ranking.json"))
    }

    pub fn synonym_config_path(&self) -> PathBuf {
        self.synonym_config_path
            .clone()
            .unwrap_or_else(|| self.config_dir_path.join("synonyms.json"))
    }

    pub fn print(&self) {
        info!("===================== CONFIG =====================");
        info!("INDEX_PATH ........... {}", self.index_path.display());
        info!("PUBLIC_PORT .......... {}", self.public_port);
        info!("PRIVATE_PORT ......... {}", self.private_port);
        info!("CONFIG_DIR_PATH ...... {}", self.config_dir_path.display());
        info!("INDEX_CONFIG_PATH .... {}", self.index_config_path().display());
        info!("FILTER_CONFIG_PATH ... {}", self.filter_config_path().display());
        info!("RANK_CONFIG_PATH ..... {}", self.rank_config_path().display());
        info!("LOGS_DIR ............. {}", self.log_dir().display());
        info!(
            "NATS ................. {}",
            if self.nats_url.is_some() && self.nats_subject.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!(
            "KAFKA ................ {}",
            if self.kafka_url.is_some() && self.kafka_topic.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );
        info!("==================================================");
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            index_path: "searchd_test".into(),
            public_port: default_public_port(),
            private_port: default_private_port(),
            host: default_host(),
            config_dir_path: "searchd_test/config".into(),
            index_config_path: None,
            filter_config_path: None,
            rank_config_path: None,
            synonym_config_path: None,
            date_layout: None,
            logs_dir: None,
            nats_url: None,
            nats_subject: None,
            kafka_url: None,
            kafka_topic: None,
        }
    }
}

fn default_index_dir() -> PathBuf {
    match directories::ProjectDirs::from("io", "searchd", "searchd") {
        Some(dirs) => dirs.data_dir().to_owned(),
        None => "searchd_data".into(),
    }
}

fn default_config_dir() -> PathBuf {
    "config".into()
}

fn default_public_port() -> u16 {
    8080
}

fn default_private_port() -> u16 {
    9090
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}
