//! Layered configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML or
//! YAML file, `DESK__`-prefixed environment variables (`__` separates nested
//! keys, e.g. `DESK__STORE__BACKEND=jsonbin`), and finally the bare names the
//! bot has always read (`REPORT_CATEGORY`, `STAFF_ROLES`, `JSONBIN_ID`, ...).

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::{CategoryType, RoleId, UserId};
use crate::error::{DeskError, Result};
use crate::lifecycle::{AuthorizationPolicy, CategoryMap, LifecycleSettings, Operation};
use crate::storage::{DEFAULT_JSONBIN_API, FileStorage, JsonBinStore, MemoryStore, TicketStore};
use crate::transcript::{DirectoryPublisher, TranscriptPublisher};

const ENV_PREFIX: &str = "DESK";

/// Bare environment names and the keys they set
const NAMED_ENV: [(&str, &str); 11] = [
    ("REPORT_CATEGORY", "categories.report"),
    ("APPEAL_CATEGORY", "categories.appeal"),
    ("INQUIRY_CATEGORY", "categories.inquiry"),
    ("LOG_CHANNEL", "log_channel"),
    ("JSONBIN_ID", "store.jsonbin.bin_id"),
    ("JSONBIN_KEY", "store.jsonbin.master_key"),
    ("R2_BUCKET", "transcript.s3.bucket"),
    ("R2_ENDPOINT", "transcript.s3.endpoint"),
    ("R2_ACCESS_KEY", "transcript.s3.access_key"),
    ("R2_SECRET_KEY", "transcript.s3.secret_key"),
    ("R2_PUBLIC_BASE", "transcript.s3.public_base"),
];

/// Comma-separated list of staff role ids
const STAFF_ROLES_ENV: &str = "STAFF_ROLES";

/// Category channel ids, one per ticket type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub report: String,
    pub appeal: String,
    pub inquiry: String,
}

/// Backend holding the ticket document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    JsonBin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonBinSettings {
    pub api_root: String,
    pub bin_id: String,
    pub master_key: String,
    pub timeout_secs: u64,
}

impl Default for JsonBinSettings {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_JSONBIN_API.to_string(),
            bin_id: String::new(),
            master_key: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Document path for the file backend
    pub path: PathBuf,
    pub jsonbin: JsonBinSettings,
    /// Attempts per update when the document changes underneath us
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: PathBuf::from("tickets.json"),
            jsonbin: JsonBinSettings::default(),
            max_attempts: 3,
        }
    }
}

/// Destination for transcripts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherBackend {
    #[default]
    Directory,
    S3,
}

/// S3-compatible object storage credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Public URL prefix transcripts are served under
    pub public_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Most recent messages captured per transcript
    pub message_limit: usize,
    pub publisher: PublisherBackend,
    pub directory: PathBuf,
    pub public_base: Option<String>,
    pub s3: S3Settings,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            message_limit: 100,
            publisher: PublisherBackend::default(),
            directory: PathBuf::from("transcripts"),
            public_base: None,
            s3: S3Settings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseConfig {
    pub confirmation_ttl_secs: u64,
    pub delete_delay_secs: u64,
}

impl Default for CloseConfig {
    fn default() -> Self {
        Self {
            confirmation_ttl_secs: 300,
            delete_delay_secs: 2,
        }
    }
}

/// Complete ticket-desk configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub categories: CategoryConfig,
    pub staff_roles: Vec<String>,
    pub log_channel: String,
    pub appeal_blacklist_role: Option<String>,
    /// Users allowed to post the ticket panel besides administrators
    pub setup_users: Vec<String>,
    /// Per-operation staff role overrides, keyed by operation name
    pub roles: HashMap<String, Vec<String>>,
    pub store: StoreConfig,
    pub transcript: TranscriptConfig,
    pub close: CloseConfig,
}

impl DeskConfig {
    /// Load from `path` (or the default location) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, &std::env::vars().collect())
    }

    /// Load with an explicit environment instead of the process one
    pub fn load_with(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path).required(true));
            },
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            },
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("staff_roles")
                .with_list_parse_key("setup_users")
                .source(Some(env.clone().into_iter().collect())),
        );

        for (name, key) in NAMED_ENV {
            if let Some(value) = env.get(name).filter(|v| !v.trim().is_empty()) {
                builder = builder.set_override(key, value.trim())?;
            }
        }
        if let Some(roles) = env.get(STAFF_ROLES_ENV) {
            builder = builder.set_override("staff_roles", split_list(roles))?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Reject configurations the lifecycle engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (category, id) in self.category_ids() {
            if id.trim().is_empty() {
                return Err(DeskError::Config(format!(
                    "No category channel configured for {category} tickets"
                )));
            }
            if !seen.insert(id) {
                return Err(DeskError::Config(format!(
                    "Category channel {id} is configured for more than one ticket type"
                )));
            }
        }
        if self.log_channel.trim().is_empty() {
            return Err(DeskError::Config("No log channel configured".to_string()));
        }
        if self.store.backend == StoreBackend::JsonBin
            && (self.store.jsonbin.bin_id.is_empty() || self.store.jsonbin.master_key.is_empty())
        {
            return Err(DeskError::Config(
                "The jsonbin store needs JSONBIN_ID and JSONBIN_KEY".to_string(),
            ));
        }
        if self.transcript.publisher == PublisherBackend::S3 && self.transcript.s3.bucket.is_empty() {
            return Err(DeskError::Config(
                "The s3 publisher needs R2_BUCKET".to_string(),
            ));
        }
        for operation in self.roles.keys() {
            operation.parse::<Operation>()?;
        }
        Ok(())
    }

    fn category_ids(&self) -> [(CategoryType, &str); 3] {
        [
            (CategoryType::Report, self.categories.report.as_str()),
            (CategoryType::Appeal, self.categories.appeal.as_str()),
            (CategoryType::Inquiry, self.categories.inquiry.as_str()),
        ]
    }

    #[must_use]
    pub fn category_map(&self) -> CategoryMap {
        CategoryMap::new(
            self.categories.report.as_str(),
            self.categories.appeal.as_str(),
            self.categories.inquiry.as_str(),
        )
    }

    #[must_use]
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        let mut settings = LifecycleSettings::new(self.category_map(), self.log_channel.as_str());
        settings.appeal_blacklist_role = self
            .appeal_blacklist_role
            .as_deref()
            .filter(|role| !role.is_empty())
            .map(RoleId::new);
        settings.transcript_message_limit = self.transcript.message_limit;
        let ttl_secs = i64::try_from(self.close.confirmation_ttl_secs).unwrap_or(i64::MAX);
        settings.confirmation_ttl = chrono::Duration::seconds(ttl_secs.min(i64::MAX / 1000));
        settings.channel_delete_delay = Duration::from_secs(self.close.delete_delay_secs);
        settings
    }

    pub fn policy(&self) -> Result<AuthorizationPolicy> {
        let mut policy = AuthorizationPolicy::new(role_ids(&self.staff_roles))
            .with_setup_users(self.setup_users.iter().map(UserId::new).collect());
        for (operation, roles) in &self.roles {
            policy = policy.with_override(operation.parse()?, role_ids(roles));
        }
        Ok(policy)
    }

    /// Open the configured ticket store
    pub fn build_store(&self) -> Result<Arc<dyn TicketStore>> {
        Ok(match self.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStorage::new(&self.store.path)),
            StoreBackend::JsonBin => Arc::new(JsonBinStore::new(
                &self.store.jsonbin.api_root,
                &self.store.jsonbin.bin_id,
                &self.store.jsonbin.master_key,
                Duration::from_secs(self.store.jsonbin.timeout_secs),
            )?),
        })
    }

    /// Open the configured transcript publisher
    pub async fn build_publisher(&self) -> Result<Arc<dyn TranscriptPublisher>> {
        match self.transcript.publisher {
            PublisherBackend::Directory => Ok(Arc::new(DirectoryPublisher::new(
                &self.transcript.directory,
                self.transcript.public_base.clone(),
            ))),
            #[cfg(feature = "s3")]
            PublisherBackend::S3 => Ok(Arc::new(
                crate::transcript::S3Publisher::connect(&self.transcript.s3).await,
            )),
            #[cfg(not(feature = "s3"))]
            PublisherBackend::S3 => Err(DeskError::Config(
                "ticket-desk was built without the s3 feature".to_string(),
            )),
        }
    }
}

/// `<config dir>/ticket-desk/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ticket-desk").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn role_ids(roles: &[String]) -> Vec<RoleId> {
    roles.iter().map(RoleId::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChannelId;
    use serial_test::serial;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn complete_env() -> HashMap<String, String> {
        env(&[
            ("REPORT_CATEGORY", "100"),
            ("APPEAL_CATEGORY", "200"),
            ("INQUIRY_CATEGORY", "300"),
            ("LOG_CHANNEL", "900"),
            ("STAFF_ROLES", "11, 22,,33"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = DeskConfig::default();
        assert_eq!(config.transcript.message_limit, 100);
        assert_eq!(config.close.confirmation_ttl_secs, 300);
        assert_eq!(config.close.delete_delay_secs, 2);
        assert_eq!(config.store.max_attempts, 3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_named_environment_variables() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let empty = dir.path().join("empty.toml");
        std::fs::write(&empty, "").unwrap();

        let config = DeskConfig::load_with(Some(&empty), &complete_env()).unwrap();
        assert_eq!(config.categories.report, "100");
        assert_eq!(config.log_channel, "900");
        assert_eq!(config.staff_roles, vec!["11", "22", "33"]);
        config.validate().unwrap();

        let settings = config.lifecycle_settings();
        assert_eq!(
            settings.categories.category_of(&ChannelId::new("200")),
            Some(CategoryType::Appeal)
        );
    }

    #[test]
    fn test_file_then_prefixed_env_precedence() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("desk.toml");
        std::fs::write(
            &path,
            r#"
log_channel = "from-file"

[categories]
report = "1"
appeal = "2"
inquiry = "3"

[transcript]
message_limit = 50

[roles]
claim = ["senior"]
"#,
        )
        .unwrap();

        let config = DeskConfig::load_with(
            Some(&path),
            &env(&[("DESK__TRANSCRIPT__MESSAGE_LIMIT", "25"), ("LOG_CHANNEL", "from-env")]),
        )
        .unwrap();

        assert_eq!(config.categories.appeal, "2");
        assert_eq!(config.transcript.message_limit, 25);
        assert_eq!(config.log_channel, "from-env");
        let policy = config.policy().unwrap();
        assert_eq!(
            policy.staff_roles(Operation::Claim),
            &[RoleId::new("senior")]
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_unknown_operations() {
        let mut config = DeskConfig::load_with(None, &complete_env()).unwrap();
        config.categories.inquiry = "100".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        let mut config = DeskConfig::load_with(None, &complete_env()).unwrap();
        config.roles.insert("fly".to_string(), vec![]);
        assert!(config.validate().is_err());

        let mut config = DeskConfig::load_with(None, &complete_env()).unwrap();
        config.log_channel.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = DeskConfig::load_with(Some(&dir.path().join("nope.toml")), &HashMap::new());
        assert!(matches!(result, Err(DeskError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_file_store_and_directory_publisher() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = DeskConfig::load_with(None, &complete_env()).unwrap();
        config.store.path = dir.path().join("tickets.json");
        config.transcript.directory = dir.path().join("transcripts");
        config.transcript.public_base = Some("https://t.example.com".to_string());

        let store = config.build_store().unwrap();
        assert!(store.fetch_all().await.unwrap().document.is_empty());
        let publisher = config.build_publisher().await.unwrap();
        assert_eq!(
            publisher.publish("1.html", "x").await.unwrap(),
            "https://t.example.com/1.html"
        );
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        // SAFETY: serialized with every other test that touches the environment.
        unsafe { std::env::set_var("DESK__CLOSE__DELETE_DELAY_SECS", "7") };
        let config = DeskConfig::load(None);
        unsafe { std::env::remove_var("DESK__CLOSE__DELETE_DELAY_SECS") };

        assert_eq!(config.unwrap().close.delete_delay_secs, 7);
    }
}
