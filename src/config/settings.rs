use super::ConfigError;
use crate::provisioning::naming::{CustomerType, OrderType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_GRAPH_TOKEN_ENV: &str = "PROVISIO_GRAPH_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub state_root: PathBuf,
    pub database_path: PathBuf,
    #[serde(default)]
    pub graph: GraphSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub customer: CustomerSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Waits that absorb the remote platform's eventual consistency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_lookup_retries")]
    pub lookup_retries: u32,
    #[serde(default = "default_lookup_interval_secs")]
    pub lookup_interval_secs: u64,
    #[serde(default = "default_jitter_millis")]
    pub jitter_millis: u64,
    #[serde(default = "default_group_creation_wait_secs")]
    pub group_creation_wait_secs: u64,
    #[serde(default = "default_team_creation_wait_secs")]
    pub team_creation_wait_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            lookup_retries: default_lookup_retries(),
            lookup_interval_secs: default_lookup_interval_secs(),
            jitter_millis: default_jitter_millis(),
            group_creation_wait_secs: default_group_creation_wait_secs(),
            team_creation_wait_secs: default_team_creation_wait_secs(),
        }
    }
}

impl RetrySettings {
    pub fn lookup_interval(&self) -> Duration {
        Duration::from_secs(self.lookup_interval_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_millis)
    }

    pub fn group_creation_wait(&self) -> Duration {
        Duration::from_secs(self.group_creation_wait_secs)
    }

    pub fn team_creation_wait(&self) -> Duration {
        Duration::from_secs(self.team_creation_wait_secs)
    }
}

/// Where template trees live. Paths are relative to the root of `drive_id`, or
/// of the default drive of `site_id` when no drive id is set. With neither set,
/// template copying is skipped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateSettings {
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default = "default_customer_template")]
    pub customer_path: String,
    #[serde(default = "default_supplier_template")]
    pub supplier_path: String,
    #[serde(default = "default_order_template")]
    pub order_path: String,
    #[serde(default = "default_project_template")]
    pub project_path: String,
    #[serde(default = "default_quote_template")]
    pub quote_path: String,
    #[serde(default = "default_purchase_template")]
    pub purchase_path: String,
    #[serde(default = "default_true")]
    pub include_files: bool,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            drive_id: None,
            site_id: None,
            customer_path: default_customer_template(),
            supplier_path: default_supplier_template(),
            order_path: default_order_template(),
            project_path: default_project_template(),
            quote_path: default_quote_template(),
            purchase_path: default_purchase_template(),
            include_files: true,
        }
    }
}

impl TemplateSettings {
    pub fn is_configured(&self) -> bool {
        self.drive_id.is_some() || self.site_id.is_some()
    }

    pub fn path_for_customer(&self, customer_type: CustomerType) -> &str {
        match customer_type {
            CustomerType::Customer => &self.customer_path,
            CustomerType::Supplier => &self.supplier_path,
        }
    }

    pub fn path_for_order(&self, order_type: OrderType) -> &str {
        match order_type {
            OrderType::Order => &self.order_path,
            OrderType::Project => &self.project_path,
            OrderType::Quote | OrderType::Offer => &self.quote_path,
            OrderType::Purchase => &self.purchase_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomerSettings {
    #[serde(default = "default_general_folder_name")]
    pub general_folder_name: String,
    #[serde(default = "default_true")]
    pub create_columns: bool,
    #[serde(default)]
    pub create_team: bool,
    #[serde(default)]
    pub team_app_id: Option<String>,
    #[serde(default)]
    pub owner_user_ids: Vec<String>,
}

impl Default for CustomerSettings {
    fn default() -> Self {
        Self {
            general_folder_name: default_general_folder_name(),
            create_columns: true,
            create_team: false,
            team_app_id: None,
            owner_user_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
    #[serde(default = "default_redelivery_delay_secs")]
    pub redelivery_delay_secs: u64,
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_deliveries: default_max_deliveries(),
            redelivery_delay_secs: default_redelivery_delay_secs(),
            poll_interval_millis: default_poll_interval_millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    DEFAULT_GRAPH_API_BASE.to_string()
}

fn default_token_env() -> String {
    DEFAULT_GRAPH_TOKEN_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_lookup_retries() -> u32 {
    2
}

fn default_lookup_interval_secs() -> u64 {
    10
}

fn default_jitter_millis() -> u64 {
    500
}

fn default_group_creation_wait_secs() -> u64 {
    60
}

fn default_team_creation_wait_secs() -> u64 {
    90
}

fn default_customer_template() -> String {
    "Templates/Customer".to_string()
}

fn default_supplier_template() -> String {
    "Templates/Supplier".to_string()
}

fn default_order_template() -> String {
    "Templates/Order".to_string()
}

fn default_project_template() -> String {
    "Templates/Project".to_string()
}

fn default_quote_template() -> String {
    "Templates/Offert".to_string()
}

fn default_purchase_template() -> String {
    "Templates/Inkop".to_string()
}

fn default_general_folder_name() -> String {
    "General".to_string()
}

fn default_max_deliveries() -> u32 {
    10
}

fn default_redelivery_delay_secs() -> u64 {
    300
}

fn default_poll_interval_millis() -> u64 {
    1000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Settings {
    /// Settings with every section at its default, rooted at `state_root`.
    pub fn with_state_root(state_root: &Path) -> Self {
        Self {
            state_root: state_root.to_path_buf(),
            database_path: state_root.join("provisio.db"),
            graph: GraphSettings::default(),
            retry: RetrySettings::default(),
            templates: TemplateSettings::default(),
            customer: CustomerSettings::default(),
            queue: QueueSettings::default(),
            logging: LoggingSettings::default(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        const NON_EMPTY: &str = "must be non-empty";
        const POSITIVE: &str = "must be greater than 0";

        if !self.state_root.is_absolute() {
            return Err(ConfigError::invalid("state_root", "must be an absolute path"));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("database_path", NON_EMPTY));
        }
        for (key, value) in [
            ("graph.api_base", &self.graph.api_base),
            ("graph.token_env", &self.graph.token_env),
            (
                "customer.general_folder_name",
                &self.customer.general_folder_name,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, NON_EMPTY));
            }
        }
        for (key, value) in [
            (
                "graph.request_timeout_secs",
                self.graph.request_timeout_secs,
            ),
            ("retry.lookup_interval_secs", self.retry.lookup_interval_secs),
            ("queue.max_deliveries", u64::from(self.queue.max_deliveries)),
            ("queue.poll_interval_millis", self.queue.poll_interval_millis),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, POSITIVE));
            }
        }
        for (key, path) in [
            ("customer_path", &self.templates.customer_path),
            ("supplier_path", &self.templates.supplier_path),
            ("order_path", &self.templates.order_path),
            ("project_path", &self.templates.project_path),
            ("quote_path", &self.templates.quote_path),
            ("purchase_path", &self.templates.purchase_path),
        ] {
            if path.trim().trim_matches('/').is_empty() {
                return Err(ConfigError::invalid(format!("templates.{key}"), NON_EMPTY));
            }
        }
        Ok(())
    }

    /// Relative database paths resolve under `state_root`.
    pub fn resolved_database_path(&self) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            self.state_root.join(&self.database_path)
        }
    }
}
