pub mod error;
pub mod load;
pub mod paths;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_settings, save_settings};
pub use paths::{
    default_global_config_path, default_global_state_root, CONFIG_PATH_ENV,
    GLOBAL_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR,
};
pub use settings::{
    CustomerSettings, GraphSettings, LoggingSettings, QueueSettings, RetrySettings, Settings,
    TemplateSettings, DEFAULT_GRAPH_API_BASE, DEFAULT_GRAPH_TOKEN_ENV,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioning::naming::OrderType;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn minimal_settings_fill_every_section_with_defaults() {
        let settings: Settings = serde_yaml::from_str(
            r#"
state_root: /tmp/provisio
database_path: provisio.db
"#,
        )
        .expect("parse settings");

        settings.validate().expect("valid settings");
        assert_eq!(settings.graph.api_base, DEFAULT_GRAPH_API_BASE);
        assert_eq!(settings.retry.lookup_retries, 2);
        assert_eq!(settings.retry.lookup_interval_secs, 10);
        assert_eq!(settings.retry.group_creation_wait_secs, 60);
        assert_eq!(settings.retry.team_creation_wait_secs, 90);
        assert_eq!(settings.customer.general_folder_name, "General");
        assert!(settings.templates.include_files);
        assert_eq!(
            settings.resolved_database_path(),
            PathBuf::from("/tmp/provisio/provisio.db")
        );
    }

    #[test]
    fn relative_state_root_is_rejected() {
        let settings: Settings = serde_yaml::from_str(
            r#"
state_root: relative/state
database_path: provisio.db
"#,
        )
        .expect("parse settings");

        let err = settings.validate().expect_err("relative root must fail");
        assert!(err.to_string().contains("state_root"));
    }

    #[test]
    fn zero_lookup_interval_is_rejected() {
        let mut settings = Settings::with_state_root(&PathBuf::from("/tmp/provisio"));
        settings.retry.lookup_interval_secs = 0;
        let err = settings.validate().expect_err("zero interval must fail");
        assert!(err.to_string().contains("lookup_interval_secs"));
    }

    #[test]
    fn template_paths_follow_order_type() {
        let templates = TemplateSettings::default();
        assert_eq!(
            templates.path_for_order(OrderType::Order),
            "Templates/Order"
        );
        assert_eq!(
            templates.path_for_order(OrderType::Offer),
            "Templates/Offert"
        );
        assert_eq!(
            templates.path_for_order(OrderType::Quote),
            "Templates/Offert"
        );
        assert_eq!(
            templates.path_for_order(OrderType::Purchase),
            "Templates/Inkop"
        );
    }

    #[test]
    fn save_then_load_keeps_overrides() {
        let temp = tempdir().expect("tempdir");
        let mut settings = Settings::with_state_root(temp.path());
        settings.customer.create_team = true;
        settings.queue.max_deliveries = 3;
        let path = temp.path().join("config.yaml");

        save_settings(&settings, &path).expect("save settings");
        let loaded = load_settings(&path).expect("load settings");
        assert!(loaded.customer.create_team);
        assert_eq!(loaded.queue.max_deliveries, 3);
    }

    #[test]
    fn config_path_env_overrides_home_location() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let temp = tempdir().expect("tempdir");
        let custom = temp.path().join("custom.yaml");
        std::env::set_var(CONFIG_PATH_ENV, &custom);
        let resolved = default_global_config_path().expect("resolve path");
        std::env::remove_var(CONFIG_PATH_ENV);
        assert_eq!(resolved, custom);
    }
}
