use std::{collections::HashMap, fs, path::Path};

use client_core::transport::DEFAULT_API_BASE_URL;
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = "exam_cli.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub course_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_url: "sqlite://./data/exam_cli.db".into(),
            token: None,
            user_id: None,
            course_id: None,
        }
    }
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub course_id: Option<String>,
}

impl Settings {
    fn apply_file(&mut self, raw: &str) {
        let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => file_cfg,
            Err(err) => {
                warn!(error = %err, "ignoring malformed config file");
                return;
            }
        };
        if let Some(v) = file_cfg.get("api_base_url") {
            self.api_base_url = v.clone();
        }
        if let Some(v) = file_cfg.get("database_url") {
            self.database_url = v.clone();
        }
        if let Some(v) = file_cfg.get("token") {
            self.token = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("user_id") {
            self.user_id = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("course_id") {
            self.course_id = Some(v.clone());
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("EXAM_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = var("APP__API_BASE_URL") {
            self.api_base_url = v;
        }

        if let Some(v) = var("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = var("EXAM_TOKEN") {
            self.token = Some(v);
        }
        if let Some(v) = var("APP__TOKEN") {
            self.token = Some(v);
        }

        if let Some(v) = var("APP__USER_ID") {
            self.user_id = Some(v);
        }
        if let Some(v) = var("APP__COURSE_ID") {
            self.course_id = Some(v);
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = overrides.database_url {
            self.database_url = v;
        }
        if overrides.token.is_some() {
            self.token = overrides.token;
        }
        if overrides.user_id.is_some() {
            self.user_id = overrides.user_id;
        }
        if overrides.course_id.is_some() {
            self.course_id = overrides.course_id;
        }
    }
}

pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    match fs::read_to_string(config_path) {
        Ok(raw) => settings.apply_file(&raw),
        Err(err) => debug!(path = %config_path.display(), error = %err, "no config file loaded"),
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

/// Accepts bare file paths and `sqlite:path` as well as full urls. The
/// storage layer creates the file's directory when it opens the database.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
