use std::{collections::HashMap, fs};

use client_core::BuzzerPolicy;
use shared::domain::Role;

const SETTINGS_FILE: &str = "scoreboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub role: Role,
    pub buzzer_policy: BuzzerPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            role: Role::Viewer,
            buzzer_policy: BuzzerPolicy::SkipInitial,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(role) = std::env::var("APP__ROLE").ok().and_then(|v| v.parse().ok()) {
        settings.role = role;
    }
    if let Some(policy) = std::env::var("APP__BUZZER_POLICY")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        settings.buzzer_policy = policy;
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(role) = file_cfg.get("role").and_then(|v| v.parse().ok()) {
        settings.role = role;
    }
    if let Some(policy) = file_cfg.get("buzzer_policy").and_then(|v| v.parse().ok()) {
        settings.buzzer_policy = policy;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
