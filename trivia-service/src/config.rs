// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};
use trivia_common::{CommandAliases, DEFAULT_ECONOMY_WAIT_SECONDS, default_topics, expand_env_vars};

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TriviaConfig {
    pub bind_addr: SocketAddr,
    pub llm: Option<LlmConfig>,
    pub economy_base_url: Option<String>,
    pub economy_wait: Duration,
    pub host_base_url: String,
    pub topics: Vec<String>,
    pub commands: CommandAliases,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TriviaConfigFile {
    #[serde(default)]
    topics: Option<Vec<String>>,
    #[serde(default)]
    command_prefix: Option<String>,
    #[serde(default)]
    start_aliases: Option<Vec<String>>,
    #[serde(default)]
    hint_aliases: Option<Vec<String>>,
    #[serde(default)]
    end_aliases: Option<Vec<String>>,
}

impl TriviaConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let llm = normalize_optional_string(std::env::var("TRIVIA_LLM_BASE_URL").ok()).map(
            |base_url| LlmConfig {
                base_url,
                model: normalize_optional_string(std::env::var("TRIVIA_LLM_MODEL").ok())
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
                api_key: normalize_optional_string(std::env::var("TRIVIA_LLM_API_KEY").ok()),
                timeout_ms: parse_env_u64("TRIVIA_LLM_TIMEOUT_MS", 60000).max(1),
            },
        );

        let mut config = Self {
            bind_addr: parse_bind_addr("TRIVIA_BIND", "0.0.0.0:8095")?,
            llm,
            economy_base_url: normalize_optional_string(
                std::env::var("TRIVIA_ECONOMY_BASE_URL").ok(),
            ),
            economy_wait: Duration::from_secs(parse_env_u64(
                "TRIVIA_ECONOMY_WAIT_SECONDS",
                DEFAULT_ECONOMY_WAIT_SECONDS,
            )),
            host_base_url: std::env::var("TRIVIA_HOST_BASE_URL")
                .ok()
                .unwrap_or_else(|| "http://bot-host:6185".to_string()),
            topics: default_topics(),
            commands: CommandAliases::default(),
        };

        let path = normalize_optional_string(std::env::var("TRIVIA_CONFIG_PATH").ok());
        if let Some(file) = load_config_file(path.as_deref()) {
            config.apply_file(file);
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: TriviaConfigFile) {
        if let Some(topics) = non_empty_list(file.topics) {
            self.topics = topics;
        }
        if let Some(prefix) = file.command_prefix {
            self.commands.prefix = prefix.trim().to_string();
        }
        if let Some(start) = non_empty_list(file.start_aliases) {
            self.commands.start = start;
        }
        if let Some(hint) = non_empty_list(file.hint_aliases) {
            self.commands.hint = hint;
        }
        if let Some(end) = non_empty_list(file.end_aliases) {
            self.commands.end = end;
        }
    }
}

fn load_config_file(path: Option<&str>) -> Option<TriviaConfigFile> {
    let path = path.map(str::trim).filter(|value| !value.is_empty())?;

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read trivia config file");
            return None;
        }
    };

    let expanded = expand_env_vars(&raw);
    match serde_yaml::from_str::<TriviaConfigFile>(&expanded) {
        Ok(parsed) => {
            info!(
                path = %path,
                topic_count = parsed.topics.as_ref().map(Vec::len).unwrap_or(0),
                "loaded trivia config file"
            );
            Some(parsed)
        }
        Err(error) => {
            warn!(path = %path, error = %error, "failed to parse trivia config yaml");
            None
        }
    }
}

fn non_empty_list(values: Option<Vec<String>>) -> Option<Vec<String>> {
    let values: Vec<String> = values?
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() { None } else { Some(values) }
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}

fn parse_env_u64(var_name: &str, default: u64) -> u64 {
    std::env::var(var_name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}
