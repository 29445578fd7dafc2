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

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

pub mod reward;
pub mod similarity;

pub use reward::{DailyRewardCounter, decayed_reward};
pub use similarity::{best_match, is_match, normalize, ratio};

pub const GAME_TIMEOUT_SECONDS: u64 = 60;
pub const SIMILARITY_THRESHOLD: f64 = 0.85;
pub const BASE_REWARD: u32 = 100;
pub const DAILY_REWARD_CAP: u32 = 1000;
pub const REWARD_REASON: &str = "猜题游戏胜利";
pub const DEFAULT_ECONOMY_WAIT_SECONDS: u64 = 30;

pub const DEFAULT_TOPICS: [&str; 20] = [
    "历史",
    "地理",
    "文学",
    "艺术",
    "音乐",
    "电影",
    "数学",
    "物理",
    "化学",
    "生物",
    "天文学",
    "计算机科学",
    "编程",
    "体育",
    "动漫",
    "游戏",
    "生活常识",
    "冷知识",
    "语言学",
    "神话传说",
];

pub type GroupId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Simple,
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Simple, Difficulty::Normal, Difficulty::Hard];

    pub fn label(self) -> &'static str {
        match self {
            Self::Simple => "简单",
            Self::Normal => "普通",
            Self::Hard => "困难",
        }
    }

    /// Selection weight out of 100.
    pub fn weight(self) -> u8 {
        match self {
            Self::Simple => 30,
            Self::Normal => 50,
            Self::Hard => 20,
        }
    }

    /// Maps a roll in `0..100` onto the weighted difficulty table.
    pub fn from_roll(roll: u8) -> Self {
        let mut upper = 0_u8;
        for difficulty in Self::ALL {
            upper = upper.saturating_add(difficulty.weight());
            if roll < upper {
                return difficulty;
            }
        }
        Self::Hard
    }

    pub fn random() -> Self {
        let roll: u8 = rand::rng().random_range(0..100);
        Self::from_roll(roll)
    }
}

/// Uniform pick from the configured topics.
pub fn random_topic(topics: &[String]) -> Option<&str> {
    if topics.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..topics.len());
    topics.get(index).map(String::as_str)
}

pub fn default_topics() -> Vec<String> {
    DEFAULT_TOPICS.iter().map(|topic| topic.to_string()).collect()
}

/// Structured question data produced by the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionData {
    #[serde(alias = "题目描述")]
    pub description: String,
    #[serde(alias = "题目可能的答案", deserialize_with = "string_list")]
    pub candidate_answers: Vec<String>,
    #[serde(alias = "题目难度")]
    pub difficulty: String,
    #[serde(alias = "答案提示", deserialize_with = "string_list")]
    pub hints: Vec<String>,
}

impl QuestionData {
    /// Required keys paired with the legacy key accepted in their place.
    pub const REQUIRED_FIELDS: [(&'static str, &'static str); 4] = [
        ("description", "题目描述"),
        ("candidate_answers", "题目可能的答案"),
        ("difficulty", "题目难度"),
        ("hints", "答案提示"),
    ];
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(text) => Ok(text),
            serde_json::Value::Number(number) => Ok(number.to_string()),
            other => Err(D::Error::custom(format!(
                "expected string or number entry, got {other}"
            ))),
        })
        .collect()
}

/// A chat message forwarded by the host before any model call is made for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message: String,
    /// Host conversation address used for asynchronous broadcasts.
    pub origin: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventOutcome {
    pub replies: Vec<String>,
    /// When set, no other consumer in the host should process the message.
    pub stop_propagation: bool,
}

impl EventOutcome {
    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn consumed(reply: String) -> Self {
        Self {
            replies: vec![reply],
            stop_propagation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatCommand {
    StartGame,
    Hint,
    EndGame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandAliases {
    pub prefix: String,
    pub start: Vec<String>,
    pub hint: Vec<String>,
    pub end: Vec<String>,
}

impl Default for CommandAliases {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            start: vec!["猜题".to_string(), "出题".to_string()],
            hint: vec!["提示".to_string()],
            end: vec!["结束答题".to_string(), "结束".to_string()],
        }
    }
}

impl CommandAliases {
    pub fn parse(&self, message: &str) -> Option<ChatCommand> {
        let body = message.trim().strip_prefix(self.prefix.as_str())?;
        let name = body.split_whitespace().next()?;
        let matches = |aliases: &[String]| aliases.iter().any(|alias| alias == name);

        if matches(&self.start) {
            Some(ChatCommand::StartGame)
        } else if matches(&self.hint) {
            Some(ChatCommand::Hint)
        } else if matches(&self.end) {
            Some(ChatCommand::EndGame)
        } else {
            None
        }
    }

    /// Primary name of a command including the prefix, for help texts.
    pub fn display(&self, command: ChatCommand) -> String {
        let aliases = match command {
            ChatCommand::StartGame => &self.start,
            ChatCommand::Hint => &self.hint,
            ChatCommand::EndGame => &self.end,
        };
        let name = aliases.first().map(String::as_str).unwrap_or("");
        format!("{}{}", self.prefix, name)
    }
}

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

/// Public view of a group's running game. Never carries the answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStatusResponse {
    pub group_id: GroupId,
    pub game_id: String,
    pub topic: String,
    pub difficulty: String,
    pub question: String,
    pub hints_given: usize,
    pub hints_total: usize,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn difficulty_rolls_follow_weight_table() {
        assert_eq!(Difficulty::from_roll(0), Difficulty::Simple);
        assert_eq!(Difficulty::from_roll(29), Difficulty::Simple);
        assert_eq!(Difficulty::from_roll(30), Difficulty::Normal);
        assert_eq!(Difficulty::from_roll(79), Difficulty::Normal);
        assert_eq!(Difficulty::from_roll(80), Difficulty::Hard);
        assert_eq!(Difficulty::from_roll(99), Difficulty::Hard);

        let total: u32 = Difficulty::ALL.iter().map(|d| d.weight() as u32).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn random_difficulty_covers_every_level() {
        let mut seen: HashMap<Difficulty, usize> = HashMap::new();
        for _ in 0..2000 {
            *seen.entry(Difficulty::random()).or_default() += 1;
        }
        assert_eq!(seen.len(), 3);
        assert!(seen[&Difficulty::Normal] > seen[&Difficulty::Hard]);
    }

    #[test]
    fn random_topic_picks_from_list() {
        let topics = default_topics();
        let topic = random_topic(&topics).unwrap();
        assert!(topics.iter().any(|candidate| candidate == topic));
        assert!(random_topic(&[]).is_none());
    }

    #[test]
    fn question_data_accepts_legacy_keys_and_numbers() {
        let raw = r#"{
            "题目描述": "一年有几个月？",
            "题目可能的答案": [12, "十二"],
            "题目难度": "简单",
            "答案提示": ["比十大", "是偶数"]
        }"#;
        let data: QuestionData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.candidate_answers, vec!["12", "十二"]);
        assert_eq!(data.hints.len(), 2);
        assert_eq!(data.difficulty, "简单");
    }

    #[test]
    fn question_data_rejects_nested_entries() {
        let raw = r#"{
            "description": "?",
            "candidate_answers": [["a"]],
            "difficulty": "困难",
            "hints": []
        }"#;
        assert!(serde_json::from_str::<QuestionData>(raw).is_err());
    }

    #[test]
    fn command_aliases_parse_prefixed_names() {
        let aliases = CommandAliases::default();
        assert_eq!(aliases.parse("/猜题"), Some(ChatCommand::StartGame));
        assert_eq!(aliases.parse("  /出题  "), Some(ChatCommand::StartGame));
        assert_eq!(aliases.parse("/提示"), Some(ChatCommand::Hint));
        assert_eq!(aliases.parse("/结束答题"), Some(ChatCommand::EndGame));
        assert_eq!(aliases.parse("/结束 现在"), Some(ChatCommand::EndGame));
        assert_eq!(aliases.parse("猜题"), None);
        assert_eq!(aliases.parse("/help"), None);
        assert_eq!(aliases.parse("/"), None);
        assert_eq!(aliases.display(ChatCommand::Hint), "/提示");
    }

    #[test]
    fn expand_env_vars_replaces_unknown_with_empty() {
        let expanded = expand_env_vars("a${TRIVIA_TEST_SURELY_UNSET_VAR}b");
        assert_eq!(expanded, "ab");
    }
}
