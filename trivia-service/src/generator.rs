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

use std::{fmt, sync::Arc};

use tracing::{error, info};
use trivia_common::{Difficulty, QuestionData};

use crate::collaborators::QuestionModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    ProviderUnavailable,
    Request(String),
    MalformedResponse(String),
    MissingField(&'static str),
}

impl GenerationError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Request(_) => "request_failed",
            Self::MalformedResponse(_) => "malformed_response",
            Self::MissingField(_) => "missing_field",
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable => write!(f, "no language model provider configured"),
            Self::Request(detail) => write!(f, "language model request failed: {detail}"),
            Self::MalformedResponse(detail) => write!(f, "malformed question data: {detail}"),
            Self::MissingField(field) => write!(f, "question data is missing `{field}`"),
        }
    }
}

#[derive(Clone)]
pub struct QuestionGenerator {
    model: Option<Arc<dyn QuestionModel>>,
}

impl QuestionGenerator {
    pub fn new(model: Option<Arc<dyn QuestionModel>>) -> Self {
        Self { model }
    }

    /// One model call, no retries.
    pub async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionData, GenerationError> {
        let Some(model) = &self.model else {
            return Err(GenerationError::ProviderUnavailable);
        };

        let prompt = build_prompt(topic, difficulty);
        let raw = model.text_chat(&prompt).await.map_err(|error| {
            error!(topic = %topic, error = %error, "language model call failed");
            GenerationError::Request(format!("{error:#}"))
        })?;

        let question = parse_question(&raw).inspect_err(|error| {
            error!(
                topic = %topic,
                error = %error,
                raw_response = %raw,
                "failed to parse generated question"
            );
        })?;

        info!(
            topic = %topic,
            difficulty = difficulty.label(),
            answer_count = question.candidate_answers.len(),
            hint_count = question.hints.len(),
            "generated trivia question"
        );
        Ok(question)
    }
}

pub fn build_prompt(topic: &str, difficulty: Difficulty) -> String {
    let difficulty = difficulty.label();
    format!(
        r#"请你扮演一个知识渊博的出题人，为我设计一个猜题题目。
# 核心要求
1. 题目领域必须是关于：【{topic}】。
2. 题目难度必须是：【{difficulty}】。
3. "description" 字段的内容，最后必须以一个明确的疑问句结尾。
4. 只输出一个 JSON 对象，不要输出任何其他文字。
# JSON格式定义
{{
  "description": "请用一段生动的描述引出问题，并确保描述的最后是一个明确的疑问句（例如：'这是什么现象？'、'这位人物是谁？'）。",
  "candidate_answers": ["答案1", "答案2", "..."],
  "difficulty": "这里必须填写我为你指定的难度：【{difficulty}】。",
  "hints": ["关于答案的第一个提示", "第二个更明显的提示", "最后一个决定性的提示"]
}}
# "candidate_answers" 字段填写指南
请在这个字段中，尽可能全面地列出所有可能的正确答案，包括但不限于：
- 官方全称
- 常用简称或缩写（例如 "AI"）
- 别名或昵称
- 不同语言的常见翻译（例如 "Artificial Intelligence"）
- 包含或不包含空格/标点的形式
例如，对于"人工智能"，此字段应为 ["人工智能", "AI", "Artificial Intelligence"]。
对于"中华人民共和国"，此字段应为 ["中华人民共和国", "中国", "People's Republic of China", "PRC"]。
现在，请严格按照以上所有要求出题。"#
    )
}

/// Removes an optional Markdown code fence around the payload.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}

pub fn parse_question(raw: &str) -> Result<QuestionData, GenerationError> {
    let cleaned = strip_code_fence(raw);
    let mut value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|error| GenerationError::MalformedResponse(error.to_string()))?;

    {
        let object = value.as_object_mut().ok_or_else(|| {
            GenerationError::MalformedResponse("expected a JSON object".to_string())
        })?;
        for (key, legacy_key) in QuestionData::REQUIRED_FIELDS {
            match (object.contains_key(key), object.contains_key(legacy_key)) {
                (false, false) => return Err(GenerationError::MissingField(key)),
                // English key wins when both are present.
                (true, true) => {
                    object.remove(legacy_key);
                }
                _ => {}
            }
        }
    }

    let question: QuestionData = serde_json::from_value(value)
        .map_err(|error| GenerationError::MalformedResponse(error.to_string()))?;
    if question
        .candidate_answers
        .iter()
        .all(|answer| answer.trim().is_empty())
    {
        return Err(GenerationError::MalformedResponse(
            "no candidate answers".to_string(),
        ));
    }

    Ok(question)
}
