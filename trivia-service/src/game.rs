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

use std::{fmt, sync::Arc, time::Duration};

use chrono::{Local, Utc};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use trivia_common::{
    ChatCommand, CommandAliases, Difficulty, GAME_TIMEOUT_SECONDS, best_match, is_match,
    random_topic,
};
use uuid::Uuid;

use crate::{
    collaborators::MessageSender,
    generator::{GenerationError, QuestionGenerator},
    rewards::{RewardCalculator, RewardOutcome},
    store::{ActiveGame, GameRecord, GameStore, Settlement, StoreError, TimeoutHandle},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    AlreadyActive,
    NoActiveGame,
    Generation(GenerationError),
}

impl GameError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "already_active",
            Self::NoActiveGame => "no_active_game",
            Self::Generation(error) => error.as_str(),
        }
    }
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "a game is already running in this group"),
            Self::NoActiveGame => write!(f, "no game is running in this group"),
            Self::Generation(error) => write!(f, "{error}"),
        }
    }
}

impl From<StoreError> for GameError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::AlreadyActive => Self::AlreadyActive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartedGame {
    pub game_id: String,
    pub topic: String,
    pub difficulty: String,
    pub announcement: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct {
        matched_answer: String,
        reward: RewardOutcome,
        reply: String,
    },
    Incorrect {
        reply: String,
    },
}

impl AnswerOutcome {
    pub fn reply(&self) -> &str {
        match self {
            Self::Correct { reply, .. } | Self::Incorrect { reply } => reply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintOutcome {
    Hint { number: usize, text: String },
    Exhausted,
}

impl HintOutcome {
    pub fn reply(&self) -> String {
        match self {
            Self::Hint { number, text } => format!("🤫 提示来啦 (第{number}条)：\n{text}"),
            Self::Exhausted => "🤔 所有的提示都已经给完啦，靠你自己咯！".to_string(),
        }
    }
}

/// Owns the lifecycle of every group's game: start, answer, hint, early end,
/// timeout and teardown. Cheap to clone; timer tasks hold their own clone.
#[derive(Clone)]
pub struct GameController {
    store: Arc<GameStore>,
    generator: QuestionGenerator,
    rewards: RewardCalculator,
    messenger: Arc<dyn MessageSender>,
    topics: Arc<Vec<String>>,
    commands: Arc<CommandAliases>,
    game_timeout: Duration,
}

impl GameController {
    pub fn new(
        store: Arc<GameStore>,
        generator: QuestionGenerator,
        rewards: RewardCalculator,
        messenger: Arc<dyn MessageSender>,
        topics: Vec<String>,
        commands: CommandAliases,
    ) -> Self {
        Self {
            store,
            generator,
            rewards,
            messenger,
            topics: Arc::new(topics),
            commands: Arc::new(commands),
            game_timeout: Duration::from_secs(GAME_TIMEOUT_SECONDS),
        }
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn commands(&self) -> &CommandAliases {
        &self.commands
    }

    pub fn game_timeout(&self) -> Duration {
        self.game_timeout
    }

    pub async fn start_game(&self, group_id: &str, origin: &str) -> Result<StartedGame, GameError> {
        if self.store.is_active(group_id).await {
            return Err(GameError::AlreadyActive);
        }

        let topic = random_topic(&self.topics)
            .unwrap_or(trivia_common::DEFAULT_TOPICS[0])
            .to_string();
        let difficulty = Difficulty::random();
        info!(
            group_id = %group_id,
            topic = %topic,
            difficulty = difficulty.label(),
            "generating trivia question"
        );

        let question = self
            .generator
            .generate(&topic, difficulty)
            .await
            .map_err(GameError::Generation)?;

        let game_id = Uuid::new_v4().to_string();
        let shown_difficulty = if question.difficulty.trim().is_empty() {
            difficulty.label().to_string()
        } else {
            question.difficulty.trim().to_string()
        };
        let game = ActiveGame {
            game_id: game_id.clone(),
            origin: origin.to_string(),
            topic: topic.clone(),
            question_text: question.description,
            candidate_answers: question.candidate_answers,
            difficulty: shown_difficulty.clone(),
            hints: question.hints,
            hints_given: 0,
            active: true,
            started_at: Utc::now(),
        };
        let announcement = self.announcement_text(&game);

        let timeout = self.schedule_timeout(group_id, &game_id);
        self.store.put(group_id, GameRecord { game, timeout }).await?;

        info!(
            group_id = %group_id,
            game_id = %game_id,
            timeout_secs = self.game_timeout.as_secs(),
            "trivia game started"
        );
        Ok(StartedGame {
            game_id,
            topic,
            difficulty: shown_difficulty,
            announcement,
        })
    }

    /// `None` means the message is not for this game and must pass through.
    pub async fn submit_answer(
        &self,
        group_id: &str,
        user_id: &str,
        user_name: &str,
        text: &str,
    ) -> Option<AnswerOutcome> {
        let submitted = text.trim();
        if submitted.is_empty() {
            return None;
        }

        let mut record = match self
            .store
            .take_active_if(group_id, |game| is_match(submitted, &game.candidate_answers))
            .await
        {
            Settlement::Absent => return None,
            Settlement::Retained => {
                return Some(AnswerOutcome::Incorrect {
                    reply: format!("🤔 “{submitted}”似乎不是正确答案哦，再想想吧！"),
                });
            }
            Settlement::Taken(record) => record,
        };
        record.timeout.cancel();
        info!(
            group_id = %group_id,
            game_id = %record.game.game_id,
            user_id = %user_id,
            hints_given = record.game.hints_given,
            "trivia game solved"
        );

        // The record is already gone from the store; finish paying out even if
        // the caller stops polling.
        let settlement = tokio::spawn(settle_correct_answer(
            self.rewards.clone(),
            record.game,
            user_id.to_string(),
            user_name.to_string(),
            submitted.to_string(),
        ));
        match settlement.await {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                error!(
                    group_id = %group_id,
                    user_id = %user_id,
                    error = %error,
                    "answer settlement task failed"
                );
                None
            }
        }
    }

    pub async fn get_hint(&self, group_id: &str) -> Option<HintOutcome> {
        self.store
            .with_active(group_id, |game| {
                let Some(text) = game.hints.get(game.hints_given).cloned() else {
                    return HintOutcome::Exhausted;
                };
                game.hints_given += 1;
                HintOutcome::Hint {
                    number: game.hints_given,
                    text,
                }
            })
            .await
    }

    pub async fn end_game(&self, group_id: &str, user_name: &str) -> Result<String, GameError> {
        let mut record = self
            .store
            .take_active(group_id, None)
            .await
            .ok_or(GameError::NoActiveGame)?;
        record.timeout.cancel();
        info!(
            group_id = %group_id,
            game_id = %record.game.game_id,
            "trivia game ended early"
        );

        Ok(format!(
            "应 @{user_name} 的要求，本轮猜题已提前结束。\n正确答案是：【{}】",
            join_answers(&record.game.candidate_answers)
        ))
    }

    /// Settles the game when its timer fires. Returns whether this call
    /// settled it; a game already settled elsewhere is left alone.
    pub(crate) async fn on_timeout(&self, group_id: &str, game_id: &str) -> anyhow::Result<bool> {
        let Some(record) = self.store.take_active(group_id, Some(game_id)).await else {
            info!(group_id = %group_id, game_id = %game_id, "timer fired after game was settled");
            return Ok(false);
        };

        info!(group_id = %group_id, game_id = %game_id, "trivia game timed out");
        let message = format!(
            "⌛️ 时间到！很遗憾没有人答出来呢。\n公布答案：【{}】\n下次继续努力哦！",
            join_answers(&record.game.candidate_answers)
        );
        self.messenger
            .send_message(&record.game.origin, &message)
            .await?;
        Ok(true)
    }

    /// Cancels every pending timer and clears the store.
    pub async fn teardown(&self) {
        let active = self.store.list_active().await.len();
        info!(active_games = active, "tearing down trivia games");
        for (group_id, mut record) in self.store.drain().await {
            if !record.timeout.is_finished() {
                record.timeout.cancel();
                info!(group_id = %group_id, game_id = %record.game.game_id, "game timer stopped on teardown");
            }
        }
        info!("all trivia game state cleared");
    }

    fn help_line(&self) -> String {
        format!(
            "💡 仍然可以使用 `{}` 或 `{}`。",
            self.commands.display(ChatCommand::Hint),
            self.commands.display(ChatCommand::EndGame)
        )
    }

    fn announcement_text(&self, game: &ActiveGame) -> String {
        format!(
            "🎉 猜题游戏开始啦！(领域: {} | 难度: {})\n--------------------\n题目：\n{}\n--------------------\n⏱️ 你有 {} 秒的时间回答！\n👉 直接在群里说出你的答案即可！\n{}",
            game.topic,
            game.difficulty,
            game.question_text,
            self.game_timeout.as_secs(),
            self.help_line()
        )
    }

    fn schedule_timeout(&self, group_id: &str, game_id: &str) -> TimeoutHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let controller = self.clone();
        let group_id = group_id.to_string();
        let game_id = game_id.to_string();
        let duration = self.game_timeout;

        let join = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    if let Err(error) = controller.on_timeout(&group_id, &game_id).await {
                        error!(
                            group_id = %group_id,
                            game_id = %game_id,
                            error = %error,
                            "timeout handling failed"
                        );
                        if controller.store.take_active(&group_id, Some(&game_id)).await.is_some() {
                            warn!(group_id = %group_id, game_id = %game_id, "removed stuck game after timeout failure");
                        }
                    }
                }
                _ = cancel_rx => {
                    info!(group_id = %group_id, game_id = %game_id, "game timer cancelled");
                }
            }
        });

        TimeoutHandle::new(cancel_tx, join)
    }
}

async fn settle_correct_answer(
    rewards: RewardCalculator,
    game: ActiveGame,
    user_id: String,
    user_name: String,
    submitted: String,
) -> AnswerOutcome {
    let reward = rewards
        .compute_reward(game.hints_given, &user_id, Local::now().date_naive())
        .await;
    let matched_answer = best_match(&submitted, &game.candidate_answers)
        .map(|(answer, _)| answer.to_string())
        .unwrap_or(submitted);
    let reply = format!(
        "🎉 恭喜 @{user_name} 回答正确！\n💡 正确答案就是：【{matched_answer}】\n😎 {}",
        reward.message
    );

    AnswerOutcome::Correct {
        matched_answer,
        reward,
        reply,
    }
}

fn join_answers(answers: &[String]) -> String {
    answers.join("、")
}
