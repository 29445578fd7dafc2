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

use tracing::{debug, info};
use trivia_common::{ChatCommand, ChatEvent, EventOutcome};

use crate::{
    game::{GameController, GameError},
    generator::GenerationError,
};

pub const GROUP_ONLY_REPLY: &str = "这个游戏只能在群聊里玩哦～";
pub const ALREADY_ACTIVE_REPLY: &str = "当前群里已经有一个猜题游戏正在进行啦！";
pub const PREPARING_REPLY: &str = "正在随机挑选领域和难度，请稍等...";
pub const MODEL_UNAVAILABLE_REPLY: &str = "哎呀，获取大语言模型失败了，暂时无法出题。";
pub const GENERATION_FAILED_REPLY: &str = "糟糕，我想题目的时候走神了，没想好。再试一次吧！";
pub const NO_GAME_REPLY: &str = "当前没有正在进行的猜题游戏哦。";

/// Routes one chat event to the matching game operation.
pub async fn handle_chat_event(controller: &GameController, event: ChatEvent) -> EventOutcome {
    let group_id = event
        .group_id
        .as_deref()
        .map(str::trim)
        .filter(|group_id| !group_id.is_empty());

    match controller.commands().parse(&event.message) {
        Some(ChatCommand::StartGame) => {
            let Some(group_id) = group_id else {
                return EventOutcome::consumed(GROUP_ONLY_REPLY.to_string());
            };
            start_game(controller, group_id, &event.origin).await
        }
        Some(ChatCommand::Hint) => {
            let Some(group_id) = group_id else {
                return EventOutcome::ignored();
            };
            match controller.get_hint(group_id).await {
                Some(hint) => EventOutcome::consumed(hint.reply()),
                None => EventOutcome::ignored(),
            }
        }
        Some(ChatCommand::EndGame) => {
            let Some(group_id) = group_id else {
                return EventOutcome::consumed(NO_GAME_REPLY.to_string());
            };
            match controller.end_game(group_id, display_name(&event)).await {
                Ok(reveal) => EventOutcome::consumed(reveal),
                Err(_) => EventOutcome::consumed(NO_GAME_REPLY.to_string()),
            }
        }
        None => {
            let Some(group_id) = group_id else {
                return EventOutcome::ignored();
            };
            match controller
                .submit_answer(group_id, &event.sender_id, display_name(&event), &event.message)
                .await
            {
                Some(outcome) => EventOutcome::consumed(outcome.reply().to_string()),
                None => EventOutcome::ignored(),
            }
        }
    }
}

async fn start_game(controller: &GameController, group_id: &str, origin: &str) -> EventOutcome {
    if controller.store().is_active(group_id).await {
        return EventOutcome::consumed(ALREADY_ACTIVE_REPLY.to_string());
    }

    let mut replies = vec![PREPARING_REPLY.to_string()];
    match controller.start_game(group_id, origin).await {
        Ok(started) => {
            info!(
                group_id = %group_id,
                game_id = %started.game_id,
                topic = %started.topic,
                difficulty = %started.difficulty,
                "announced trivia question"
            );
            replies.push(started.announcement);
        }
        Err(GameError::AlreadyActive) => {
            return EventOutcome::consumed(ALREADY_ACTIVE_REPLY.to_string());
        }
        Err(GameError::Generation(GenerationError::ProviderUnavailable)) => {
            replies.push(MODEL_UNAVAILABLE_REPLY.to_string());
        }
        Err(error) => {
            debug!(group_id = %group_id, code = error.as_str(), error = %error, "start game failed");
            replies.push(GENERATION_FAILED_REPLY.to_string());
        }
    }

    EventOutcome {
        replies,
        stop_propagation: true,
    }
}

fn display_name(event: &ChatEvent) -> &str {
    let name = event.sender_name.trim();
    if name.is_empty() {
        event.sender_id.as_str()
    } else {
        name
    }
}
