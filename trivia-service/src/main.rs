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

mod collaborators;
mod config;
mod dispatch;
mod game;
mod generator;
mod rewards;
mod store;
#[cfg(test)]
mod testing;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use trivia_common::{ChatEvent, EventOutcome, GameStatusResponse};

use crate::{
    collaborators::{
        EconomyApi, HttpEconomyApi, HttpMessageSender, OpenAiChatModel, QuestionModel,
        wait_for_economy,
    },
    config::TriviaConfig,
    game::GameController,
    generator::QuestionGenerator,
    rewards::RewardCalculator,
    store::GameStore,
};

#[derive(Clone)]
struct AppState {
    controller: GameController,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "trivia_service=debug,tower_http=info".to_string()),
        )
        .init();

    let config = TriviaConfig::from_env()?;
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;

    let model = match &config.llm {
        Some(llm) => {
            info!(base_url = %llm.base_url, model = %llm.model, "language model configured");
            Some(Arc::new(OpenAiChatModel::new(client.clone(), llm)) as Arc<dyn QuestionModel>)
        }
        None => {
            warn!("TRIVIA_LLM_BASE_URL not set; games cannot be started");
            None
        }
    };

    let rewards = RewardCalculator::new();
    let controller = GameController::new(
        Arc::new(GameStore::default()),
        QuestionGenerator::new(model),
        rewards.clone(),
        Arc::new(HttpMessageSender::new(
            client.clone(),
            config.host_base_url.clone(),
        )),
        config.topics.clone(),
        config.commands.clone(),
    );

    match config.economy_base_url.clone() {
        Some(base_url) => {
            let economy: Arc<dyn EconomyApi> = Arc::new(HttpEconomyApi::new(client, base_url));
            let wait = config.economy_wait;
            tokio::spawn(async move {
                let Some(economy) = wait_for_economy(economy, wait, Duration::from_secs(1)).await
                else {
                    return;
                };
                if rewards.install_economy(economy) {
                    info!("coin rewards enabled");
                }
            });
        }
        None => warn!("TRIVIA_ECONOMY_BASE_URL not set; coin rewards disabled"),
    }

    let app = build_router(AppState {
        controller: controller.clone(),
    });

    info!(bind_addr = %config.bind_addr, "trivia-service listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context(format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.teardown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/events", post(chat_event_handler))
        .route("/v1/groups/{group_id}/game", get(get_group_game_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "trivia-service"}))
}

async fn chat_event_handler(
    State(state): State<AppState>,
    Json(event): Json<ChatEvent>,
) -> Result<Json<EventOutcome>, ApiError> {
    if event.sender_id.trim().is_empty() {
        return Err(ApiError::bad_request("sender_id must not be empty"));
    }

    Ok(Json(
        dispatch::handle_chat_event(&state.controller, event).await,
    ))
}

async fn get_group_game_handler(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> Result<Json<GameStatusResponse>, ApiError> {
    let game = state
        .controller
        .store()
        .get(&group_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("no game running in group {group_id}")))?;

    let timeout = chrono::Duration::from_std(state.controller.game_timeout())
        .map_err(|error| ApiError::internal(format!("invalid game timeout: {error}")))?;

    Ok(Json(GameStatusResponse {
        group_id,
        game_id: game.game_id,
        topic: game.topic,
        difficulty: game.difficulty,
        question: game.question_text,
        hints_given: game.hints_given,
        hints_total: game.hints.len(),
        started_at: game.started_at,
        expires_at: game.started_at + timeout,
    }))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
