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

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, oneshot},
    task::JoinHandle,
};
use trivia_common::GroupId;

/// Cancellable handle for a game's scheduled timeout task.
pub struct TimeoutHandle {
    cancel_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl TimeoutHandle {
    pub fn new(cancel_tx: oneshot::Sender<()>, join: JoinHandle<()>) -> Self {
        Self {
            cancel_tx: Some(cancel_tx),
            join,
        }
    }

    /// Safe to call repeatedly and after the task has already fired.
    pub fn cancel(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[derive(Debug, Clone)]
pub struct ActiveGame {
    pub game_id: String,
    /// Host conversation address the timeout reveal is broadcast to.
    pub origin: String,
    pub topic: String,
    pub question_text: String,
    pub candidate_answers: Vec<String>,
    pub difficulty: String,
    pub hints: Vec<String>,
    pub hints_given: usize,
    pub active: bool,
    pub started_at: DateTime<Utc>,
}

pub struct GameRecord {
    pub game: ActiveGame,
    pub timeout: TimeoutHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    AlreadyActive,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => write!(f, "a game is already active in this group"),
        }
    }
}

/// Result of a conditional settlement attempt.
pub enum Settlement {
    Absent,
    Retained,
    Taken(GameRecord),
}

/// At most one record per group. Every removal is a check-then-delete under
/// the same lock, so only one settlement path can take a given record.
#[derive(Default)]
pub struct GameStore {
    games: Mutex<HashMap<GroupId, GameRecord>>,
}

impl GameStore {
    pub async fn get(&self, group_id: &str) -> Option<ActiveGame> {
        let games = self.games.lock().await;
        games
            .get(group_id)
            .filter(|record| record.game.active)
            .map(|record| record.game.clone())
    }

    pub async fn is_active(&self, group_id: &str) -> bool {
        let games = self.games.lock().await;
        games
            .get(group_id)
            .map(|record| record.game.active)
            .unwrap_or(false)
    }

    /// Stores `record` unless an active game exists. A rejected record has its
    /// timeout cancelled before it is dropped.
    pub async fn put(&self, group_id: &str, mut record: GameRecord) -> Result<(), StoreError> {
        let mut games = self.games.lock().await;
        if games
            .get(group_id)
            .map(|existing| existing.game.active)
            .unwrap_or(false)
        {
            record.timeout.cancel();
            return Err(StoreError::AlreadyActive);
        }

        if let Some(mut stale) = games.insert(group_id.to_string(), record) {
            stale.timeout.cancel();
        }
        Ok(())
    }

    /// Runs `f` against the active record, if any.
    pub async fn with_active<R>(
        &self,
        group_id: &str,
        f: impl FnOnce(&mut ActiveGame) -> R,
    ) -> Option<R> {
        let mut games = self.games.lock().await;
        games
            .get_mut(group_id)
            .filter(|record| record.game.active)
            .map(|record| f(&mut record.game))
    }

    /// Removes and returns the active record. With `game_id` set, only a
    /// record of that game qualifies.
    pub async fn take_active(&self, group_id: &str, game_id: Option<&str>) -> Option<GameRecord> {
        match self
            .take_active_if(group_id, |game| {
                game_id.map(|id| id == game.game_id).unwrap_or(true)
            })
            .await
        {
            Settlement::Taken(record) => Some(record),
            Settlement::Absent | Settlement::Retained => None,
        }
    }

    /// Removes the active record when `predicate` accepts it.
    pub async fn take_active_if(
        &self,
        group_id: &str,
        predicate: impl FnOnce(&ActiveGame) -> bool,
    ) -> Settlement {
        let mut games = self.games.lock().await;
        let Some(record) = games.get(group_id).filter(|record| record.game.active) else {
            return Settlement::Absent;
        };
        if !predicate(&record.game) {
            return Settlement::Retained;
        }

        match games.remove(group_id) {
            Some(mut record) => {
                record.game.active = false;
                Settlement::Taken(record)
            }
            None => Settlement::Absent,
        }
    }

    pub async fn list_active(&self) -> Vec<(GroupId, ActiveGame)> {
        let games = self.games.lock().await;
        games
            .iter()
            .filter(|(_, record)| record.game.active)
            .map(|(group_id, record)| (group_id.clone(), record.game.clone()))
            .collect()
    }

    /// Empties the store and hands every record to the caller.
    pub async fn drain(&self) -> Vec<(GroupId, GameRecord)> {
        let mut games = self.games.lock().await;
        games.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(game_id: &str) -> (GameRecord, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let join = tokio::spawn(async {});
        let record = GameRecord {
            game: ActiveGame {
                game_id: game_id.to_string(),
                origin: "origin-1".to_string(),
                topic: "历史".to_string(),
                question_text: "谁？".to_string(),
                candidate_answers: vec!["秦始皇".to_string()],
                difficulty: "普通".to_string(),
                hints: vec!["皇帝".to_string()],
                hints_given: 0,
                active: true,
                started_at: Utc::now(),
            },
            timeout: TimeoutHandle::new(cancel_tx, join),
        };
        (record, cancel_rx)
    }

    #[tokio::test]
    async fn put_rejects_second_active_record_and_cancels_its_timer() {
        let store = GameStore::default();
        let (first, _first_rx) = record("game-1");
        let (second, second_rx) = record("game-2");

        store.put("group-1", first).await.unwrap();
        assert_eq!(
            store.put("group-1", second).await.unwrap_err(),
            StoreError::AlreadyActive
        );
        assert!(second_rx.await.is_ok());
        assert_eq!(store.get("group-1").await.unwrap().game_id, "game-1");
    }

    #[tokio::test]
    async fn take_active_settles_exactly_once() {
        let store = GameStore::default();
        let (first, _rx) = record("game-1");
        store.put("group-1", first).await.unwrap();

        let taken = store.take_active("group-1", None).await.unwrap();
        assert!(!taken.game.active);
        assert!(store.take_active("group-1", None).await.is_none());
        assert!(!store.is_active("group-1").await);
    }

    #[tokio::test]
    async fn take_active_with_stale_game_id_keeps_newer_game() {
        let store = GameStore::default();
        let (current, _rx) = record("game-2");
        store.put("group-1", current).await.unwrap();

        assert!(store.take_active("group-1", Some("game-1")).await.is_none());
        assert!(store.take_active("group-1", Some("game-2")).await.is_some());
    }

    #[tokio::test]
    async fn take_active_if_retains_record_when_predicate_rejects() {
        let store = GameStore::default();
        let (current, _rx) = record("game-1");
        store.put("group-1", current).await.unwrap();

        assert!(matches!(
            store.take_active_if("group-1", |_| false).await,
            Settlement::Retained
        ));
        assert!(matches!(
            store.take_active_if("group-2", |_| true).await,
            Settlement::Absent
        ));
        assert!(store.is_active("group-1").await);
    }

    #[tokio::test]
    async fn with_active_mutates_in_place_and_list_drain_cover_all_groups() {
        let store = GameStore::default();
        let (a, _a_rx) = record("game-a");
        let (b, _b_rx) = record("game-b");
        store.put("group-a", a).await.unwrap();
        store.put("group-b", b).await.unwrap();

        let hints = store
            .with_active("group-a", |game| {
                game.hints_given += 1;
                game.hints_given
            })
            .await;
        assert_eq!(hints, Some(1));
        assert!(store.with_active("group-c", |_| ()).await.is_none());

        let mut listed = store.list_active().await;
        listed.sort_by(|left, right| left.0.cmp(&right.0));
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].1.hints_given, 1);

        let drained = store.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(store.list_active().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let _ = cancel_rx.await;
        });
        let mut handle = TimeoutHandle::new(cancel_tx, join);
        handle.cancel();
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
