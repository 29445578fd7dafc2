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

use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use tokio::sync::{Mutex, OnceCell};
use tracing::{error, info};
use trivia_common::{DailyRewardCounter, REWARD_REASON, UserId, decayed_reward};

use crate::collaborators::EconomyApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardStatus {
    Granted { amount: u32, capped: bool },
    CapReached,
    Disabled,
    DispatchFailed { amount: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardOutcome {
    pub status: RewardStatus,
    pub message: String,
}

impl RewardOutcome {
    fn new(status: RewardStatus) -> Self {
        let message = match status {
            RewardStatus::Granted {
                amount,
                capped: false,
            } => format!("恭喜获得 {amount} 金币！"),
            RewardStatus::Granted {
                amount,
                capped: true,
            } => format!("恭喜获得 {amount} 金币！今日奖励已达上限啦！"),
            RewardStatus::CapReached => "今日奖励已达上限啦！".to_string(),
            RewardStatus::Disabled => "奖励功能暂未启用。".to_string(),
            RewardStatus::DispatchFailed { .. } => "金币发放失败了，请联系管理员。".to_string(),
        };
        Self { status, message }
    }
}

/// Decaying per-answer reward with a per-user daily cap.
///
/// The economy handle is installed once it becomes reachable; until then
/// every reward is [`RewardStatus::Disabled`]. A grant is booked against the
/// cap before the economy call is made, so a failed call still counts.
#[derive(Clone, Default)]
pub struct RewardCalculator {
    economy: Arc<OnceCell<Arc<dyn EconomyApi>>>,
    ledger: Arc<Mutex<HashMap<UserId, DailyRewardCounter>>>,
}

impl RewardCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_economy(&self, economy: Arc<dyn EconomyApi>) -> bool {
        self.economy.set(economy).is_ok()
    }

    pub async fn compute_reward(
        &self,
        hints_given: usize,
        user_id: &str,
        today: NaiveDate,
    ) -> RewardOutcome {
        let Some(economy) = self.economy.get().cloned() else {
            return RewardOutcome::new(RewardStatus::Disabled);
        };

        let decayed = decayed_reward(hints_given);
        let granted = {
            let mut ledger = self.ledger.lock().await;
            ledger
                .entry(user_id.to_string())
                .or_insert_with(|| DailyRewardCounter::new(today))
                .reserve(decayed, today)
        };

        if granted == 0 {
            info!(user_id = %user_id, "daily reward cap reached");
            return RewardOutcome::new(RewardStatus::CapReached);
        }

        match economy.add_coins(user_id, granted, REWARD_REASON).await {
            Ok(()) => {
                info!(user_id = %user_id, amount = granted, hints_given, "reward granted");
                RewardOutcome::new(RewardStatus::Granted {
                    amount: granted,
                    capped: granted < decayed,
                })
            }
            Err(error) => {
                error!(
                    user_id = %user_id,
                    amount = granted,
                    error = %error,
                    "failed to issue reward coins"
                );
                RewardOutcome::new(RewardStatus::DispatchFailed { amount: granted })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingEconomy;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 4).unwrap()
    }

    fn granted(outcome: &RewardOutcome) -> u32 {
        match outcome.status {
            RewardStatus::Granted { amount, .. } => amount,
            _ => 0,
        }
    }

    async fn counter(rewards: &RewardCalculator, user_id: &str) -> Option<DailyRewardCounter> {
        rewards.ledger.lock().await.get(user_id).copied()
    }

    fn calculator(economy: Arc<RecordingEconomy>) -> RewardCalculator {
        let rewards = RewardCalculator::new();
        assert!(rewards.install_economy(economy));
        rewards
    }

    #[tokio::test]
    async fn reward_decays_with_hints() {
        let economy = Arc::new(RecordingEconomy::default());
        let rewards = calculator(economy.clone());

        assert_eq!(granted(&rewards.compute_reward(0, "u1", today()).await), 100);
        assert_eq!(granted(&rewards.compute_reward(1, "u1", today()).await), 50);
        assert_eq!(granted(&rewards.compute_reward(2, "u1", today()).await), 25);
        assert_eq!(economy.granted(), vec![100, 50, 25]);

        let calls = economy.calls.lock().unwrap();
        assert_eq!(calls[0].0, "u1");
        assert_eq!(calls[0].2, REWARD_REASON);
    }

    #[tokio::test]
    async fn daily_cap_grants_remainder_then_nothing() {
        let economy = Arc::new(RecordingEconomy::default());
        let rewards = calculator(economy.clone());
        rewards.ledger.lock().await.insert(
            "u1".to_string(),
            DailyRewardCounter {
                date: today(),
                total_awarded: 950,
            },
        );

        let partial = rewards.compute_reward(0, "u1", today()).await;
        assert_eq!(
            partial.status,
            RewardStatus::Granted {
                amount: 50,
                capped: true
            }
        );
        assert!(partial.message.contains("上限"));

        let none = rewards.compute_reward(1, "u1", today()).await;
        assert_eq!(none.status, RewardStatus::CapReached);
        assert_eq!(economy.granted(), vec![50]);
    }

    #[tokio::test]
    async fn counter_from_yesterday_resets_before_grant() {
        let economy = Arc::new(RecordingEconomy::default());
        let rewards = calculator(economy.clone());
        rewards.ledger.lock().await.insert(
            "u1".to_string(),
            DailyRewardCounter {
                date: today().pred_opt().unwrap(),
                total_awarded: 1000,
            },
        );

        let outcome = rewards.compute_reward(0, "u1", today()).await;
        assert_eq!(granted(&outcome), 100);
        assert_eq!(
            counter(&rewards, "u1").await,
            Some(DailyRewardCounter {
                date: today(),
                total_awarded: 100
            })
        );
    }

    #[tokio::test]
    async fn rewards_disabled_without_economy() {
        let rewards = RewardCalculator::new();
        assert!(!rewards.economy.initialized());

        let outcome = rewards.compute_reward(0, "u1", today()).await;
        assert_eq!(outcome.status, RewardStatus::Disabled);
        assert!(counter(&rewards, "u1").await.is_none());
    }

    #[tokio::test]
    async fn failed_issuance_still_counts_toward_cap() {
        let economy = Arc::new(RecordingEconomy::failing());
        let rewards = calculator(economy);

        let outcome = rewards.compute_reward(0, "u1", today()).await;
        assert_eq!(outcome.status, RewardStatus::DispatchFailed { amount: 100 });
        assert_eq!(granted(&outcome), 0);
        assert_eq!(counter(&rewards, "u1").await.unwrap().total_awarded, 100);
    }

    #[tokio::test]
    async fn economy_installs_only_once() {
        let rewards = RewardCalculator::new();
        assert!(rewards.install_economy(Arc::new(RecordingEconomy::default())));
        assert!(!rewards.install_economy(Arc::new(RecordingEconomy::default())));
        assert!(rewards.economy.initialized());
    }
}
