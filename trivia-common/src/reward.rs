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

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{BASE_REWARD, DAILY_REWARD_CAP};

/// `floor(BASE_REWARD * 0.5^hints_given)`.
pub fn decayed_reward(hints_given: usize) -> u32 {
    u32::try_from(hints_given)
        .ok()
        .and_then(|hints| BASE_REWARD.checked_shr(hints))
        .unwrap_or(0)
}

/// Coins granted to one user on one calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyRewardCounter {
    pub date: NaiveDate,
    pub total_awarded: u32,
}

impl DailyRewardCounter {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_awarded: 0,
        }
    }

    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.date != today {
            self.date = today;
            self.total_awarded = 0;
        }
    }

    pub fn remaining(&self) -> u32 {
        DAILY_REWARD_CAP.saturating_sub(self.total_awarded)
    }

    /// Books up to `amount` against today's cap and returns what was booked.
    pub fn reserve(&mut self, amount: u32, today: NaiveDate) -> u32 {
        self.roll_over(today);
        let granted = amount.min(self.remaining());
        self.total_awarded += granted;
        granted
    }
}
