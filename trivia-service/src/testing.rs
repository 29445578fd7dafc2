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

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::collaborators::{EconomyApi, MessageSender, QuestionModel};

pub const SAMPLE_QUESTION: &str = r#"```json
{
  "description": "它是让机器模拟人类思维的技术，常被缩写为两个字母。这是什么？",
  "candidate_answers": ["人工智能", "AI", "Artificial Intelligence"],
  "difficulty": "普通",
  "hints": ["和计算机有关", "与机器学习密切相关", "缩写是 A 开头"]
}
```"#;

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        let model = Self::default();
        model.push_reply(reply);
        model
    }

    pub fn failing(message: &str) -> Self {
        let model = Self::default();
        model
            .replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        model
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
    }
}

#[async_trait]
impl QuestionModel for ScriptedModel {
    async fn text_chat(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}

#[derive(Default)]
pub struct RecordingEconomy {
    pub calls: Mutex<Vec<(String, u32, String)>>,
    pub fail: bool,
    pub delay: Duration,
    not_ready_probes: Option<usize>,
    probes: AtomicUsize,
}

impl RecordingEconomy {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn ready_after(not_ready_probes: usize) -> Self {
        Self {
            not_ready_probes: Some(not_ready_probes),
            ..Self::default()
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(usize::MAX)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn granted(&self) -> Vec<u32> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, amount, _)| *amount)
            .collect()
    }
}

#[async_trait]
impl EconomyApi for RecordingEconomy {
    async fn ready(&self) -> anyhow::Result<bool> {
        let seen = self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(seen >= self.not_ready_probes.unwrap_or(0))
    }

    async fn add_coins(&self, user_id: &str, amount: u32, reason: &str) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(anyhow::anyhow!("forced economy error"));
        }
        self.calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), amount, reason.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingMessenger {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageSender for RecordingMessenger {
    async fn send_message(&self, origin: &str, text: &str) -> anyhow::Result<()> {
        if self.fail {
            return Err(anyhow::anyhow!("forced broadcast error"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((origin.to_string(), text.to_string()));
        Ok(())
    }
}
