use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::game::actor::Command;
use crate::game::intents::Intent;
use crate::game::rules::GameRules;

/// Deadline of the matching phase of a round that started at `start`
pub fn round_deadline(start: DateTime<Utc>, player_count: usize, rules: &GameRules) -> DateTime<Utc> {
    let budget = rules.matching_budget(player_count);
    start + chrono::Duration::seconds(budget.as_secs() as i64)
}

/// Posts `TimeUp` into a lobby's mailbox when the matching deadline passes.
///
/// At most one round is armed at a time, and a round is never armed twice,
/// so TIME_UP fires at most once per round.
pub struct RoundTimer {
    lobby_code: String,
    mailbox: mpsc::WeakSender<Command>,
    armed: Option<(u32, JoinHandle<()>)>,
}

impl RoundTimer {
    pub fn new(lobby_code: String, mailbox: mpsc::WeakSender<Command>) -> Self {
        Self {
            lobby_code,
            mailbox,
            armed: None,
        }
    }

    pub fn armed_round(&self) -> Option<u32> {
        self.armed.as_ref().map(|(round, _)| *round)
    }

    pub fn schedule(&mut self, round: u32, deadline: DateTime<Utc>) {
        if self.armed_round() == Some(round) {
            debug!(lobby_code = %self.lobby_code, round, "Round timer already armed");
            return;
        }
        self.cancel();

        let wait = (deadline - Utc::now()).to_std().unwrap_or_default();
        let mailbox = self.mailbox.clone();
        let lobby_code = self.lobby_code.clone();

        info!(
            lobby_code = %lobby_code,
            round,
            wait_secs = wait.as_secs(),
            "Arming round timer"
        );

        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;

            let Some(sender) = mailbox.upgrade() else {
                debug!(lobby_code = %lobby_code, round, "Lobby gone before TIME_UP");
                return;
            };
            let command = Command::Apply {
                intent: Intent::TimeUp { round },
                reply: None,
            };
            if sender.send(command).await.is_err() {
                debug!(lobby_code = %lobby_code, round, "Mailbox closed before TIME_UP");
            }
        });

        self.armed = Some((round, handle));
    }

    pub fn cancel(&mut self) {
        if let Some((round, handle)) = self.armed.take() {
            debug!(lobby_code = %self.lobby_code, round, "Cancelling round timer");
            handle.abort();
        }
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
