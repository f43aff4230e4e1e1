use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::event::{EventBus, LobbyEvent};
use crate::game::engine::{self, ApplyContext, Effect};
use crate::game::errors::GameError;
use crate::game::generator::{GenerationError, OptionGenerator};
use crate::game::intents::Intent;
use crate::game::rules::GameRules;
use crate::game::timer::{round_deadline, RoundTimer};
use crate::lobby::models::{CreativityMode, LobbyRecord, Phase};
use crate::lobby::repository::{LobbyStore, StoreError};

pub type CommandReply = oneshot::Sender<Result<CommitOutcome, GameError>>;

/// Messages accepted by a lobby's mailbox
#[derive(Debug)]
pub enum Command {
    Apply {
        intent: Intent,
        reply: Option<CommandReply>,
    },
    Shutdown,
}

/// What happened to an applied intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Version of the lobby after the intent
    pub version: u64,
    pub changed: bool,
}

/// Dependencies shared by every lobby actor
#[derive(Clone)]
pub struct ActorContext {
    pub store: Arc<dyn LobbyStore>,
    pub event_bus: EventBus,
    pub generator: Arc<dyn OptionGenerator>,
    pub rules: Arc<GameRules>,
}

/// Single writer of one lobby.
///
/// Intents are applied one at a time in mailbox order. Each one is reduced
/// on a copy of the cached record and committed with compare-and-set; the
/// cache is dropped and reloaded whenever the store disagrees.
pub struct LobbyActor {
    code: String,
    ctx: ActorContext,
    mailbox: mpsc::WeakSender<Command>,
    timer: RoundTimer,
    record: Option<LobbyRecord>,
}

impl LobbyActor {
    pub fn new(code: String, ctx: ActorContext, mailbox: mpsc::WeakSender<Command>) -> Self {
        let timer = RoundTimer::new(code.clone(), mailbox.clone());
        Self {
            code,
            ctx,
            mailbox,
            timer,
            record: None,
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(lobby_code = %self.code, "Lobby actor started");
        self.recover().await;

        while let Some(command) = commands.recv().await {
            match command {
                Command::Apply { intent, reply } => {
                    let result = self.handle(intent).await;
                    if let Some(reply) = reply {
                        // The caller may have given up waiting
                        let _ = reply.send(result);
                    }
                }
                Command::Shutdown => break,
            }
        }

        self.timer.cancel();
        info!(lobby_code = %self.code, "Lobby actor stopped");
    }

    /// Re-arms the round timer of a lobby that was mid-round when its
    /// previous actor stopped.
    async fn recover(&mut self) {
        let record = match self.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!(lobby_code = %self.code, error = %e, "Could not load lobby on start");
                return;
            }
        };

        let state = &record.state;
        if state.phase != Phase::Matching {
            return;
        }
        let deadline = state.round_deadline.or_else(|| {
            state
                .round_start_time
                .map(|start| round_deadline(start, state.players.len(), &self.ctx.rules))
        });
        if let Some(deadline) = deadline {
            info!(
                lobby_code = %self.code,
                round = state.current_round,
                "Re-arming round timer after restart"
            );
            self.timer.schedule(state.current_round, deadline);
        }
    }

    async fn load(&mut self) -> Result<LobbyRecord, StoreError> {
        if let Some(record) = &self.record {
            return Ok(record.clone());
        }
        let record = self.ctx.store.get(&self.code).await?;
        self.record = Some(record.clone());
        Ok(record)
    }

    #[instrument(skip(self, intent), fields(lobby_code = %self.code, intent = intent.name()))]
    async fn handle(&mut self, intent: Intent) -> Result<CommitOutcome, GameError> {
        let player_id = intent.player_id().map(str::to_string);
        let internal = intent.is_internal();

        match self.commit(intent).await {
            Ok((outcome, effects)) => {
                self.run_effects(effects).await;
                Ok(outcome)
            }
            Err(e) => {
                debug!(error = %e, "Intent rejected");
                if let (Some(player_id), false) = (player_id, internal) {
                    self.ctx
                        .event_bus
                        .emit_to_lobby(
                            &self.code,
                            LobbyEvent::IntentRejected {
                                player_id,
                                error: e.clone(),
                            },
                        )
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn commit(&mut self, intent: Intent) -> Result<(CommitOutcome, Vec<Effect>), GameError> {
        let max_attempts = self.ctx.rules.max_commit_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let current = self.load().await?;

            let mut next = current.state.clone();
            let apply_ctx = ApplyContext::new(&self.ctx.rules);
            let transition = engine::apply(&mut next, intent.clone(), &apply_ctx)?;

            if !transition.changed {
                return Ok((
                    CommitOutcome {
                        version: current.version,
                        changed: false,
                    },
                    transition.effects,
                ));
            }

            match self
                .ctx
                .store
                .compare_and_set(&self.code, current.version, &next)
                .await
            {
                Ok(record) => {
                    let version = record.version;
                    self.record = Some(record);
                    debug!(version, "Committed lobby state");

                    self.ctx
                        .event_bus
                        .emit_to_lobby(
                            &self.code,
                            LobbyEvent::StateCommitted {
                                version,
                                state: Arc::new(next),
                            },
                        )
                        .await;

                    return Ok((
                        CommitOutcome {
                            version,
                            changed: true,
                        },
                        transition.effects,
                    ));
                }
                Err(StoreError::Conflict { expected, actual }) => {
                    self.record = None;
                    if attempt >= max_attempts {
                        error!(expected, actual, attempt, "Giving up after repeated conflicts");
                        return Err(GameError::Internal(
                            "lobby is under too much contention".to_string(),
                        ));
                    }
                    warn!(expected, actual, attempt, "Version conflict, retrying");
                }
                Err(e) => {
                    self.record = None;
                    error!(error = %e, "Failed to commit lobby state");
                    return Err(e.into());
                }
            }
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartGeneration {
                    round,
                    prompt,
                    creativity,
                    player_count,
                    requested_by,
                } => self.start_generation(round, prompt, creativity, player_count, requested_by),
                Effect::ArmTimer { round, deadline } => self.timer.schedule(round, deadline),
                Effect::CancelTimer => self.timer.cancel(),
                Effect::NotifyError { player_id, error } => {
                    self.ctx
                        .event_bus
                        .emit_to_lobby(&self.code, LobbyEvent::IntentRejected { player_id, error })
                        .await;
                }
                Effect::LobbyEmptied => {
                    info!(lobby_code = %self.code, "Lobby is empty, awaiting cleanup");
                }
            }
        }
    }

    /// Calls the generator off the actor and posts the outcome back into
    /// the mailbox as an internal intent.
    fn start_generation(
        &self,
        round: u32,
        prompt: String,
        creativity: CreativityMode,
        player_count: usize,
        requested_by: String,
    ) {
        let generator = self.ctx.generator.clone();
        let timeout = self.ctx.rules.generation_timeout;
        let mailbox = self.mailbox.clone();
        let lobby_code = self.code.clone();

        tokio::spawn(async move {
            let result =
                match tokio::time::timeout(timeout, generator.generate(&prompt, player_count, creativity))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Timeout(timeout)),
                };

            let intent = match result {
                Ok(options) => Intent::OptionsReady {
                    round,
                    prompt,
                    options,
                },
                Err(e) => {
                    warn!(lobby_code = %lobby_code, round, error = %e, "Option generation failed");
                    Intent::GenerationFailed {
                        round,
                        prompt,
                        player_id: requested_by,
                        reason: e.to_string(),
                    }
                }
            };

            let Some(sender) = mailbox.upgrade() else {
                debug!(lobby_code = %lobby_code, "Lobby gone before options arrived");
                return;
            };
            if sender
                .send(Command::Apply {
                    intent,
                    reply: None,
                })
                .await
                .is_err()
            {
                debug!(lobby_code = %lobby_code, "Mailbox closed before options arrived");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::generator::PlaceholderOptionGenerator;
    use crate::game::rules::PlayerOrder;
    use crate::lobby::models::LobbyState;
    use crate::lobby::repository::InMemoryLobbyStore;

    struct Harness {
        store: Arc<InMemoryLobbyStore>,
        bus: EventBus,
        mailbox: mpsc::Sender<Command>,
    }

    async fn spawn_actor(code: &str) -> Harness {
        let store = Arc::new(InMemoryLobbyStore::new());
        store
            .create(code, &LobbyState::new(code.to_string()))
            .await
            .unwrap();
        let bus = EventBus::new();
        let ctx = ActorContext {
            store: store.clone(),
            event_bus: bus.clone(),
            generator: Arc::new(PlaceholderOptionGenerator),
            rules: Arc::new(GameRules::default().with_player_order(PlayerOrder::JoinOrder)),
        };
        let (tx, rx) = mpsc::channel(16);
        let actor = LobbyActor::new(code.to_string(), ctx, tx.downgrade());
        tokio::spawn(actor.run(rx));
        Harness {
            store,
            bus,
            mailbox: tx,
        }
    }

    async fn send(harness: &Harness, intent: Intent) -> Result<CommitOutcome, GameError> {
        let (reply, rx) = oneshot::channel();
        harness
            .mailbox
            .send(Command::Apply {
                intent,
                reply: Some(reply),
            })
            .await
            .unwrap();
        rx.await.unwrap()
    }

    fn join(id: &str) -> Intent {
        Intent::Join {
            player_id: id.to_string(),
            name: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_commits_bump_version() {
        let harness = spawn_actor("ABCD").await;

        let first = send(&harness, join("a")).await.unwrap();
        assert_eq!(first, CommitOutcome { version: 2, changed: true });

        let again = send(&harness, join("a")).await.unwrap();
        assert_eq!(again, CommitOutcome { version: 2, changed: false });

        let stored = harness.store.get("ABCD").await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state.players.len(), 1);
    }

    #[tokio::test]
    async fn test_rejections_reach_the_player() {
        let harness = spawn_actor("ABCD").await;
        let mut events = harness.bus.subscribe_to_lobby("ABCD").await;

        send(&harness, join("a")).await.unwrap();
        let err = send(
            &harness,
            Intent::StartGame {
                player_id: "a".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err, GameError::NotEnoughPlayers(2));

        assert!(matches!(
            events.recv().await.unwrap(),
            LobbyEvent::StateCommitted { version: 2, .. }
        ));
        match events.recv().await.unwrap() {
            LobbyEvent::IntentRejected { player_id, error } => {
                assert_eq!(player_id, "a");
                assert_eq!(error, GameError::NotEnoughPlayers(2));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_foreign_write_is_retried() {
        let harness = spawn_actor("ABCD").await;
        send(&harness, join("a")).await.unwrap();

        // Another writer bumps the version behind the actor's back
        let record = harness.store.get("ABCD").await.unwrap();
        harness
            .store
            .compare_and_set("ABCD", record.version, &record.state)
            .await
            .unwrap();

        let outcome = send(&harness, join("b")).await.unwrap();
        assert_eq!(outcome.version, 4);
        assert_eq!(harness.store.get("ABCD").await.unwrap().state.players.len(), 2);
    }

    #[tokio::test]
    async fn test_prompt_flows_into_matching() {
        let harness = spawn_actor("ABCD").await;
        let mut events = harness.bus.subscribe_to_lobby("ABCD").await;
        for id in ["a", "b"] {
            send(&harness, join(id)).await.unwrap();
        }
        send(
            &harness,
            Intent::StartGame {
                player_id: "a".to_string(),
            },
        )
        .await
        .unwrap();
        send(
            &harness,
            Intent::SubmitPrompt {
                player_id: "a".to_string(),
                prompt: "fruits".to_string(),
                creativity: CreativityMode::Normal,
            },
        )
        .await
        .unwrap();

        let state = loop {
            if let LobbyEvent::StateCommitted { state, .. } = events.recv().await.unwrap() {
                if state.phase == Phase::Matching {
                    break state;
                }
            }
        };
        assert_eq!(state.options, vec!["fruits #1", "fruits #2"]);
        assert!(state.round_deadline.is_some());
    }
}
