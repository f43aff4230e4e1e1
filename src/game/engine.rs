use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::game::errors::GameError;
use crate::game::generator::validate_options;
use crate::game::intents::Intent;
use crate::game::rules::{GameRules, PlayerOrder};
use crate::game::scorer;
use crate::game::timer::round_deadline;
use crate::lobby::models::{CreativityMode, LobbyState, Phase, Player, Submission};

/// Inputs the reducer needs besides the state and the intent
#[derive(Debug, Clone)]
pub struct ApplyContext<'a> {
    pub now: DateTime<Utc>,
    pub rules: &'a GameRules,
}

impl<'a> ApplyContext<'a> {
    pub fn new(rules: &'a GameRules) -> Self {
        Self {
            now: Utc::now(),
            rules,
        }
    }
}

/// Side effects the actor runs once the new state has been committed
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartGeneration {
        round: u32,
        prompt: String,
        creativity: CreativityMode,
        player_count: usize,
        requested_by: String,
    },
    ArmTimer {
        round: u32,
        deadline: DateTime<Utc>,
    },
    CancelTimer,
    /// An error meant for one player only, not for the caller of the intent
    NotifyError {
        player_id: String,
        error: GameError,
    },
    LobbyEmptied,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transition {
    pub changed: bool,
    pub effects: Vec<Effect>,
}

/// Applies one intent to `state`.
///
/// Never suspends. On `Err` the state has not been touched.
pub fn apply(
    state: &mut LobbyState,
    intent: Intent,
    ctx: &ApplyContext<'_>,
) -> Result<Transition, GameError> {
    let before = state.clone();
    let intent_name = intent.name();

    let effects = match intent {
        Intent::Join { player_id, name } => join(state, player_id, &name, ctx.rules)?,
        Intent::StartGame { player_id } => start_game(state, &player_id, ctx.rules)?,
        Intent::SubmitPrompt {
            player_id,
            prompt,
            creativity,
        } => submit_prompt(state, &player_id, &prompt, creativity, ctx.rules)?,
        Intent::OptionsReady {
            round,
            prompt,
            options,
        } => options_ready(state, round, &prompt, options, ctx)?,
        Intent::GenerationFailed {
            round,
            prompt,
            player_id,
            reason,
        } => generation_failed(state, round, &prompt, player_id, reason),
        Intent::SubmitMatches { player_id, matches } => submit_matches(state, player_id, matches)?,
        Intent::TimeUp { round } => time_up(state, round),
        Intent::React {
            player_id,
            option,
            emoji,
        } => react(state, &player_id, option, emoji, ctx.rules)?,
        Intent::SetResultsIndex { player_id, index } => set_results_index(state, &player_id, index)?,
        Intent::ReadyNext { player_id } => ready_next(state, player_id)?,
        Intent::NextRound { player_id } => next_round(state, &player_id)?,
        Intent::Leave { player_id } => leave(state, &player_id, ctx.rules),
    };

    let changed = *state != before;
    debug!(
        lobby_code = %state.code,
        intent = intent_name,
        changed,
        phase = %state.phase,
        "Applied intent"
    );

    Ok(Transition { changed, effects })
}

fn require_member(state: &LobbyState, player_id: &str) -> Result<(), GameError> {
    if state.has_player(player_id) {
        Ok(())
    } else {
        Err(GameError::NotInLobby(player_id.to_string()))
    }
}

fn require_phase(state: &LobbyState, phase: Phase) -> Result<(), GameError> {
    if state.phase == phase {
        Ok(())
    } else {
        Err(GameError::WrongPhase(state.phase))
    }
}

fn validate_name(raw: &str, rules: &GameRules) -> Result<String, GameError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > rules.max_name_len {
        return Err(GameError::InvalidName(format!(
            "name must be 1-{} characters",
            rules.max_name_len
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(GameError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn join(
    state: &mut LobbyState,
    player_id: String,
    name: &str,
    rules: &GameRules,
) -> Result<Vec<Effect>, GameError> {
    // A player already in the lobby is reconnecting
    if state.has_player(&player_id) {
        return Ok(Vec::new());
    }
    require_phase(state, Phase::Lobby)?;

    let name = validate_name(name, rules)?;
    if state.players.len() >= rules.max_players {
        return Err(GameError::LobbyFull);
    }
    if state.name_taken(&name) {
        return Err(GameError::NameTaken(name));
    }

    let is_host = state.players.is_empty();
    let join_order = state.next_join_order;
    state.next_join_order += 1;
    state
        .players
        .push(Player::new(player_id, name, is_host, join_order));
    state.total_rounds = rules.total_rounds(state.players.len());

    Ok(Vec::new())
}

fn start_game(
    state: &mut LobbyState,
    player_id: &str,
    rules: &GameRules,
) -> Result<Vec<Effect>, GameError> {
    require_member(state, player_id)?;
    require_phase(state, Phase::Lobby)?;
    if !state.is_host(player_id) {
        return Err(GameError::NotHost);
    }
    if state.players.len() < rules.min_players {
        return Err(GameError::NotEnoughPlayers(rules.min_players));
    }

    if rules.player_order == PlayerOrder::Shuffled {
        state.players.shuffle(&mut rand::rng());
    }
    for player in state.players.iter_mut() {
        player.score = 0;
        player.points_history.clear();
    }

    state.clear_round();
    state.phase = Phase::Prompt;
    state.current_round = 0;
    state.total_rounds = rules.total_rounds(state.players.len());
    state.prompt_player_id = state.players.first().map(|p| p.id.clone());

    Ok(Vec::new())
}

fn submit_prompt(
    state: &mut LobbyState,
    player_id: &str,
    prompt: &str,
    creativity: CreativityMode,
    rules: &GameRules,
) -> Result<Vec<Effect>, GameError> {
    require_member(state, player_id)?;
    require_phase(state, Phase::Prompt)?;
    if !state.is_prompt_player(player_id) {
        return Err(GameError::NotYourTurn);
    }

    let prompt = prompt.trim();
    let len = prompt.chars().count();
    if len == 0 || len > rules.max_prompt_len {
        return Err(GameError::InvalidMessage(format!(
            "prompt must be 1-{} characters",
            rules.max_prompt_len
        )));
    }

    state.current_prompt = Some(prompt.to_string());
    state.creativity = Some(creativity);

    Ok(vec![Effect::StartGeneration {
        round: state.current_round,
        prompt: prompt.to_string(),
        creativity,
        player_count: state.players.len(),
        requested_by: player_id.to_string(),
    }])
}

/// A generator completion is stale once the round moved on or the prompt
/// player asked again with a different prompt.
fn is_pending_generation(state: &LobbyState, round: u32, prompt: &str) -> bool {
    state.phase == Phase::Prompt
        && state.current_round == round
        && state.current_prompt.as_deref() == Some(prompt)
}

fn options_ready(
    state: &mut LobbyState,
    round: u32,
    prompt: &str,
    options: Vec<String>,
    ctx: &ApplyContext<'_>,
) -> Result<Vec<Effect>, GameError> {
    if !is_pending_generation(state, round, prompt) {
        debug!(lobby_code = %state.code, round, "Dropping stale options");
        return Ok(Vec::new());
    }

    let options = match validate_options(options, state.players.len()) {
        Ok(options) => options,
        Err(e) => {
            return Ok(state
                .prompt_player_id
                .clone()
                .map(|player_id| Effect::NotifyError {
                    player_id,
                    error: GameError::GenerationFailed(e.to_string()),
                })
                .into_iter()
                .collect());
        }
    };

    let deadline = round_deadline(ctx.now, state.players.len(), ctx.rules);
    state.options = options;
    state.submissions.clear();
    state.phase = Phase::Matching;
    state.round_start_time = Some(ctx.now);
    state.round_deadline = Some(deadline);

    Ok(vec![Effect::ArmTimer {
        round: state.current_round,
        deadline,
    }])
}

fn generation_failed(
    state: &LobbyState,
    round: u32,
    prompt: &str,
    player_id: String,
    reason: String,
) -> Vec<Effect> {
    if !is_pending_generation(state, round, prompt) {
        return Vec::new();
    }
    vec![Effect::NotifyError {
        player_id,
        error: GameError::GenerationFailed(reason),
    }]
}

fn validate_submission(state: &LobbyState, matches: &Submission) -> Result<(), GameError> {
    let mut seen = HashSet::new();
    for (option, assigned) in matches {
        if !state.options.contains(option) {
            return Err(GameError::InvalidSubmission(format!(
                "unknown option: {option}"
            )));
        }
        if !state.has_player(assigned) {
            return Err(GameError::InvalidSubmission(format!(
                "unknown player: {assigned}"
            )));
        }
        if !seen.insert(assigned.as_str()) {
            return Err(GameError::InvalidSubmission(format!(
                "player assigned twice: {assigned}"
            )));
        }
    }
    Ok(())
}

fn submit_matches(
    state: &mut LobbyState,
    player_id: String,
    matches: Submission,
) -> Result<Vec<Effect>, GameError> {
    require_member(state, &player_id)?;
    require_phase(state, Phase::Matching)?;
    validate_submission(state, &matches)?;

    if state.submissions.get(&player_id) == Some(&matches) {
        return Ok(Vec::new());
    }
    state.submissions.insert(player_id, matches);

    if state.everyone_submitted() {
        return Ok(enter_results(state));
    }
    Ok(Vec::new())
}

fn time_up(state: &mut LobbyState, round: u32) -> Vec<Effect> {
    if state.phase != Phase::Matching || state.current_round != round {
        debug!(lobby_code = %state.code, round, "Dropping stale TIME_UP");
        return Vec::new();
    }
    enter_results(state)
}

fn enter_results(state: &mut LobbyState) -> Vec<Effect> {
    let outcome = scorer::score(
        &state.options,
        &state.submissions,
        &state.players,
        state.current_round,
    );

    state.results = Some(outcome.results);
    state.players = outcome.players;
    state.phase = Phase::Results;
    state.round_start_time = None;
    state.round_deadline = None;
    state.current_results_index = 0;
    state.ready_players.clear();

    vec![Effect::CancelTimer]
}

fn react(
    state: &mut LobbyState,
    player_id: &str,
    option: String,
    emoji: String,
    rules: &GameRules,
) -> Result<Vec<Effect>, GameError> {
    require_member(state, player_id)?;
    require_phase(state, Phase::Results)?;
    if !state.options.contains(&option) {
        return Err(GameError::InvalidMessage(format!("unknown option: {option}")));
    }
    let len = emoji.chars().count();
    if emoji.trim().is_empty() || len > rules.max_emoji_len {
        return Err(GameError::InvalidMessage(format!(
            "emoji must be 1-{} characters",
            rules.max_emoji_len
        )));
    }

    *state
        .reactions
        .entry(option)
        .or_default()
        .entry(emoji)
        .or_insert(0) += 1;

    Ok(Vec::new())
}

fn set_results_index(
    state: &mut LobbyState,
    player_id: &str,
    index: i64,
) -> Result<Vec<Effect>, GameError> {
    require_member(state, player_id)?;
    require_phase(state, Phase::Results)?;
    if !state.is_prompt_player(player_id) {
        return Err(GameError::NotYourTurn);
    }

    let last = state.options.len().saturating_sub(1) as i64;
    state.current_results_index = index.clamp(0, last) as usize;
    Ok(Vec::new())
}

fn ready_next(state: &mut LobbyState, player_id: String) -> Result<Vec<Effect>, GameError> {
    require_member(state, &player_id)?;
    require_phase(state, Phase::Results)?;

    state.ready_players.insert(player_id);
    if state.everyone_ready() {
        return Ok(advance_round(state));
    }
    Ok(Vec::new())
}

fn next_round(state: &mut LobbyState, player_id: &str) -> Result<Vec<Effect>, GameError> {
    require_member(state, player_id)?;
    require_phase(state, Phase::Results)?;
    if !state.is_host(player_id) {
        return Err(GameError::NotHost);
    }
    Ok(advance_round(state))
}

fn advance_round(state: &mut LobbyState) -> Vec<Effect> {
    state.current_round += 1;
    state.clear_round();

    if state.current_round >= state.total_rounds || state.players.is_empty() {
        state.phase = Phase::GameOver;
        state.prompt_player_id = None;
    } else {
        let idx = state.current_round as usize % state.players.len();
        state.phase = Phase::Prompt;
        state.prompt_player_id = Some(state.players[idx].id.clone());
    }

    vec![Effect::CancelTimer]
}

fn end_game(state: &mut LobbyState) -> Vec<Effect> {
    state.clear_round();
    state.phase = Phase::GameOver;
    state.prompt_player_id = None;
    vec![Effect::CancelTimer]
}

fn leave(state: &mut LobbyState, player_id: &str, rules: &GameRules) -> Vec<Effect> {
    let Some(idx) = state.players.iter().position(|p| p.id == player_id) else {
        return Vec::new();
    };

    let in_game = matches!(
        state.phase,
        Phase::Prompt | Phase::Matching | Phase::Results
    );
    let anchor = if in_game { turn_anchor(state, idx) } else { None };

    let leaver = state.players.remove(idx);
    state.submissions.remove(player_id);
    state.ready_players.remove(player_id);

    if state.players.is_empty() {
        return vec![Effect::CancelTimer, Effect::LobbyEmptied];
    }

    if leaver.is_host {
        if let Some(next_host) = state.players.iter_mut().min_by_key(|p| p.join_order) {
            next_host.is_host = true;
        }
    }

    if let Some((anchor, offset)) = anchor {
        realign_turn(state, &anchor, offset);
    }

    if in_game && state.players.len() < rules.min_players {
        return end_game(state);
    }

    match state.phase {
        Phase::Lobby => {
            state.total_rounds = rules.total_rounds(state.players.len());
            Vec::new()
        }
        Phase::Prompt if state.prompt_player_id.as_deref() == Some(player_id) => {
            advance_round(state)
        }
        // The remaining players may all have voted already
        Phase::Matching if state.everyone_submitted() => enter_results(state),
        Phase::Results if state.everyone_ready() => advance_round(state),
        _ => Vec::new(),
    }
}

/// Picks the player the turn must point at once `players[leaver_idx]` is
/// gone, with the round offset they belong to: the current prompt player
/// keeps this round, otherwise the next in line takes the following one.
fn turn_anchor(state: &LobbyState, leaver_idx: usize) -> Option<(String, usize)> {
    let n = state.players.len();
    let leaver = state.players[leaver_idx].id.as_str();
    let prompt = state.prompt_player_id.as_deref()?;
    if prompt != leaver && state.has_player(prompt) {
        return Some((prompt.to_string(), 0));
    }

    // With the prompt player gone, the slot after this round belongs to the next in line
    let next = if prompt == leaver {
        leaver_idx
    } else {
        (state.current_round as usize + 1) % n
    };
    let mut pick = &state.players[next];
    if pick.id == leaver {
        pick = &state.players[(next + 1) % n];
    }
    Some((pick.id.clone(), 1))
}

/// Rotates the seating so `anchor` sits at `(current_round + offset) mod n`.
fn realign_turn(state: &mut LobbyState, anchor: &str, offset: usize) {
    let n = state.players.len();
    if let Some(pos) = state.players.iter().position(|p| p.id == anchor) {
        let target = (state.current_round as usize + offset) % n;
        state.players.rotate_right((target + n - pos) % n);
    }
}

/// Checks the lobby invariants that hold after every committed intent.
pub fn check_invariants(state: &LobbyState, rules: &GameRules) -> Result<(), String> {
    if state.players.len() > rules.max_players {
        return Err(format!("too many players: {}", state.players.len()));
    }
    let mut names = HashSet::new();
    for player in &state.players {
        if !names.insert(player.name.to_lowercase()) {
            return Err(format!("duplicate name: {}", player.name));
        }
    }

    let hosts = state.players.iter().filter(|p| p.is_host).count();
    if !state.players.is_empty() && hosts != 1 {
        return Err(format!("expected exactly one host, found {hosts}"));
    }

    for (player_id, submission) in &state.submissions {
        let mut assigned = HashSet::new();
        if !submission.values().all(|p| assigned.insert(p)) {
            return Err(format!("duplicate assignment in submission of {player_id}"));
        }
    }

    if state.phase == Phase::Matching
        && (state.options.is_empty() || state.round_start_time.is_none())
    {
        return Err("matching without options or start time".to_string());
    }

    if state.phase == Phase::Results && state.results.is_none() {
        return Err("results phase without results".to_string());
    }

    if state.phase != Phase::GameOver
        && state.phase != Phase::Lobby
        && state.current_round >= state.total_rounds
    {
        return Err(format!(
            "round {} out of {} total",
            state.current_round, state.total_rounds
        ));
    }

    for player in &state.players {
        let sum: u32 = player.points_history.iter().sum();
        if player.score != sum {
            return Err(format!(
                "score {} of {} does not match history sum {sum}",
                player.score, player.id
            ));
        }
    }

    Ok(())
}

/// Checks that the prompt player is the one whose turn it is. A prompt
/// player who left mid-round is exempt until the round advances.
pub fn check_turn_order(state: &LobbyState) -> Result<(), String> {
    let in_game = matches!(
        state.phase,
        Phase::Prompt | Phase::Matching | Phase::Results
    );
    if !in_game || state.players.is_empty() {
        return Ok(());
    }
    if let Some(prompt) = state.prompt_player_id.as_deref() {
        if state.phase != Phase::Prompt && !state.has_player(prompt) {
            return Ok(());
        }
    }
    let expected = &state.players[state.current_round as usize % state.players.len()].id;
    if state.prompt_player_id.as_ref() != Some(expected) {
        return Err(format!(
            "prompt player {:?} is not {expected}",
            state.prompt_player_id
        ));
    }
    Ok(())
}
