use std::collections::{BTreeMap, HashMap, HashSet};

use crate::lobby::models::{Player, RoundResults, Submission};

/// Outcome of scoring one round
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub results: RoundResults,
    pub players: Vec<Player>,
}

/// Counts, per option, how many submissions assigned each player to it.
///
/// Only options of the current round and candidates that are still in the
/// lobby are counted.
pub fn tally_votes<'a>(
    options: &'a [String],
    submissions: &'a BTreeMap<String, Submission>,
    players: &[Player],
) -> HashMap<&'a str, HashMap<&'a str, u32>> {
    let members: HashSet<&str> = players.iter().map(|p| p.id.as_str()).collect();
    let mut counts: HashMap<&str, HashMap<&str, u32>> = options
        .iter()
        .map(|option| (option.as_str(), HashMap::new()))
        .collect();

    for submission in submissions.values() {
        for (option, player_id) in submission {
            if !members.contains(player_id.as_str()) {
                continue;
            }
            if let Some(option_counts) = counts.get_mut(option.as_str()) {
                *option_counts.entry(player_id.as_str()).or_insert(0) += 1;
            }
        }
    }

    counts
}

/// Picks a winner per option, in option order. A player can win at most one
/// option; a tie at the top count leaves the option unassigned.
pub fn assign_winners(
    options: &[String],
    counts: &HashMap<&str, HashMap<&str, u32>>,
) -> RoundResults {
    let mut results = RoundResults::new();
    let mut assigned: HashSet<&str> = HashSet::new();

    for option in options {
        let mut candidates: Vec<(&str, u32)> = counts
            .get(option.as_str())
            .map(|option_counts| {
                option_counts
                    .iter()
                    .filter(|(player_id, _)| !assigned.contains(*player_id))
                    .map(|(player_id, count)| (*player_id, *count))
                    .collect()
            })
            .unwrap_or_default();

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let winner = match candidates.as_slice() {
            [] => None,
            [(_, top), (_, runner_up), ..] if top == runner_up => None,
            [(player_id, _), ..] => Some(*player_id),
        };

        if let Some(player_id) = winner {
            assigned.insert(player_id);
        }
        results.insert(option.clone(), winner.map(str::to_string));
    }

    results
}

/// Points a submission earns: one per option matching a non-null result
pub fn round_points(submission: &Submission, results: &RoundResults) -> u32 {
    submission
        .iter()
        .filter(|(option, player_id)| {
            matches!(results.get(*option), Some(Some(winner)) if winner == *player_id)
        })
        .count() as u32
}

/// Scores a round: assigns winners and records each player's points at
/// `current_round` in their history. Scores are recomputed from the history,
/// so re-scoring the same round is harmless.
pub fn score(
    options: &[String],
    submissions: &BTreeMap<String, Submission>,
    players: &[Player],
    current_round: u32,
) -> ScoreOutcome {
    let counts = tally_votes(options, submissions, players);
    let results = assign_winners(options, &counts);

    let round = current_round as usize;
    let players = players
        .iter()
        .map(|player| {
            let points = submissions
                .get(&player.id)
                .map(|submission| round_points(submission, &results))
                .unwrap_or(0);

            let mut updated = player.clone();
            if updated.points_history.len() <= round {
                updated.points_history.resize(round + 1, 0);
            }
            updated.points_history[round] = points;
            updated.score = updated.points_history.iter().sum();
            updated
        })
        .collect();

    ScoreOutcome { results, players }
}
