//! Community Vote Hook and Analytics Sink (§6 collaborator contracts): two
//! more external seams the core calls through but never implements, in the
//! same trait-plus-stub shape as `DictionaryOracle`/`AiWordOracle`.
//!
//! Grounded on `database/mod.rs`'s trait-plus-single-impl shape (same pattern
//! `game::dictionary` follows).

use async_trait::async_trait;

use crate::protocol::room_state::Room;
use crate::protocol::RoomCode;

/// `recordVote`/`collectNonDictionaryWords`/`getWordForPlayer` (§6): lets a
/// room fall back to crowd adjudication for a word the dictionary and AI
/// oracle both failed to resolve. Out of core scope per §1; this trait is
/// only the seam `round_coordinator`/`room_service` call through.
#[async_trait]
pub trait CommunityVoteHook: Send + Sync {
    /// Records one voter's opinion on a disputed word.
    async fn record_vote(&self, room_code: &RoomCode, word: &str, voter: &str, approve: bool);

    /// Words left undecided after the dictionary and AI passes, gathered for
    /// a voting round.
    async fn collect_non_dictionary_words(&self, room: &Room) -> Vec<String>;

    /// Picks one of `candidates` for `exclude_name` to vote on next (never
    /// the word they submitted themselves).
    async fn get_word_for_player(&self, candidates: &[String], exclude_name: &str) -> Option<String>;
}

/// No real community-voting collaborator is wired up (standalone runs, most
/// tests): votes are dropped and word selection just offers the first
/// undecided candidate.
#[derive(Debug, Default)]
pub struct NoopCommunityVoteHook;

#[async_trait]
impl CommunityVoteHook for NoopCommunityVoteHook {
    async fn record_vote(&self, _room_code: &RoomCode, _word: &str, _voter: &str, _approve: bool) {}

    async fn collect_non_dictionary_words(&self, room: &Room) -> Vec<String> {
        let mut words: Vec<String> = room
            .word_details
            .values()
            .flat_map(|details| details.iter().filter(|d| d.validated.is_none()).map(|d| d.word.clone()))
            .collect();
        words.sort();
        words.dedup();
        words
    }

    async fn get_word_for_player(&self, candidates: &[String], _exclude_name: &str) -> Option<String> {
        candidates.first().cloned()
    }
}

/// `processGameResults(code, scores[], meta, authMap)` (§6): a post-game
/// reporting sink invoked after `validatedScores` is broadcast. Failure here
/// must never affect gameplay, so callers only log an error, never propagate
/// one to a client.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn process_game_results(
        &self,
        room_code: &RoomCode,
        scores: &[(String, u32)],
        is_ranked: bool,
    ) -> anyhow::Result<()>;
}

/// No real analytics collaborator is wired up; every call is a no-op.
#[derive(Debug, Default)]
pub struct NoopAnalyticsSink;

#[async_trait]
impl AnalyticsSink for NoopAnalyticsSink {
    async fn process_game_results(
        &self,
        _room_code: &RoomCode,
        _scores: &[(String, u32)],
        _is_ranked: bool,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::room_state::{ParticipantRecord, WordDetail};
    use crate::protocol::types::GameLanguage;
    use uuid::Uuid;

    fn sample_room() -> Room {
        let mut room = Room::new("ABCD", "Test Room", GameLanguage::En, false, true, 8);
        room.add_participant(ParticipantRecord::new("alice", None, true, Uuid::new_v4(), None, None));
        room
    }

    #[tokio::test]
    async fn noop_vote_hook_collects_only_undecided_words() {
        let mut room = sample_room();
        room.word_details.insert(
            "alice".to_string(),
            vec![
                WordDetail {
                    word: "cat".to_string(),
                    score_so_far: 2,
                    combo_bonus: 0,
                    combo_level: 0,
                    validated: Some(true),
                    auto_validated: true,
                    is_duplicate: false,
                    ai_verified: false,
                },
                WordDetail {
                    word: "zzz".to_string(),
                    score_so_far: 0,
                    combo_bonus: 0,
                    combo_level: 0,
                    validated: None,
                    auto_validated: false,
                    is_duplicate: false,
                    ai_verified: false,
                },
            ],
        );

        let hook = NoopCommunityVoteHook;
        let words = hook.collect_non_dictionary_words(&room).await;
        assert_eq!(words, vec!["zzz".to_string()]);
    }

    #[tokio::test]
    async fn noop_analytics_sink_never_errors() {
        let sink = NoopAnalyticsSink;
        sink.process_game_results(&"ABCD".to_string(), &[("alice".to_string(), 5)], false)
            .await
            .expect("noop sink never fails");
    }
}
