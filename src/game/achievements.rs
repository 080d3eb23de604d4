//! Achievement evaluation (§4.7). All evaluation is a pure function over the
//! room aggregate; callers are responsible for idempotently merging the
//! returned keys into `Room::achievements_awarded` / `timing_achievements`
//! (§3 invariant 9). No predecessor analogue; new domain logic, written in
//! the plain-function style of `protocol::room_codes`.

use std::time::Duration;

use crate::protocol::room_state::{Room, WordDetail};

/// Timing-based achievements survive a round reset (§4.7); everything else
/// is recomputed from scratch each round.
pub const FIRST_BLOOD: &str = "first_blood";
pub const SPEED_DEMON: &str = "speed_demon";

pub const LONG_WORD: &str = "long_word";
pub const CENTURY_CLUB: &str = "century_club";
pub const CLEAN_SWEEP: &str = "clean_sweep";

const LONG_WORD_THRESHOLD: usize = 6;
const SPEED_DEMON_WINDOW: Duration = Duration::from_secs(5);
const CENTURY_CLUB_THRESHOLD: u32 = 100;

/// Checked on each `Valid` submission (§4.5, §4.7): first word found in the
/// room, long-word threshold, speed-demon window. Returns newly-unlocked
/// achievement keys only (callers must check `achievements_awarded` /
/// `timing_achievements` before calling, or dedupe on insert).
#[must_use]
pub fn live_achievements_for_submission(
    room: &Room,
    participant: &str,
    word_len: usize,
) -> Vec<&'static str> {
    let mut unlocked = Vec::new();

    let room_has_no_prior_accepted_words = room
        .word_details
        .values()
        .flatten()
        .filter(|w| w.auto_validated || w.ai_verified)
        .count()
        == 0;
    if room_has_no_prior_accepted_words {
        unlocked.push(FIRST_BLOOD);
    }

    if word_len >= LONG_WORD_THRESHOLD {
        unlocked.push(LONG_WORD);
    }

    if let Some(started_at) = room.started_at {
        let elapsed = chrono::Utc::now() - started_at;
        if elapsed.to_std().unwrap_or(Duration::MAX) <= SPEED_DEMON_WINDOW {
            unlocked.push(SPEED_DEMON);
        }
    }

    unlocked
}

/// Computed from the finished room aggregate (§4.7): overall word count,
/// longest word, category coverage (languages represented are out of scope
/// for a single-language round; "category" here is interpreted as
/// all-submissions-validated, i.e. `clean_sweep`), perfect-validation runs.
#[must_use]
pub fn final_achievements_for_participant(details: &[WordDetail]) -> Vec<&'static str> {
    let mut unlocked = Vec::new();

    let total_score: u32 = details.iter().map(|d| d.score_so_far).sum();
    if total_score >= CENTURY_CLUB_THRESHOLD {
        unlocked.push(CENTURY_CLUB);
    }

    if !details.is_empty() && details.iter().all(|d| d.validated == Some(true)) {
        unlocked.push(CLEAN_SWEEP);
    }

    unlocked
}

/// Names the subset of achievement keys considered timing-based and thus
/// preserved across `resetRoom` (§3 invariant 9, §4.7).
#[must_use]
pub fn is_timing_based(key: &str) -> bool {
    matches!(key, FIRST_BLOOD | SPEED_DEMON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::GameLanguage;

    fn sample_room() -> Room {
        let mut room = Room::new("ABCD", "Test", GameLanguage::En, false, true, 8);
        room.started_at = Some(chrono::Utc::now());
        room
    }

    #[test]
    fn first_submission_unlocks_first_blood() {
        let room = sample_room();
        let unlocked = live_achievements_for_submission(&room, "alice", 3);
        assert!(unlocked.contains(&FIRST_BLOOD));
    }

    #[test]
    fn long_word_threshold_is_inclusive() {
        let room = sample_room();
        assert!(live_achievements_for_submission(&room, "alice", 6).contains(&LONG_WORD));
        assert!(!live_achievements_for_submission(&room, "alice", 5).contains(&LONG_WORD));
    }

    #[test]
    fn clean_sweep_requires_all_validated() {
        let details = vec![WordDetail {
            word: "cat".into(),
            score_so_far: 2,
            combo_bonus: 0,
            combo_level: 0,
            validated: Some(true),
            auto_validated: true,
            is_duplicate: false,
            ai_verified: false,
        }];
        assert!(final_achievements_for_participant(&details).contains(&CLEAN_SWEEP));
    }

    #[test]
    fn timing_based_keys_survive_reset() {
        assert!(is_timing_based(FIRST_BLOOD));
        assert!(is_timing_based(SPEED_DEMON));
        assert!(!is_timing_based(LONG_WORD));
        assert!(!is_timing_based(CENTURY_CLUB));
    }
}
