//! Pure scoring functions (§4.7). No predecessor analogue; written in the
//! free-function-with-config convention established by
//! `protocol::room_codes` (plain functions taking explicit inputs, no
//! hidden state).

use crate::protocol::types::MAX_COMBO_LEVEL;

/// Combo bonus per level (Open Question, resolved in DESIGN.md): a flat
/// per-level increment, clamped to the documented 0-10 combo range so the
/// maximum bonus is bounded by construction.
pub const COMBO_BONUS_PER_LEVEL: u32 = 2;

/// Base score for a word of the given length: `length - 1`, per §4.7,
/// floored at 0 so a 0- or 1-letter candidate never scores negative.
#[must_use]
pub fn base_score(length: usize) -> u32 {
    u32::try_from(length.saturating_sub(1)).unwrap_or(u32::MAX)
}

/// Combo bonus for a claimed combo level, clamped to `MAX_COMBO_LEVEL`
/// server-side before the client's claim is trusted.
#[must_use]
pub fn combo_bonus(combo_level: u8) -> u32 {
    u32::from(combo_level.min(MAX_COMBO_LEVEL)) * COMBO_BONUS_PER_LEVEL
}

/// Total score for a single accepted word: `base + comboBonus(comboLevel)`.
#[must_use]
pub fn word_score(length: usize, combo_level: u8) -> u32 {
    base_score(length) + combo_bonus(combo_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_score_is_length_minus_one() {
        assert_eq!(base_score(3), 2);
        assert_eq!(base_score(0), 0);
        assert_eq!(base_score(1), 0);
    }

    #[test]
    fn combo_bonus_clamps_to_max_level() {
        assert_eq!(combo_bonus(3), 6);
        assert_eq!(combo_bonus(MAX_COMBO_LEVEL), 20);
        assert_eq!(combo_bonus(255), combo_bonus(MAX_COMBO_LEVEL));
    }

    #[test]
    fn word_score_matches_happy_path_example() {
        // §8 scenario 1: "cat", comboLevel 0 -> score 2.
        assert_eq!(word_score(3, 0), 2);
    }
}
