use crate::config::ProtocolConfig;
use rand::RngExt;

/// Generate a room code avoiding visually confusing characters (0, O, I, 1),
/// at the length configured by `ProtocolConfig::room_code_length` (4 by
/// default, per §3's "4-character code").
pub fn generate_room_code_with_config(config: &ProtocolConfig) -> String {
    generate_room_code_of_length(config.room_code_length)
}

/// Generate a clean room code of the requested length.
pub fn generate_room_code_of_length(length: usize) -> String {
    const CLEAN_CHARS: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
    if length == 0 {
        return String::new();
    }
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CLEAN_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = CLEAN_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Convenience wrapper using the compiled default config.
#[allow(dead_code)]
pub fn generate_room_code() -> String {
    generate_room_code_with_config(&ProtocolConfig::default())
}
