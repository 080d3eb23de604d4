//! Game logic: board validation, dictionary lookup, scoring and achievements.
//!
//! Everything in this module is a pure function or a pure-lookup trait impl
//! (§4.5-4.7). None of it holds a room lock or performs broadcast I/O; the
//! submission pipeline in `server::room_service` is what sequences these
//! calls against a locked `Room`.

pub mod achievements;
pub mod board;
pub mod collaborators;
pub mod dictionary;
pub mod profanity;
pub mod scoring;

pub use board::BoardValidator;
pub use collaborators::{AnalyticsSink, CommunityVoteHook, NoopAnalyticsSink, NoopCommunityVoteHook};
pub use dictionary::{AiVerdict, AiWordOracle, DictionaryOracle, UnavailableAiWordOracle};
