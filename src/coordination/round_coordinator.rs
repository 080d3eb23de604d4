//! Round Coordinator (§2 item 7, §4.6): the per-room countdown timer, the
//! game-start acknowledgment barrier, and the end-of-round scoring pass.
//!
//! Grounded on `room_coordinator.rs`'s `RoomOperationCoordinatorTrait` shape
//! (a trait-plus-in-memory-impl pair, each room operation acquiring a
//! distributed lock before mutating) and `server/heartbeat.rs`'s
//! throttled-tick pattern for the 1 Hz timer loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::game::{AiVerdict, AiWordOracle, AnalyticsSink, CommunityVoteHook, DictionaryOracle};
use crate::protocol::types::{DictionaryVerdict, GameLanguage, GameState, GridCell};
use crate::protocol::{Room, RoomCode, ServerMessage, ValidatedScoresPayload};

use super::MessageCoordinator;

/// Seconds a start barrier waits for acknowledgments before forcing the
/// timer to begin anyway (§4.6).
const START_BARRIER_DEADLINE_SECS: i64 = 5;

/// Shared, lockable handle to a room; owned by the Room Store in the full
/// system, passed in here so the coordinator never needs to know how rooms
/// are looked up by code.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Trait for round operation coordination (§4.6).
#[async_trait]
pub trait RoundCoordinatorTrait: Send + Sync {
    /// Starts a round: mutates `room` into `InProgress` with the given grid
    /// and opens the start barrier, then broadcasts `startGame`. Spawns the
    /// background tasks that wait out the barrier and drive the 1 Hz tick.
    async fn start_round(
        &self,
        room_code: RoomCode,
        room: RoomHandle,
        grid: Vec<Vec<GridCell>>,
        seconds: u32,
        language: GameLanguage,
        min_word_length: usize,
        expected_participants: HashSet<String>,
    ) -> Result<()>;

    /// Records a `startGameAck`. Returns `true` if this call closed the
    /// barrier (all expected participants acknowledged).
    async fn acknowledge_start(
        &self,
        room_code: &RoomCode,
        message_id: &str,
        participant: &str,
    ) -> bool;

    /// Cancels every background task for a room, if any are running: the
    /// barrier wait, the tick loop, and a pending validation deadline
    /// (manual `endRound`, `resetRoom`, `closeRoom`).
    async fn cancel(&self, room_code: &RoomCode);

    /// Runs the end-of-round pass (§4.6): dictionary pass, a budgeted AI
    /// pass, and either a final `validatedScores` or a deferred-to-deadline
    /// outcome if the AI budget couldn't clear every undecided word. Locks
    /// `room` itself and drops the lock around the AI oracle calls (§5).
    async fn end_round(&self, room_code: &RoomCode, room: RoomHandle) -> EndOfRoundOutcome;

    /// Applies a host's `validateWords` decision to a room's still-undecided
    /// words, finalizes the round, and cancels any pending validation
    /// deadline task. Caller already holds `room`'s local lock.
    async fn finalize_validation(
        &self,
        room_code: &RoomCode,
        room: &mut Room,
        approved: &HashSet<String>,
    ) -> EndOfRoundOutcome;
}

/// Result of an end-of-round pass. `message` is `None` when the pass
/// deferred to host adjudication or the validation deadline instead of
/// broadcasting a final `validatedScores` itself (the `showValidation` and
/// `validationTimeoutStarted` broadcasts for that case are sent directly by
/// the coordinator, since no caller is still around by the time the deadline
/// fires).
#[derive(Debug, Clone)]
pub struct EndOfRoundOutcome {
    pub message: Option<ServerMessage>,
    pub duplicate_words: Vec<String>,
    pub validation_pending: bool,
}

struct RoomTasks {
    room: RoomHandle,
    barrier_notify: Arc<Notify>,
    barrier_task: JoinHandle<()>,
    tick_task: Option<JoinHandle<()>>,
}

impl RoomTasks {
    fn abort(&mut self) {
        self.barrier_task.abort();
        if let Some(tick) = self.tick_task.take() {
            tick.abort();
        }
    }
}

/// Shared state behind `InMemoryRoundCoordinator`, kept in its own `Arc` so
/// the tick/barrier/deadline tasks it spawns can hold a `'static` clone of
/// themselves without the trait-facing type needing an `Arc<Self>` receiver.
struct Inner {
    coordinator: Arc<dyn MessageCoordinator>,
    dictionary: Arc<dyn DictionaryOracle>,
    ai_oracle: Arc<dyn AiWordOracle>,
    vote_hook: Arc<dyn CommunityVoteHook>,
    analytics: Arc<dyn AnalyticsSink>,
    /// Per-room cap on AI-oracle calls made during one end-of-round pass (§4.6).
    ai_budget: usize,
    /// How long a round's unresolved words stay open for host adjudication
    /// before auto-validation falls back to dictionary-only (§4.6).
    validation_deadline_secs: i64,
    tasks: Mutex<HashMap<RoomCode, RoomTasks>>,
    validation_tasks: Mutex<HashMap<RoomCode, JoinHandle<()>>>,
}

pub struct InMemoryRoundCoordinator {
    inner: Arc<Inner>,
}

impl InMemoryRoundCoordinator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coordinator: Arc<dyn MessageCoordinator>,
        dictionary: Arc<dyn DictionaryOracle>,
        ai_oracle: Arc<dyn AiWordOracle>,
        vote_hook: Arc<dyn CommunityVoteHook>,
        analytics: Arc<dyn AnalyticsSink>,
        ai_budget: usize,
        validation_deadline_secs: i64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                coordinator,
                dictionary,
                ai_oracle,
                vote_hook,
                analytics,
                ai_budget,
                validation_deadline_secs,
                tasks: Mutex::new(HashMap::new()),
                validation_tasks: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl Inner {
    /// Spawns the 1 Hz tick loop for a room once its start barrier has
    /// closed. Ticks until `remainingSeconds` reaches 0, then runs the
    /// end-of-round pass itself and stops.
    fn spawn_tick(self: &Arc<Self>, room_code: RoomCode, room: RoomHandle) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let coordinator = self.coordinator.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(StdDuration::from_secs(1));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let (remaining, ended) = {
                    let mut guard = room.lock().await;
                    if guard.game_state != GameState::InProgress {
                        return;
                    }
                    guard.remaining_seconds = guard.remaining_seconds.saturating_sub(1);
                    (guard.remaining_seconds, guard.remaining_seconds == 0)
                };

                let _ = coordinator
                    .broadcast_to_room(
                        &room_code,
                        Arc::new(ServerMessage::TimeUpdate {
                            remaining_seconds: remaining,
                        }),
                    )
                    .await;

                if ended {
                    this.tasks.lock().await.remove(&room_code);
                    let outcome = this.run_end_of_round(&room_code, room).await;
                    let _ = coordinator
                        .broadcast_to_room(&room_code, Arc::new(ServerMessage::EndGame))
                        .await;
                    if let Some(message) = outcome.message {
                        let _ = coordinator.broadcast_to_room(&room_code, Arc::new(message)).await;
                    }
                    return;
                }
            }
        })
    }

    /// Waits for the start barrier to close (either notified by
    /// `acknowledge_start` or the deadline elapsing), then begins the tick.
    fn spawn_barrier_wait(
        self: &Arc<Self>,
        room_code: RoomCode,
        room: RoomHandle,
        notify: Arc<Notify>,
        deadline: chrono::DateTime<chrono::Utc>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let wait = (deadline - chrono::Utc::now())
                .to_std()
                .unwrap_or(StdDuration::ZERO);

            tokio::select! {
                () = notify.notified() => {}
                () = tokio::time::sleep(wait) => {}
            }

            {
                let mut guard = room.lock().await;
                if guard.game_state != GameState::InProgress {
                    return;
                }
                guard.start_barrier = None;
            }

            let tick_task = this.spawn_tick(room_code.clone(), room);

            if let Some(entry) = this.tasks.lock().await.get_mut(&room_code) {
                entry.tick_task = Some(tick_task);
            }
        })
    }

    /// Stage 2 of the end-of-round pass: runs with the room lock dropped,
    /// attempting the AI oracle for up to `ai_budget` still-undecided words
    /// and broadcasting `wordValidatingWithAI` for each attempt (§4.6, §5).
    async fn resolve_via_ai(
        &self,
        room_code: &RoomCode,
        language: GameLanguage,
        candidates: Vec<(String, String)>,
    ) -> (Vec<(String, String, AiVerdict)>, Vec<String>) {
        let attempted: Vec<(String, String)> = candidates.iter().take(self.ai_budget).cloned().collect();
        let deferred: Vec<String> = candidates.iter().skip(self.ai_budget).map(|(_, word)| word.clone()).collect();

        for (_, word) in &attempted {
            let _ = self
                .coordinator
                .broadcast_to_room(room_code, Arc::new(ServerMessage::WordValidatingWithAI { word: word.clone() }))
                .await;
        }

        let mut results = Vec::with_capacity(attempted.len());
        for (participant, word) in attempted {
            let verdict = self.ai_oracle.validate_word(&word, language).await;
            results.push((participant, word, verdict));
        }

        (results, deferred)
    }

    /// The end-of-round pass (§4.6): collect unique candidates, partition by
    /// dictionary membership, give the non-dictionary subset a budgeted AI
    /// pass, and either finalize or defer the rest to host adjudication.
    async fn run_end_of_round(self: &Arc<Self>, room_code: &RoomCode, room: RoomHandle) -> EndOfRoundOutcome {
        // Idempotent: the natural timer-driven path already removed this
        // room's tick/barrier bookkeeping; a host-driven `endRound` hasn't,
        // so this covers both without touching `validation_tasks` (a
        // deferred outcome below may still need to add to it).
        self.tasks.lock().await.remove(room_code);

        let (language, ai_candidates) = {
            let mut guard = room.lock().await;
            guard.game_state = GameState::Finished;

            let mut ai_candidates = Vec::new();
            let participants: Vec<String> = guard.word_details.keys().cloned().collect();
            let language = guard.language;
            for participant in &participants {
                let Some(details) = guard.word_details.get_mut(participant) else {
                    continue;
                };
                for detail in details.iter_mut() {
                    if detail.validated.is_some() {
                        continue;
                    }
                    match self.dictionary.lookup(&detail.word, language).await {
                        DictionaryVerdict::Valid => {
                            detail.validated = Some(true);
                            detail.auto_validated = true;
                        }
                        DictionaryVerdict::Invalid | DictionaryVerdict::Unknown => {
                            ai_candidates.push((participant.clone(), detail.word.clone()));
                        }
                    }
                }
            }
            (language, ai_candidates)
        };

        let (ai_results, deferred_words) = self.resolve_via_ai(room_code, language, ai_candidates).await;

        let mut guard = room.lock().await;
        for (participant, word, verdict) in ai_results {
            if let Some(detail) = guard
                .word_details
                .get_mut(&participant)
                .and_then(|details| details.iter_mut().find(|d| d.word == word && d.validated.is_none()))
            {
                match verdict {
                    AiVerdict::Valid => {
                        detail.validated = Some(true);
                        detail.ai_verified = true;
                    }
                    AiVerdict::Invalid | AiVerdict::Unavailable => {
                        detail.validated = Some(false);
                        detail.score_so_far = 0;
                    }
                }
            }
        }

        if deferred_words.is_empty() {
            let (message, duplicate_words) = finalize_round(&mut guard);
            self.run_analytics(room_code, &guard).await;
            return EndOfRoundOutcome {
                message: Some(message),
                duplicate_words,
                validation_pending: false,
            };
        }

        let deadline = chrono::Utc::now() + chrono::Duration::seconds(self.validation_deadline_secs);
        guard.validation_deadline = Some(deadline);
        drop(guard);

        let _ = self
            .coordinator
            .broadcast_to_room(room_code, Arc::new(ServerMessage::ShowValidation { non_dictionary_words: deferred_words }))
            .await;
        let _ = self
            .coordinator
            .broadcast_to_room(
                room_code,
                Arc::new(ServerMessage::ValidationTimeoutStarted {
                    deadline_seconds: self.validation_deadline_secs.max(0) as u32,
                }),
            )
            .await;

        let deadline_task = self.spawn_validation_deadline(room_code.clone(), room, deadline);
        self.validation_tasks.lock().await.insert(room_code.clone(), deadline_task);

        EndOfRoundOutcome {
            message: None,
            duplicate_words: Vec::new(),
            validation_pending: true,
        }
    }

    /// Fires once `room.validation_deadline` elapses: dictionary-only
    /// auto-validation of anything the host never adjudicated, then a final
    /// `validatedScores` (§4.6 — no AI on this path). A no-op if the host
    /// already adjudicated (the deadline was cleared) before this fires.
    fn spawn_validation_deadline(
        self: &Arc<Self>,
        room_code: RoomCode,
        room: RoomHandle,
        deadline: chrono::DateTime<chrono::Utc>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let wait = (deadline - chrono::Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
            tokio::time::sleep(wait).await;

            let finalized = {
                let mut guard = room.lock().await;
                if guard.validation_deadline != Some(deadline) {
                    return;
                }
                guard.validation_deadline = None;

                let participants: Vec<String> = guard.word_details.keys().cloned().collect();
                let language = guard.language;
                for participant in &participants {
                    let Some(details) = guard.word_details.get_mut(&participant) else {
                        continue;
                    };
                    for detail in details.iter_mut() {
                        if detail.validated.is_some() {
                            continue;
                        }
                        match this.dictionary.lookup(&detail.word, language).await {
                            DictionaryVerdict::Valid => {
                                detail.validated = Some(true);
                                detail.auto_validated = true;
                            }
                            DictionaryVerdict::Invalid | DictionaryVerdict::Unknown => {
                                detail.validated = Some(false);
                                detail.score_so_far = 0;
                            }
                        }
                    }
                }

                let (message, _) = finalize_round(&mut guard);
                this.run_analytics(&room_code, &guard).await;
                message
            };

            this.validation_tasks.lock().await.remove(&room_code);
            let _ = this
                .coordinator
                .broadcast_to_room(&room_code, Arc::new(ServerMessage::AutoValidationOccurred))
                .await;
            let _ = this.coordinator.broadcast_to_room(&room_code, Arc::new(finalized)).await;
        })
    }

    /// `processGameResults` (§6), invoked after `validatedScores`. Failure
    /// must never affect gameplay, so it's logged and swallowed.
    async fn run_analytics(&self, room_code: &RoomCode, room: &Room) {
        let scores: Vec<(String, u32)> = room.scores.clone().into_iter().collect();
        if let Err(err) = self.analytics.process_game_results(room_code, &scores, room.is_ranked).await {
            tracing::warn!(room_code = %room_code, error = %err, "analytics sink failed, ignoring");
        }
    }
}

#[async_trait]
impl RoundCoordinatorTrait for InMemoryRoundCoordinator {
    async fn start_round(
        &self,
        room_code: RoomCode,
        room: RoomHandle,
        grid: Vec<Vec<GridCell>>,
        seconds: u32,
        language: GameLanguage,
        min_word_length: usize,
        expected_participants: HashSet<String>,
    ) -> Result<()> {
        let inner = &self.inner;
        let message_id = Uuid::new_v4().to_string();
        let deadline;

        {
            let mut guard = room.lock().await;
            guard.grid = grid.clone();
            guard.rebuild_positions_index();
            guard.language = language;
            guard.min_word_length = min_word_length;
            guard.duration_secs = seconds;
            guard.remaining_seconds = seconds;
            guard.game_state = GameState::InProgress;
            guard.started_at = Some(chrono::Utc::now());
            guard.ends_at = Some(chrono::Utc::now() + chrono::Duration::seconds(i64::from(seconds)));
            let barrier = crate::protocol::GameStartBarrier::new(
                message_id.clone(),
                expected_participants,
                START_BARRIER_DEADLINE_SECS,
            );
            deadline = barrier.deadline;
            guard.start_barrier = Some(barrier);
            guard.update_activity();
        }

        inner
            .coordinator
            .broadcast_to_room(
                &room_code,
                Arc::new(ServerMessage::StartGame {
                    grid,
                    seconds,
                    language,
                    min_word_length,
                    message_id,
                    skip_ack: false,
                }),
            )
            .await?;

        let notify = Arc::new(Notify::new());
        let barrier_task = inner.spawn_barrier_wait(room_code.clone(), room.clone(), notify.clone(), deadline);

        inner.tasks.lock().await.insert(
            room_code,
            RoomTasks {
                room,
                barrier_notify: notify,
                barrier_task,
                tick_task: None,
            },
        );

        Ok(())
    }

    async fn acknowledge_start(
        &self,
        room_code: &RoomCode,
        message_id: &str,
        participant: &str,
    ) -> bool {
        let Some((room, notify)) = self
            .inner
            .tasks
            .lock()
            .await
            .get(room_code)
            .map(|t| (t.room.clone(), t.barrier_notify.clone()))
        else {
            return false;
        };

        let complete = {
            let mut guard = room.lock().await;
            let Some(barrier) = guard.start_barrier.as_mut() else {
                return false;
            };
            barrier.acknowledge(message_id, participant);
            barrier.is_complete()
        };

        if complete {
            notify.notify_one();
        }
        complete
    }

    async fn cancel(&self, room_code: &RoomCode) {
        if let Some(mut tasks) = self.inner.tasks.lock().await.remove(room_code) {
            tasks.abort();
        }
        if let Some(task) = self.inner.validation_tasks.lock().await.remove(room_code) {
            task.abort();
        }
    }

    async fn end_round(&self, room_code: &RoomCode, room: RoomHandle) -> EndOfRoundOutcome {
        self.inner.run_end_of_round(room_code, room).await
    }

    async fn finalize_validation(
        &self,
        room_code: &RoomCode,
        room: &mut Room,
        approved: &HashSet<String>,
    ) -> EndOfRoundOutcome {
        let inner = &self.inner;
        room.validation_deadline = None;
        if let Some(task) = inner.validation_tasks.lock().await.remove(room_code) {
            task.abort();
        }

        for details in room.word_details.values_mut() {
            for detail in details.iter_mut() {
                if detail.validated.is_some() {
                    continue;
                }
                if approved.contains(&detail.word) {
                    detail.validated = Some(true);
                    detail.score_so_far = crate::game::scoring::word_score(detail.word.chars().count(), detail.combo_level);
                } else {
                    detail.validated = Some(false);
                    detail.score_so_far = 0;
                }
            }
        }

        for word in approved {
            inner.vote_hook.record_vote(room_code, word, "host", true).await;
        }

        let (message, duplicate_words) = finalize_round(room);
        inner.run_analytics(room_code, room).await;
        EndOfRoundOutcome {
            message: Some(message),
            duplicate_words,
            validation_pending: false,
        }
    }
}

/// Cross-participant duplicate detection, final score recomputation, final
/// achievements, and per-player titles, shared by every path that closes out
/// a round (budget-cleared, host-adjudicated, deadline-expired).
fn finalize_round(room: &mut Room) -> (ServerMessage, Vec<String>) {
    let mut occurrences: HashMap<String, u32> = HashMap::new();
    for details in room.word_details.values() {
        for detail in details {
            if detail.validated == Some(true) {
                *occurrences.entry(detail.word.clone()).or_insert(0) += 1;
            }
        }
    }
    let mut duplicate_words = Vec::new();
    for details in room.word_details.values_mut() {
        for detail in details.iter_mut() {
            if detail.validated == Some(true) && occurrences.get(&detail.word).copied().unwrap_or(0) > 1
            {
                detail.is_duplicate = true;
                detail.score_so_far = 0;
                duplicate_words.push(detail.word.clone());
            }
        }
    }
    duplicate_words.sort();
    duplicate_words.dedup();

    for (participant, details) in &room.word_details {
        let total: u32 = details.iter().map(|d| d.score_so_far).sum();
        room.scores.insert(participant.clone(), total);
    }

    for (participant, details) in room.word_details.clone() {
        let unlocked = crate::game::achievements::final_achievements_for_participant(&details);
        let entry = room.achievements_awarded.entry(participant).or_default();
        for key in unlocked {
            entry.insert(key.to_string());
        }
    }

    let titles = compute_titles(room);

    let payload = ValidatedScoresPayload {
        scores: room.scores.clone().into_iter().collect(),
        grid: room.grid.clone(),
        word_details: room.word_details.clone(),
        titles,
    };

    (ServerMessage::ValidatedScores(Box::new(payload)), duplicate_words)
}

/// A small set of flavor titles based on each participant's final standing.
/// No predecessor analogue; new domain logic in the spirit of the
/// achievement evaluators, kept deliberately simple (§4.6 "compute per-player
/// titles" does not specify a scheme).
fn compute_titles(room: &Room) -> HashMap<String, String> {
    let mut ranked: Vec<(&String, &u32)> = room.scores.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1));

    let mut titles = HashMap::new();
    for (index, (participant, _score)) in ranked.iter().enumerate() {
        let title = match index {
            0 => "Word Wizard",
            1 => "Runner-Up",
            _ => "Word Finder",
        };
        titles.insert((*participant).clone(), title.to_string());
    }
    titles
}
