//! zkpaste-pow: proof-of-work solver for upload rate limiting
//!
//! A challenge `{salt, difficulty}` is solved by the smallest decimal nonce
//! such that `hex(sha256(salt ++ nonce))` starts with `difficulty` zeros.
//! The search runs on a dedicated OS thread and reports back over a oneshot
//! channel, so an async caller awaits the channel and never the loop itself.
//!
//! Solver lifecycle:
//! ```text
//! Idle ──start──▶ Solving ──found──▶ Solved
//!                    └─────cancel──▶ Cancelled
//! ```

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::oneshot;
use tracing::{debug, info};

use zkpaste_core::types::{PowChallenge, PowSolution};
use zkpaste_core::{PasteError, PasteResult};

/// A SHA-256 hex digest has 64 characters; no larger difficulty is solvable.
pub const MAX_DIFFICULTY: u32 = 64;

/// Iterations between cancellation checks.
pub const CHECK_INTERVAL: u64 = 4096;

/// Number of leading zero hex digits in a digest.
pub fn leading_zero_nibbles(digest: &[u8]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

/// True if `sha256(salt ++ nonce)` has at least `difficulty` leading hex zeros.
pub fn meets_difficulty(salt: &str, nonce: &str, difficulty: u32) -> bool {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(nonce.as_bytes());
    leading_zero_nibbles(&hasher.finalize()) >= difficulty
}

/// Brute-force search on the current thread.
///
/// Checks `cancel` every [`CHECK_INTERVAL`] iterations and returns `None`
/// once it is set. `attempts` is updated at the same cadence.
pub fn solve_blocking(
    salt: &str,
    difficulty: u32,
    cancel: &AtomicBool,
    attempts: &AtomicU64,
) -> Option<String> {
    let prefix = Sha256::new_with_prefix(salt.as_bytes());
    let mut nonce_buf = String::with_capacity(20);
    let mut nonce: u64 = 0;

    loop {
        nonce_buf.clear();
        // Writing into a String cannot fail.
        let _ = write!(nonce_buf, "{nonce}");

        let digest = prefix.clone().chain_update(nonce_buf.as_bytes()).finalize();
        if leading_zero_nibbles(&digest) >= difficulty {
            attempts.store(nonce + 1, Ordering::Relaxed);
            return Some(nonce_buf);
        }

        nonce += 1;
        if nonce.is_multiple_of(CHECK_INTERVAL) {
            attempts.store(nonce, Ordering::Relaxed);
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Idle,
    Solving,
    Solved,
    Cancelled,
}

impl SolverState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SolverState::Idle,
            1 => SolverState::Solving,
            2 => SolverState::Solved,
            _ => SolverState::Cancelled,
        }
    }
}

/// Result delivered over the solver's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved { solution: PowSolution, attempts: u64 },
    Cancelled,
}

/// An idle solver. [`PowSolver::start`] moves it to `Solving`.
#[derive(Debug, Default)]
pub struct PowSolver {
    _private: (),
}

impl PowSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SolverState {
        SolverState::Idle
    }

    /// Spawn the search on a dedicated thread.
    pub fn start(self, challenge: &PowChallenge) -> PasteResult<SolveHandle> {
        if challenge.difficulty > MAX_DIFFICULTY {
            return Err(PasteError::Challenge(format!(
                "difficulty {} exceeds maximum {MAX_DIFFICULTY}",
                challenge.difficulty
            )));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicU64::new(0));
        let state = Arc::new(AtomicU8::new(SolverState::Solving as u8));
        let (tx, rx) = oneshot::channel();

        let salt = challenge.salt.clone();
        let difficulty = challenge.difficulty;
        let thread_cancel = cancel.clone();
        let thread_attempts = attempts.clone();
        let thread_state = state.clone();

        debug!(difficulty, "starting proof-of-work search");

        std::thread::Builder::new()
            .name("pow-solver".into())
            .spawn(move || {
                let started = std::time::Instant::now();
                let outcome = match solve_blocking(&salt, difficulty, &thread_cancel, &thread_attempts)
                {
                    Some(nonce) => {
                        let attempts = thread_attempts.load(Ordering::Relaxed);
                        info!(
                            difficulty,
                            attempts,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "proof-of-work solved"
                        );
                        thread_state.store(SolverState::Solved as u8, Ordering::Release);
                        SolveOutcome::Solved {
                            solution: PowSolution { nonce },
                            attempts,
                        }
                    }
                    None => {
                        debug!(difficulty, "proof-of-work search cancelled");
                        thread_state.store(SolverState::Cancelled as u8, Ordering::Release);
                        SolveOutcome::Cancelled
                    }
                };
                // Receiver gone means the caller no longer cares.
                let _ = tx.send(outcome);
            })
            .map_err(|e| PasteError::Challenge(format!("spawning solver thread: {e}")))?;

        Ok(SolveHandle {
            cancel,
            attempts,
            state,
            rx,
        })
    }
}

/// Handle to a running search.
///
/// Dropping the handle cancels the search.
#[derive(Debug)]
pub struct SolveHandle {
    cancel: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
    state: Arc<AtomicU8>,
    rx: oneshot::Receiver<SolveOutcome>,
}

impl SolveHandle {
    /// Request termination. Partial progress is discarded.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn state(&self) -> SolverState {
        SolverState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Nonces tried so far (updated every [`CHECK_INTERVAL`] iterations).
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// A cheap cloneable canceller, for use while `wait` holds the handle.
    pub fn canceller(&self) -> Canceller {
        Canceller(self.cancel.clone())
    }

    pub async fn wait(mut self) -> SolveOutcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => SolveOutcome::Cancelled,
        }
    }

    /// Wait and turn cancellation into [`PasteError::Challenge`].
    pub async fn solution(self) -> PasteResult<PowSolution> {
        match self.wait().await {
            SolveOutcome::Solved { solution, .. } => Ok(solution),
            SolveOutcome::Cancelled => Err(PasteError::Challenge("solver cancelled".into())),
        }
    }
}

impl Drop for SolveHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Solve a challenge on a dedicated thread and await the nonce.
pub async fn solve(challenge: &PowChallenge) -> PasteResult<PowSolution> {
    PowSolver::new().start(challenge)?.solution().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn challenge(salt: &str, difficulty: u32) -> PowChallenge {
        PowChallenge {
            salt: salt.into(),
            difficulty,
            timestamp: 0,
            signature: "sig".into(),
        }
    }

    #[test]
    fn test_leading_zero_nibbles() {
        assert_eq!(leading_zero_nibbles(&[0xFF]), 0);
        assert_eq!(leading_zero_nibbles(&[0x0F]), 1);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x1F]), 2);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x01]), 3);
        assert_eq!(leading_zero_nibbles(&[0x00, 0x00]), 4);
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        assert!(meets_difficulty("anything", "0", 0));

        let cancel = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        assert_eq!(
            solve_blocking("salt", 0, &cancel, &attempts).as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_blocking_solution_is_valid_and_minimal() {
        let cancel = AtomicBool::new(false);
        let attempts = AtomicU64::new(0);
        let nonce = solve_blocking("a1b2c3", 2, &cancel, &attempts).unwrap();

        assert!(meets_difficulty("a1b2c3", &nonce, 2));
        let n: u64 = nonce.parse().unwrap();
        for smaller in 0..n {
            assert!(!meets_difficulty("a1b2c3", &smaller.to_string(), 2));
        }
    }

    #[test]
    fn test_predicate_matches_hex_prefix() {
        let digest = Sha256::digest(b"salt42");
        let hex = hex::encode(digest);
        let zeros = hex.chars().take_while(|c| *c == '0').count() as u32;
        assert!(meets_difficulty("salt", "42", zeros));
        assert!(!meets_difficulty("salt", "42", zeros + 1));
    }

    #[tokio::test]
    async fn test_spawned_solver_solves() {
        let ch = challenge("3f9a0c", 3);
        let handle = PowSolver::new().start(&ch).unwrap();
        assert_ne!(handle.state(), SolverState::Idle);

        let solution = handle.solution().await.unwrap();
        assert!(meets_difficulty("3f9a0c", &solution.nonce, 3));
    }

    #[tokio::test]
    async fn test_cancel_terminates_search() {
        // Unsolvable in practice: 40 leading hex zeros.
        let ch = challenge("never", 40);
        let handle = PowSolver::new().start(&ch).unwrap();
        assert_eq!(handle.state(), SolverState::Solving);

        handle.cancel();
        let outcome = handle.wait().await;
        assert_eq!(outcome, SolveOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_via_canceller_reports_error() {
        let ch = challenge("never", 40);
        let handle = PowSolver::new().start(&ch).unwrap();
        let canceller = handle.canceller();
        canceller.cancel();

        assert!(matches!(
            handle.solution().await,
            Err(PasteError::Challenge(_))
        ));
    }

    #[test]
    fn test_impossible_difficulty_rejected() {
        let result = PowSolver::new().start(&challenge("s", 65));
        assert!(matches!(result, Err(PasteError::Challenge(_))));
    }

    #[test]
    fn test_idle_state() {
        assert_eq!(PowSolver::new().state(), SolverState::Idle);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn solutions_satisfy_predicate(salt in "[0-9a-f]{8,32}", difficulty in 0u32..=2) {
            let cancel = AtomicBool::new(false);
            let attempts = AtomicU64::new(0);
            let nonce = solve_blocking(&salt, difficulty, &cancel, &attempts).unwrap();
            prop_assert!(meets_difficulty(&salt, &nonce, difficulty));
        }
    }
}
