//! Shared rotation cursor over the model × credential matrix

use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::providers::llm::ProviderErrorKind;

/// Position in the model × credential matrix.
///
/// Ordering is lexicographic (model, then credential), which is also the
/// order in which the matrix is swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CursorPosition {
    pub model: usize,
    pub credential: usize,
}

impl CursorPosition {
    pub const ORIGIN: CursorPosition = CursorPosition {
        model: 0,
        credential: 0,
    };

    pub fn new(model: usize, credential: usize) -> Self {
        Self { model, credential }
    }
}

struct CursorState {
    position: CursorPosition,
    last_advance: Option<Instant>,
}

/// Cursor shared by every concurrent caller of one provider tier.
///
/// Callers read a starting position with [`GatewayCursor::start`], make their
/// network call without holding the lock, and report failures through
/// [`GatewayCursor::advance`]. The shared position only moves forward; a call
/// never moves back to a pair it has already passed.
pub struct GatewayCursor {
    model_count: usize,
    credential_count: usize,
    reset_after: Option<Duration>,
    state: Mutex<CursorState>,
}

impl GatewayCursor {
    pub fn new(model_count: usize, credential_count: usize) -> Self {
        Self {
            model_count,
            credential_count,
            reset_after: None,
            state: Mutex::new(CursorState {
                position: CursorPosition::ORIGIN,
                last_advance: None,
            }),
        }
    }

    /// Return to the preferred pair once the last forward move is older than `period`
    pub fn with_reset_after(mut self, period: Option<Duration>) -> Self {
        self.reset_after = period;
        self
    }

    /// Current shared position
    pub fn position(&self) -> CursorPosition {
        self.state.lock().position
    }

    /// Whether `position` lies past the end of the matrix
    pub fn is_exhausted(&self, position: CursorPosition) -> bool {
        self.credential_count == 0 || position.model >= self.model_count
    }

    /// Starting position for a new call.
    ///
    /// A cursor left exhausted by an earlier call starts a fresh sweep, and
    /// the optional reset policy returns a stale cursor to the origin.
    pub fn start(&self) -> CursorPosition {
        let mut state = self.state.lock();

        if self.is_exhausted(state.position) {
            tracing::info!("Cursor exhausted by a previous call, restarting sweep at (0, 0)");
            state.position = CursorPosition::ORIGIN;
            state.last_advance = None;
        } else if let (Some(period), Some(last)) = (self.reset_after, state.last_advance) {
            if state.position != CursorPosition::ORIGIN && last.elapsed() >= period {
                tracing::info!(
                    "Cursor at ({}, {}) idle for {:?}, resetting to preferred pair",
                    state.position.model,
                    state.position.credential,
                    period
                );
                state.position = CursorPosition::ORIGIN;
                state.last_advance = None;
            }
        }

        state.position
    }

    /// Next position after a failure of `kind` at `from`, ignoring other callers
    pub fn step(&self, from: CursorPosition, kind: ProviderErrorKind) -> CursorPosition {
        if kind.rotates_credential() && from.credential + 1 < self.credential_count {
            CursorPosition::new(from.model, from.credential + 1)
        } else {
            CursorPosition::new(from.model + 1, 0)
        }
    }

    /// Record a failure at `from` and return where the caller continues.
    ///
    /// If another caller already moved the shared cursor further, the caller
    /// jumps to that position instead.
    pub fn advance(&self, from: CursorPosition, kind: ProviderErrorKind) -> CursorPosition {
        let next = self.step(from, kind);
        let mut state = self.state.lock();

        if next > state.position {
            state.position = next;
            state.last_advance = Some(Instant::now());
        }

        let resume = next.max(state.position);
        tracing::debug!(
            "Cursor advance on {}: ({}, {}) -> ({}, {})",
            kind,
            from.model,
            from.credential,
            resume.model,
            resume.credential
        );
        resume
    }
}
