use std::fmt;

use crate::state::GameState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerError {
    NothingToUndo,
    RevivalBoundary,
    MustMoveBeforeSave,
    NoCheckpointBehind,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            LedgerError::NothingToUndo => "nothing to undo",
            LedgerError::RevivalBoundary => "cannot undo across a revival point",
            LedgerError::MustMoveBeforeSave => "already saved at this step",
            LedgerError::NoCheckpointBehind => "no checkpoint to rewind to",
        };
        f.write_str(message)
    }
}

/// Append-only snapshot log with a cursor and checkpoint marks. States are
/// only ever referenced, never edited; undo and rewind merely move the
/// cursor, and recording after an undo truncates the abandoned future.
#[derive(Clone, Debug)]
pub struct HistoryLedger {
    log: Vec<GameState>,
    current: usize,
    checkpoints: Vec<usize>,
}

impl HistoryLedger {
    pub fn new(initial: GameState) -> Self {
        Self {
            log: vec![initial],
            current: 0,
            checkpoints: Vec::new(),
        }
    }

    pub fn current(&self) -> &GameState {
        &self.log[self.current]
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn step_count(&self) -> usize {
        self.log.len()
    }

    pub fn checkpoints(&self) -> &[usize] {
        &self.checkpoints
    }

    pub fn record(&mut self, state: GameState) {
        if self.current + 1 < self.log.len() {
            self.log.truncate(self.current + 1);
            let cursor = self.current;
            self.checkpoints.retain(|&mark| mark <= cursor);
        }
        self.log.push(state);
        self.current += 1;
    }

    /// Steps the cursor back one state. Refused at the start of the log and
    /// at revival points, which seal off the previous life or loop.
    pub fn undo(&mut self) -> Result<&GameState, LedgerError> {
        if self.current == 0 {
            return Err(LedgerError::NothingToUndo);
        }
        if self.log[self.current].is_revival_point {
            return Err(LedgerError::RevivalBoundary);
        }
        self.current -= 1;
        Ok(&self.log[self.current])
    }

    /// Marks the current step as a checkpoint. The player must have moved
    /// past the previous checkpoint before saving again.
    pub fn save(&mut self) -> Result<usize, LedgerError> {
        if let Some(&last) = self.checkpoints.last() {
            if self.current <= last {
                return Err(LedgerError::MustMoveBeforeSave);
            }
        }
        self.checkpoints.push(self.current);
        Ok(self.current)
    }

    /// Jumps the cursor to the nearest checkpoint strictly behind it.
    pub fn rewind(&mut self) -> Result<&GameState, LedgerError> {
        let target = self
            .checkpoints
            .iter()
            .rev()
            .find(|&&mark| mark < self.current)
            .copied()
            .ok_or(LedgerError::NoCheckpointBehind)?;
        self.current = target;
        Ok(&self.log[self.current])
    }
}
