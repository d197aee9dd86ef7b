use serde::Serialize;

use crate::error::ErrorKind;

/// Coarse lifecycle phase derived from `RefreshState`.
/// `Success` and `Failure` are not terminal: the next tick moves back to `Polling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Polling,
    Success,
    Failure,
}

/// Current state of one panel's data.
///
/// - `is_loading` is true exactly while at least one poll is in flight.
/// - The most recent committed outcome sets either `data` (and clears `error`)
///   or `error`; a failure never touches `data`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<ErrorKind>,
    pub enabled: bool,
    /// Unix nanoseconds of the last successful commit.
    pub updated_at_ns: Option<u64>,
    pub polls_started: u64,
    pub polls_settled: u64,
    #[serde(skip)]
    pub(crate) in_flight: u32,
    /// Sequence number of the poll whose outcome is currently shown.
    #[serde(skip)]
    pub(crate) committed_seq: u64,
}

impl<T> RefreshState<T> {
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Polling
        } else if self.error.is_some() {
            Phase::Failure
        } else if self.data.is_some() {
            Phase::Success
        } else {
            Phase::Idle
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }
}

impl<T> Default for RefreshState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            enabled: false,
            updated_at_ns: None,
            polls_started: 0,
            polls_settled: 0,
            in_flight: 0,
            committed_seq: 0,
        }
    }
}
