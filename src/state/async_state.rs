//! # Asynchronous state value.
//!
//! [`AsyncState`] is an immutable value: one of four tagged variants crossed with a
//! [`Mode`] that is fixed for the life of an accessor.
//!
//! | status    | fresh mode `data`  | stale mode `data`        |
//! |-----------|--------------------|--------------------------|
//! | `idle`    | absent             | last good value (if any) |
//! | `pending` | absent             | last good value (if any) |
//! | `success` | value              | value                    |
//! | `error`   | absent             | last good value (if any) |
//!
//! All states are built through [`AsyncState::new`], which matches on the mode and the
//! requested [`Transition`] and drops data that the mode does not retain.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::state::request::RequestId;

/// Data-retention policy of an accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Data only on success.
    Fresh,
    /// Last successful data carried through pending/error/idle.
    Stale,
}

/// Status tag of an [`AsyncState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Pending,
    Success,
    Error,
}

/// Requested status with the payload that status may carry.
#[derive(Clone, Debug)]
pub enum Transition<T> {
    Idle { data: Option<T> },
    Pending { data: Option<T> },
    Success { data: T },
    Error { error: ActionError, data: Option<T> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct IdleState<T> {
    mode: Mode,
    data: Option<T>,
    request: Option<RequestId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingState<T> {
    mode: Mode,
    data: Option<T>,
    request: Option<RequestId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SuccessState<T> {
    mode: Mode,
    data: T,
    timestamp: SystemTime,
    request: Option<RequestId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorState<T> {
    mode: Mode,
    data: Option<T>,
    error: ActionError,
    request: Option<RequestId>,
}

/// Immutable asynchronous state.
#[derive(Clone, Debug, PartialEq)]
pub enum AsyncState<T> {
    Idle(IdleState<T>),
    Pending(PendingState<T>),
    Success(SuccessState<T>),
    Error(ErrorState<T>),
}

/// Idle state in fresh mode.
pub fn fresh<T>() -> AsyncState<T> {
    AsyncState::new(Mode::Fresh, Transition::Idle { data: None })
}

/// Idle state in stale mode, seeded with `initial`.
pub fn stale<T>(initial: T) -> AsyncState<T> {
    AsyncState::new(
        Mode::Stale,
        Transition::Idle {
            data: Some(initial),
        },
    )
}

impl<T> AsyncState<T> {
    /// Builds a state for `mode`. Fresh mode discards data on every non-success status.
    ///
    /// The result carries no request identity; see [`AsyncState::with_request`].
    pub fn new(mode: Mode, transition: Transition<T>) -> Self {
        let keep = |data: Option<T>| match mode {
            Mode::Fresh => None,
            Mode::Stale => data,
        };
        match transition {
            Transition::Idle { data } => AsyncState::Idle(IdleState {
                mode,
                data: keep(data),
                request: None,
            }),
            Transition::Pending { data } => AsyncState::Pending(PendingState {
                mode,
                data: keep(data),
                request: None,
            }),
            Transition::Success { data } => AsyncState::Success(SuccessState {
                mode,
                data,
                timestamp: SystemTime::now(),
                request: None,
            }),
            Transition::Error { error, data } => AsyncState::Error(ErrorState {
                mode,
                data: keep(data),
                error,
                request: None,
            }),
        }
    }

    pub fn idle(mode: Mode, data: Option<T>) -> Self {
        Self::new(mode, Transition::Idle { data })
    }

    pub fn pending(mode: Mode, data: Option<T>) -> Self {
        Self::new(mode, Transition::Pending { data })
    }

    pub fn success(mode: Mode, data: T) -> Self {
        Self::new(mode, Transition::Success { data })
    }

    pub fn error(mode: Mode, error: ActionError, data: Option<T>) -> Self {
        Self::new(mode, Transition::Error { error, data })
    }

    /// Returns the same state tagged with `request`.
    pub fn with_request(mut self, request: RequestId) -> Self {
        let slot = match &mut self {
            AsyncState::Idle(s) => &mut s.request,
            AsyncState::Pending(s) => &mut s.request,
            AsyncState::Success(s) => &mut s.request,
            AsyncState::Error(s) => &mut s.request,
        };
        *slot = Some(request);
        self
    }

    pub fn status(&self) -> Status {
        match self {
            AsyncState::Idle(_) => Status::Idle,
            AsyncState::Pending(_) => Status::Pending,
            AsyncState::Success(_) => Status::Success,
            AsyncState::Error(_) => Status::Error,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            AsyncState::Idle(s) => s.mode,
            AsyncState::Pending(s) => s.mode,
            AsyncState::Success(s) => s.mode,
            AsyncState::Error(s) => s.mode,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            AsyncState::Idle(s) => s.data.as_ref(),
            AsyncState::Pending(s) => s.data.as_ref(),
            AsyncState::Success(s) => Some(&s.data),
            AsyncState::Error(s) => s.data.as_ref(),
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            AsyncState::Idle(s) => s.data,
            AsyncState::Pending(s) => s.data,
            AsyncState::Success(s) => Some(s.data),
            AsyncState::Error(s) => s.data,
        }
    }

    pub fn error_ref(&self) -> Option<&ActionError> {
        match self {
            AsyncState::Error(s) => Some(&s.error),
            _ => None,
        }
    }

    /// Time of the successful settlement.
    pub fn timestamp(&self) -> Option<SystemTime> {
        match self {
            AsyncState::Success(s) => Some(s.timestamp),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            AsyncState::Idle(s) => s.request,
            AsyncState::Pending(s) => s.request,
            AsyncState::Success(s) => s.request,
            AsyncState::Error(s) => s.request,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, AsyncState::Pending(_))
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, AsyncState::Success(_))
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, AsyncState::Error(_))
    }
}

impl<T: Clone> AsyncState<T> {
    /// Data a new pending/idle/error state should keep: the current data in stale mode.
    pub fn retained(&self) -> Option<T> {
        match self.mode() {
            Mode::Stale => self.data().cloned(),
            Mode::Fresh => None,
        }
    }
}

impl<T> Default for AsyncState<T> {
    fn default() -> Self {
        fresh()
    }
}
