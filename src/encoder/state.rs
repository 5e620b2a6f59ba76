use std::fmt;

use crate::error::{EncoderError, Result};

/// Lifecycle of an encoder adapter
///
/// ```text
/// Unconfigured -> Configured -> Encoding -> Flushing -> Closed
///                     \            \           \
///                      `------------`-----------`--> Failed -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unconfigured,
    Configured,
    Encoding,
    Flushing,
    Failed,
    Closed,
}

/// Operations whose validity depends on the adapter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Configure,
    Encode,
    Flush,
    Close,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Encode => "encode",
            Self::Flush => "flush",
            Self::Close => "close",
        }
    }
}

impl AdapterState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Encoding => "encoding",
            Self::Flushing => "flushing",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }

    /// Check whether `op` may run in this state
    ///
    /// Anything after close is [`EncoderError::ClosedAdapter`]; other
    /// violations are [`EncoderError::InvalidState`].
    pub fn check(self, op: Operation) -> Result<()> {
        let allowed = match op {
            Operation::Configure => self == Self::Unconfigured,
            Operation::Encode => matches!(self, Self::Configured | Self::Encoding),
            Operation::Flush => self == Self::Encoding,
            Operation::Close => matches!(
                self,
                Self::Unconfigured | Self::Flushing | Self::Failed | Self::Closed
            ),
        };

        if allowed {
            return Ok(());
        }

        if self == Self::Closed {
            return Err(EncoderError::ClosedAdapter.into());
        }

        Err(EncoderError::InvalidState {
            operation: op.as_str().to_string(),
            state: self.as_str().to_string(),
        }
        .into())
    }

    /// State after `op` completed successfully
    pub fn after(self, op: Operation) -> Self {
        match op {
            Operation::Configure => Self::Configured,
            Operation::Encode => Self::Encoding,
            Operation::Flush => Self::Flushing,
            Operation::Close => Self::Closed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
