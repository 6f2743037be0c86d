//! Ordered fallback over alternative strategies.
//!
//! A [`FallbackChain`] is a list of named attempts tried in order. The first
//! success wins; if every attempt fails, the caller gets all failures back
//! in order, the last one being the error that ends the chain. The OCR
//! pipeline (remote → local) and the audio fast path (native → transcoder)
//! are both expressed as chains.

use crate::error::ConvertError;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use tracing::{debug, warn};

type Attempt<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, ConvertError>> + Send + 'a>;

/// A failed attempt in a chain.
#[derive(Debug)]
pub struct AttemptFailure {
    pub name: String,
    pub error: ConvertError,
}

/// Outcome of a chain where some attempt succeeded.
#[derive(Debug)]
pub struct FallbackSuccess<T> {
    pub value: T,
    /// Name of the attempt that produced `value`.
    pub winner: String,
    /// Attempts that failed before the winner, in order.
    pub failures: Vec<AttemptFailure>,
}

impl<T> FallbackSuccess<T> {
    /// Whether the first attempt had to be abandoned.
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Every attempt failed (or the chain had none).
#[derive(Debug, Default)]
pub struct FallbackExhausted {
    pub failures: Vec<AttemptFailure>,
}

impl FallbackExhausted {
    pub fn first(&self) -> Option<&AttemptFailure> {
        self.failures.first()
    }

    pub fn last(&self) -> Option<&AttemptFailure> {
        self.failures.last()
    }

    /// The error that ended the chain.
    pub fn into_last_error(mut self) -> Option<ConvertError> {
        self.failures.pop().map(|f| f.error)
    }
}

/// Ordered list of alternatives.
pub struct FallbackChain<'a, T> {
    attempts: Vec<(String, Attempt<'a, T>)>,
}

impl<T> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }
}

impl<'a, T: Send + 'a> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt.
    pub fn attempt<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, ConvertError>> + Send + 'a,
    {
        self.attempts
            .push((name.into(), Box::new(move || f().boxed())));
        self
    }

    /// Append an attempt only when `enabled` holds.
    pub fn attempt_if<F, Fut>(self, enabled: bool, name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, ConvertError>> + Send + 'a,
    {
        if enabled {
            self.attempt(name, f)
        } else {
            self
        }
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Names of the attempts, in order.
    pub fn names(&self) -> Vec<&str> {
        self.attempts.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Run attempts in order until one succeeds.
    pub async fn run(self) -> Result<FallbackSuccess<T>, FallbackExhausted> {
        let total = self.attempts.len();
        let mut failures = Vec::new();

        for (idx, (name, attempt)) in self.attempts.into_iter().enumerate() {
            debug!("fallback: trying '{}' ({}/{})", name, idx + 1, total);
            match attempt().await {
                Ok(value) => {
                    return Ok(FallbackSuccess {
                        value,
                        winner: name,
                        failures,
                    })
                }
                Err(error) => {
                    if idx + 1 < total {
                        warn!("fallback: '{}' failed, moving on: {}", name, error);
                    } else {
                        warn!("fallback: '{}' failed, chain exhausted: {}", name, error);
                    }
                    failures.push(AttemptFailure { name, error });
                }
            }
        }

        Err(FallbackExhausted { failures })
    }
}
