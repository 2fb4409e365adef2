// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use config::DataplaneConfig;
use std::future::{Future, pending};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::ChainError;

/// Cancellation signal of a call.
///
/// Fires when the associated [`CancelHandle`] cancels or is dropped.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Option<watch::Receiver<bool>>);

/// Cancels a call
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Cancel the associated [`Cancellation`]s
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl Cancellation {
    /// A fresh cancellation and the handle to fire it
    #[must_use]
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), Self(Some(rx)))
    }

    /// A cancellation that never fires
    #[must_use]
    pub fn never() -> Self {
        Self(None)
    }

    /// Tell if cancellation already happened
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|rx| *rx.borrow() || rx.has_changed().is_err())
    }

    /// Resolve when cancelled
    pub async fn cancelled(&self) {
        let Some(rx) = &self.0 else {
            return pending().await;
        };
        let mut rx = rx.clone();
        // an error means the handle is gone, which counts as cancelled
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Per-call state threaded through the chain: the configuration under construction and the
/// cancellation of the call.
#[derive(Debug, Default)]
pub struct CallScope {
    config: Option<DataplaneConfig>,
    cancel: Cancellation,
    deadline: Option<Instant>,
}

impl CallScope {
    /// A scope with no configuration attached that never gets cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope cancelled by `cancel`
    #[must_use]
    pub fn with_cancellation(cancel: Cancellation) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    /// Set a deadline after which the scope counts as cancelled
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach an empty configuration, unless one is attached already. Either way, return the
    /// attached configuration.
    pub fn ensure_config(&mut self) -> &mut DataplaneConfig {
        self.config.get_or_insert_with(DataplaneConfig::default)
    }

    /// The attached configuration, if any
    #[must_use]
    pub fn config(&self) -> Option<&DataplaneConfig> {
        self.config.as_ref()
    }

    /// The attached configuration, if any
    pub fn config_mut(&mut self) -> Option<&mut DataplaneConfig> {
        self.config.as_mut()
    }

    /// Detach the configuration
    pub fn take_config(&mut self) -> Option<DataplaneConfig> {
        self.config.take()
    }

    /// The cancellation of this scope, for work that outlives a borrow of the scope
    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Tell if the scope got cancelled or its deadline passed
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolve when the scope gets cancelled or its deadline passes
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.cancel.cancelled() => {},
                () = tokio::time::sleep_until(deadline) => {},
            },
            None => self.cancel.cancelled().await,
        }
    }

    /// Run `fut` unless the scope gets cancelled first
    pub async fn until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output, ChainError> {
        tokio::select! {
            out = fut => Ok(out),
            () = self.cancelled() => Err(ChainError::Cancelled),
        }
    }
}
