// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cancellation scope shared by the readers of one supervision cycle.
//!
//! A group is created fresh for every cycle, with a token derived from the
//! session token: cancelling the session cancels every group, cancelling a
//! group leaves the session alone.
//!
//! The group is "dying" as soon as one member fails or once every member
//! has returned, whichever comes first. [`ReaderGroup::dying`] reports which
//! of the two happened.

use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AcquisitionError;

pub struct ReaderGroup {
    name: String,
    token: CancellationToken,
    tasks: JoinSet<Result<(), AcquisitionError>>,
    first_error: Option<AcquisitionError>,
}

fn join_error(err: JoinError) -> AcquisitionError {
    if err.is_panic() {
        AcquisitionError::ReaderPanicked(format!("{err}"))
    } else {
        // Only abort() cancels a task and the group never aborts its members.
        AcquisitionError::ReaderPanicked(format!("reader task cancelled: {err}"))
    }
}

impl ReaderGroup {
    pub fn new(name: impl Into<String>, parent: &CancellationToken) -> Self {
        Self {
            name: name.into(),
            token: parent.child_token(),
            tasks: JoinSet::new(),
            first_error: None,
        }
    }

    /// Token members must watch to notice the group is being torn down.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), AcquisitionError>> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Asks every member to stop.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a member failed (returning its error) or once all
    /// members have returned cleanly.
    ///
    /// The first failure also cancels the group so its siblings start
    /// winding down. Cancel safe: members that already returned are not
    /// lost if this future is dropped.
    pub async fn dying(&mut self) -> Result<(), AcquisitionError> {
        while let Some(joined) = self.tasks.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(err) => join_error(err),
            };
            debug!("{} group: member failed, cancelling siblings", self.name);
            self.token.cancel();
            return Err(err);
        }
        Ok(())
    }

    /// Waits for every member to return and reports the first failure seen
    /// over the life of the group.
    pub async fn wait(&mut self) -> Result<(), AcquisitionError> {
        while let Some(joined) = self.tasks.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(err) => join_error(err),
            };
            if self.first_error.is_none() {
                self.first_error = Some(err);
            } else {
                warn!("{} group: additional member failure: {}", self.name, err);
            }
        }
        debug!("{} group: all members returned", self.name);
        match self.first_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
