// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for engine operations.

use scanq_core::{PayloadError, TaskId};
use scanq_queue::QueueError;
use scanq_scanner::{DriverError, RegistryError};
use scanq_store::StoreError;
use thiserror::Error;

/// Errors surfaced by submission, status, and results operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("idempotency key already used with different inputs (existing task {existing})")]
    Conflict { existing: TaskId },
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("no scanner capacity in pool {0}")]
    NoCapacity(String),
    #[error("stored artifact unusable: {0}")]
    Artifact(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl EngineError {
    /// HTTP-equivalent status code for client error envelopes.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            EngineError::Validation(_) => Some(400),
            EngineError::Conflict { .. } => Some(409),
            EngineError::NotFound(_) => Some(404),
            EngineError::Registry(RegistryError::UnknownPool(_))
            | EngineError::Registry(RegistryError::UnknownInstance { .. }) => Some(400),
            _ => None,
        }
    }
}

impl From<PayloadError> for EngineError {
    fn from(e: PayloadError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) | StoreError::ArtifactNotFound(id) => {
                EngineError::NotFound(id)
            }
            other => EngineError::Store(other),
        }
    }
}
