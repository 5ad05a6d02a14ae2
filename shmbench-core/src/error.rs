// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmbench.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`
//! in the libraries - every failure a run can hit is a named variant.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Run State Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Shared Memory Errors - fatal, never retried
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors stop the run before any region is touched.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid region name '{name}': {reason}")]
    InvalidRegionName { name: String, reason: String },

    #[error("Invalid event id {id}: must be in 0..{max}")]
    InvalidEventId { id: i64, max: usize },
}

/// Run state transition errors.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition {role} run from {from} to {to}")]
    InvalidTransition {
        role: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("{role} run is already stopped")]
    AlreadyStopped { role: &'static str },
}

/// Shared memory errors.
///
/// Creation failures (`AlreadyExists`, `PermissionDenied`, `CreateFailed`)
/// and attach failures (`NotFound`, `MapFailed`, `LayoutMismatch`) are both
/// fatal: they point at a misconfigured run, not a transient condition.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("Shared memory region already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Permission denied for shared memory region: {name}")]
    PermissionDenied { name: String },

    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Shared memory region not found: {name}")]
    NotFound { name: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Region {name} is {actual} bytes but the layout needs {expected}")]
    LayoutMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid ring buffer capacity {capacity}: at least 2 slots are required")]
    InvalidCapacity { capacity: usize },

    #[error("Payload does not fit the mailbox: {size} > {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_mismatch_display() {
        let err = SharedMemoryError::LayoutMismatch {
            name: "/bb".to_string(),
            expected: 80,
            actual: 4096,
        };
        let text = err.to_string();
        assert!(text.contains("/bb"));
        assert!(text.contains("80"));
        assert!(text.contains("4096"));
    }

    #[test]
    fn test_error_chain() {
        let shm_err = SharedMemoryError::InvalidCapacity { capacity: 0 };
        let bench_err: BenchError = shm_err.into();
        assert!(matches!(
            bench_err,
            BenchError::SharedMemory(SharedMemoryError::InvalidCapacity { capacity: 0 })
        ));
    }
}
