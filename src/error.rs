// Copyright (c) 2024-present, zipcache-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::codec::CodecError;

/// Errors that can occur while operating a [`crate::CompressedBTree`] or
/// [`crate::ObjectTree`].
#[derive(Debug)]
pub enum Error {
    /// Allocation failed; the tree is left in its last good state.
    OutOfMemory,

    /// A codec call failed (corrupt frame, undersized output buffer).
    ///
    /// On `put`, the mutation that triggered the call is rolled back.
    CodecFailure(CodecError),

    /// The requested codec backend could not be initialized.
    ///
    /// Returned by `init`/`set_algorithm`; the caller chooses a fallback.
    BackendUnavailable,

    /// A caller-supplied argument violates a documented precondition
    /// (e.g. `order < 2`).
    InvalidArgument(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ZipCacheIndexError: {self:?}")
    }
}

impl std::error::Error for Error {}

impl From<CodecError> for Error {
    fn from(value: CodecError) -> Self {
        Self::CodecFailure(value)
    }
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
