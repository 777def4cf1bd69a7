// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level errors.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] jg_wire::WireError),

    #[error("invalid address `{0}`")]
    InvalidAddr(String),

    #[error("execution activity did not stop within {0:?}")]
    StopTimeout(Duration),
}
