//! # llm_logging
//!
//! Tracing subscriber setup for the llm_vram workspace, plus the indentation helpers its
//! `Display` implementations share.

mod logging;

#[allow(unused_imports)]
pub(crate) use anyhow::{anyhow, bail, Error, Result};

pub use self::logging::{i_ln, i_nln, i_nlns, LoggingConfig, MAX_LOG_FILES};
