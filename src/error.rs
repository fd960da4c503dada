/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Stall error types to provide consistent
    diagnostics for repository setup, installation, and
    verification failures.

  Security / Safety Notes:
    Error contexts expose high-level paths and command lines
    only; no repository credentials are ever captured.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate fatal failures up to the
    binary entry point. The process exit contract is binary:
    0 when install and verification both pass, 1 otherwise.

  Revision History:
    2026-07-02 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Fail-fast configuration validation before side effects
============================================================*/

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias for Syn-Stall operations.
pub type Result<T> = std::result::Result<T, SynstallError>;

/// Enumerates high-level error domains surfaced by Syn-Stall.
#[derive(Debug, Error)]
pub enum SynstallError {
    /// Bad or unsupported input, raised before any side effect.
    #[error("Configuration: {0}")]
    Config(String),
    /// Repository source could not be written or refreshed.
    #[error("Repository setup: {0}")]
    RepoSetup(String),
    /// The package manager failed to install the package.
    #[error("Installation: {0}")]
    Install(String),
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    /// The child was killed after exceeding its bound.
    #[error("Command `{command}` timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },
    #[error("Network: {0}")]
    Network(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
