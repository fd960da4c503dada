/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::report
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Construct and persist the structured run report describing
    phase outcomes and the verification verdict for downstream
    tooling.

  Security / Safety Notes:
    Report data is written to operator-controlled paths; no
    privileged operations are performed.

  Dependencies:
    serde for JSON serialization, chrono for timestamps.

  Operational Scope:
    Optional; written only when the operator passes --report.

  Revision History:
    2026-07-15 COD  Authored run report builder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible reports
    - Explicit per-phase status attribution
    - Rich metadata for audit and observability
============================================================*/

use std::fs::File;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{Result, SynstallError};
use crate::profile::{InstallRequest, PackageFamily, ReleaseKind};
use crate::verify::VerificationReport;

/// Wrapper representing the full run report document.
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub metadata: ReportMetadata,
    pub steps: Vec<StepOutcome>,
    pub verification: Option<VerificationReport>,
}

/// Metadata block describing the run context.
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub os_profile: String,
    pub package_family: PackageFamily,
    pub package_name: String,
    pub repo_url: String,
    pub release_kind: ReleaseKind,
    pub install_prefix: String,
    pub overall_passed: bool,
}

/// One phase of the linear state machine.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    RepoSetup,
    Install,
    Verify,
}

/// Terminal status of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Recorded outcome of one phase.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub detail: Option<String>,
}

impl StepOutcome {
    pub fn passed(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Passed,
            detail: None,
        }
    }

    pub fn failed(phase: Phase, detail: impl Into<String>) -> Self {
        Self {
            phase,
            status: PhaseStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Skipped,
            detail: None,
        }
    }
}

/// Build the report document for a completed run.
pub fn build_report(
    request: &InstallRequest,
    steps: Vec<StepOutcome>,
    verification: Option<VerificationReport>,
    overall_passed: bool,
) -> ReportDocument {
    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        generated_by: "synstall".to_string(),
        os_profile: request.os_profile.clone(),
        package_family: request.family,
        package_name: request.package_name.clone(),
        repo_url: request.repo_url.clone(),
        release_kind: request.release_kind,
        install_prefix: request.install_prefix.display().to_string(),
        overall_passed,
    };
    ReportDocument {
        metadata,
        steps,
        verification,
    }
}

/// Persist the report to the given path.
pub fn write_report(document: &ReportDocument, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynstallError::Filesystem(format!(
                "Failed to create report directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SynstallError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, document).map_err(|err| {
        SynstallError::Filesystem(format!("Failed to write report {}: {err}", path.display()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ReleaseKind;
    use std::path::PathBuf;

    fn request() -> InstallRequest {
        InstallRequest::new(
            "rhel8",
            "https://example.com/rpm/20260204-1/rhel8/x86_64/",
            ReleaseKind::Nightly,
            "gfx94x",
            PathBuf::from("/opt/rocm/core"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn report_serializes_phase_names_and_verdict() {
        let steps = vec![
            StepOutcome::passed(Phase::RepoSetup),
            StepOutcome::failed(Phase::Install, "`dnf install` exited with status 1"),
            StepOutcome::skipped(Phase::Verify),
        ];
        let document = build_report(&request(), steps, None, false);
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["metadata"]["package_family"], "rpm_dnf");
        assert_eq!(value["metadata"]["package_name"], "amdrocm-gfx94x");
        assert_eq!(value["metadata"]["overall_passed"], false);
        assert_eq!(value["steps"][0]["phase"], "REPO_SETUP");
        assert_eq!(value["steps"][0]["status"], "PASSED");
        assert_eq!(value["steps"][1]["status"], "FAILED");
        assert_eq!(value["steps"][2]["status"], "SKIPPED");
        assert!(value["verification"].is_null());
    }

    #[test]
    fn report_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let document = build_report(&request(), vec![StepOutcome::passed(Phase::RepoSetup)], None, true);
        write_report(&document, &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"REPO_SETUP\""));
        assert!(raw.contains("\"generated_by\": \"synstall\""));
    }
}
