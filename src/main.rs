/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Stall. Derives the packaging family
    from the OS profile, configures the repository, installs
    the package under test, and verifies the installation.

  Security / Safety Notes:
    Runs the system package managers with the invoking user's
    privileges; repository trust is exactly what the operator
    configured via --gpg-key-url.

  Dependencies:
    clap for CLI parsing, tokio for the async runtime.

  Operational Scope:
    Invoked by CI acceptance pipelines or operators. One run
    per invocation; exit 0 only when install and verification
    both pass.

  Revision History:
    2026-07-02 COD  Authored Syn-Stall runtime.
    2026-07-15 COD  Merged local nightly URL construction.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Linear phase sequence with no branching back
    - Structured logging following Synavera cadence
============================================================*/

mod config;
mod error;
mod exec;
mod install;
mod logger;
mod profile;
mod repo;
mod report;
mod verify;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};

use config::SynstallConfig;
use error::{Result, SynstallError};
use logger::Logger;
use profile::{nightly_repo_url, InstallRequest, PackageFamily, ReleaseKind};
use repo::RepoConfigurator;
use report::{build_report, write_report, Phase, StepOutcome};
use verify::Verifier;

/// Command-line arguments for Syn-Stall.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Stall",
    version,
    author = "Synavera Systems",
    about = "Installation-acceptance tester for native Linux GPU packages"
)]
struct Cli {
    /// OS profile (e.g., ubuntu2404, rhel8, sles16). Package family is derived from this.
    #[arg(long, value_name = "PROFILE")]
    os_profile: String,
    /// Full repository URL; omit to construct a nightly URL locally.
    #[arg(long, value_name = "URL")]
    repo_url: Option<String>,
    /// Release channel of the repository under test.
    #[arg(long, value_enum, default_value_t = ReleaseKind::Nightly)]
    release_type: ReleaseKind,
    /// GPU architecture embedded in the package name.
    #[arg(long, default_value = "gfx94x", value_name = "GFX")]
    gfx_arch: String,
    /// Installation prefix probed during verification.
    #[arg(long, default_value = "/opt/rocm/core", value_name = "PATH")]
    install_prefix: PathBuf,
    /// GPG key URL (only needed for prerelease repositories).
    #[arg(long, value_name = "URL")]
    gpg_key_url: Option<String>,
    /// Explicit package type; validated against the derived family.
    #[arg(long, value_enum)]
    package_type: Option<PackageType>,
    /// Nightly repository base URL, used when --repo-url is omitted.
    #[arg(long, value_name = "URL")]
    repo_base_url: Option<String>,
    /// Artifact run ID for nightly URL construction.
    #[arg(long, value_name = "ID")]
    artifact_id: Option<String>,
    /// Build date in YYYYMMDD form for nightly URL construction.
    #[arg(long, value_name = "YYYYMMDD")]
    date: Option<String>,
    /// Product version; displayed in the banner only.
    #[arg(long, value_name = "VER")]
    rocm_version: Option<String>,
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Write a JSON run report to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// Explicit package-type override accepted for workflow compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PackageType {
    Deb,
    Rpm,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Stall] {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SynstallConfig::load_from_optional_path(cli.config.as_deref())?;
    let locations = &config.locations;

    let family = PackageFamily::resolve(&cli.os_profile)?;
    validate_package_type(cli.package_type, family)?;
    let repo_url = resolve_repo_url(
        family,
        &cli.os_profile,
        cli.release_type,
        cli.repo_url.as_deref(),
        cli.repo_base_url.as_deref(),
        cli.artifact_id.as_deref(),
        cli.date.as_deref(),
    )?;

    let request = InstallRequest::new(
        &cli.os_profile,
        &repo_url,
        cli.release_type,
        &cli.gfx_arch,
        cli.install_prefix.clone(),
        cli.gpg_key_url.clone(),
    )?;

    let logger = Logger::new(cli.log.clone(), cli.verbose)?;
    logger.section("FULL INSTALLATION TEST - NATIVE LINUX PACKAGES");
    println!("\nOS Profile: {}", request.os_profile);
    println!("Package Family (derived): {}", request.family);
    println!("Release Type: {}", request.release_kind);
    println!("Repository URL: {}", request.repo_url);
    println!("GPU Architecture: {}", request.gfx_arch);
    println!("Package Name: {}", request.package_name);
    println!("Install Prefix: {}", request.install_prefix.display());
    if let Some(version) = &cli.rocm_version {
        println!("Product Version: {version}");
    }
    if let Some(key_url) = &request.gpg_key_url {
        println!("GPG Key URL: {key_url}");
    }

    // Linear phase sequence: REPO_SETUP -> INSTALL -> VERIFY -> DONE.
    // A repo or install failure short-circuits straight to DONE.
    let mut steps = Vec::new();
    let mut verification = None;

    let install_ok = match RepoConfigurator::new(&request, locations, &logger)
        .configure()
        .await
    {
        Ok(()) => {
            steps.push(StepOutcome::passed(Phase::RepoSetup));
            match install::install_package(&request, &logger).await {
                Ok(()) => {
                    steps.push(StepOutcome::passed(Phase::Install));
                    true
                }
                Err(err) => {
                    logger.error("INSTALL", err.to_string());
                    steps.push(StepOutcome::failed(Phase::Install, err.to_string()));
                    steps.push(StepOutcome::skipped(Phase::Verify));
                    false
                }
            }
        }
        Err(err) => {
            logger.error("REPO", err.to_string());
            steps.push(StepOutcome::failed(Phase::RepoSetup, err.to_string()));
            steps.push(StepOutcome::skipped(Phase::Install));
            steps.push(StepOutcome::skipped(Phase::Verify));
            false
        }
    };

    let verify_ok = if install_ok {
        let outcome = Verifier::new(&request, locations, &logger).verify().await;
        if outcome.passed {
            steps.push(StepOutcome::passed(Phase::Verify));
        } else {
            steps.push(StepOutcome::failed(
                Phase::Verify,
                format!(
                    "{} of {} key components found, threshold {}",
                    outcome.found_count,
                    verify::KEY_COMPONENTS.len(),
                    outcome.threshold
                ),
            ));
        }
        let passed = outcome.passed;
        verification = Some(outcome);
        passed
    } else {
        false
    };

    let overall = install_ok && verify_ok;
    if overall {
        logger.section("[PASS] FULL INSTALLATION TEST PASSED");
    } else {
        logger.section("[FAIL] FULL INSTALLATION TEST FAILED");
    }

    if let Some(path) = &cli.report {
        let document = build_report(&request, steps, verification, overall);
        match write_report(&document, path) {
            Ok(()) => logger.info("REPORT", format!("Report written to {}", path.display())),
            Err(err) => logger.error("REPORT", err.to_string()),
        }
    }

    logger.finalize()?;
    Ok(if overall {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Reject an explicit package type that contradicts the derived family.
fn validate_package_type(package_type: Option<PackageType>, family: PackageFamily) -> Result<()> {
    let Some(package_type) = package_type else {
        return Ok(());
    };
    let expected = match family {
        PackageFamily::Deb => PackageType::Deb,
        PackageFamily::RpmDnf | PackageFamily::RpmZypper => PackageType::Rpm,
    };
    if package_type == expected {
        Ok(())
    } else {
        Err(SynstallError::Config(format!(
            "--package-type {package_type:?} contradicts the {} family derived from the OS profile",
            family
        )))
    }
}

/// Pick the repository URL: either the one supplied verbatim, or a
/// nightly URL constructed from its parts. Exactly one source allowed.
fn resolve_repo_url(
    family: PackageFamily,
    os_profile: &str,
    release_kind: ReleaseKind,
    repo_url: Option<&str>,
    repo_base_url: Option<&str>,
    artifact_id: Option<&str>,
    date: Option<&str>,
) -> Result<String> {
    let construction_args = repo_base_url.is_some() || artifact_id.is_some() || date.is_some();
    match repo_url {
        Some(url) => {
            if construction_args {
                return Err(SynstallError::Config(
                    "Provide either --repo-url or the --repo-base-url/--artifact-id/--date group, not both"
                        .into(),
                ));
            }
            Ok(url.to_string())
        }
        None => {
            if release_kind == ReleaseKind::Prerelease {
                return Err(SynstallError::Config(
                    "Prerelease runs require an explicit --repo-url".into(),
                ));
            }
            let (Some(base), Some(artifact), Some(date)) = (repo_base_url, artifact_id, date)
            else {
                return Err(SynstallError::Config(
                    "Without --repo-url, all of --repo-base-url, --artifact-id and --date are required"
                        .into(),
                ));
            };
            nightly_repo_url(base, date, artifact, family, &os_profile.to_lowercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_repo_url_wins_when_alone() {
        let url = resolve_repo_url(
            PackageFamily::Deb,
            "ubuntu2404",
            ReleaseKind::Prerelease,
            Some("https://example.com/packages/ubuntu2404"),
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(url, "https://example.com/packages/ubuntu2404");
    }

    #[test]
    fn mixing_url_and_construction_args_is_rejected() {
        let err = resolve_repo_url(
            PackageFamily::Deb,
            "ubuntu2404",
            ReleaseKind::Nightly,
            Some("https://example.com/deb/"),
            Some("https://example.com"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SynstallError::Config(_)));
    }

    #[test]
    fn nightly_url_is_constructed_from_parts() {
        let url = resolve_repo_url(
            PackageFamily::Deb,
            "ubuntu2404",
            ReleaseKind::Nightly,
            None,
            Some("https://rocm.nightlies.example.com"),
            Some("21658678136"),
            Some("20260204"),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://rocm.nightlies.example.com/deb/20260204-21658678136/"
        );
    }

    #[test]
    fn incomplete_construction_group_is_rejected() {
        let err = resolve_repo_url(
            PackageFamily::RpmDnf,
            "rhel8",
            ReleaseKind::Nightly,
            None,
            Some("https://example.com"),
            None,
            Some("20260204"),
        )
        .unwrap_err();
        assert!(matches!(err, SynstallError::Config(_)));
    }

    #[test]
    fn package_type_override_must_match_family() {
        assert!(validate_package_type(Some(PackageType::Deb), PackageFamily::Deb).is_ok());
        assert!(validate_package_type(Some(PackageType::Rpm), PackageFamily::RpmZypper).is_ok());
        assert!(validate_package_type(None, PackageFamily::RpmDnf).is_ok());
        let err =
            validate_package_type(Some(PackageType::Deb), PackageFamily::RpmDnf).unwrap_err();
        assert!(matches!(err, SynstallError::Config(_)));
    }
}
