/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::verify
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Probe the filesystem and installed-package inventory to
    confirm the install landed: key component checklist,
    package listing, and best-effort diagnostic runs.

  Security / Safety Notes:
    Diagnostic binaries are executed from the install prefix
    with the invoking user's privileges and bounded timeouts.

  Dependencies:
    exec for bounded command execution.

  Operational Scope:
    Runs once after installation. Individual probes are
    non-fatal; the verdict is the checklist hit count against
    a fixed threshold.

  Revision History:
    2026-07-02 COD  Authored verification checklist and probes.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Independent checks, each downgraded to a warning
    - Deterministic verdict from an explicit threshold
    - Hardware-absent diagnostics never fail the run
============================================================*/

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::Locations;
use crate::exec::ExternalCommand;
use crate::logger::Logger;
use crate::profile::{InstallRequest, PackageFamily};

/// Key components expected under the install prefix.
pub const KEY_COMPONENTS: [&str; 4] = [
    "bin/rocminfo",
    "bin/hipcc",
    "include/hip/hip_runtime.h",
    "lib/libamdhip64.so",
];

/// Minimum checklist hits for a passing verdict. Inherited from the
/// source scripts; not all components are mandatory on every image.
pub const PASS_THRESHOLD: usize = 2;

const DIAGNOSTIC_TIMEOUT: Duration = Duration::from_secs(30);
const LISTING_TIMEOUT: Duration = Duration::from_secs(60);

/// Existence result for one checklist entry.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentCheck {
    pub path: String,
    pub found: bool,
}

/// Outcome of the verification phase.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub prefix_exists: bool,
    pub components: Vec<ComponentCheck>,
    pub found_count: usize,
    pub threshold: usize,
    pub passed: bool,
}

impl VerificationReport {
    fn prefix_missing() -> Self {
        Self {
            prefix_exists: false,
            components: Vec::new(),
            found_count: 0,
            threshold: PASS_THRESHOLD,
            passed: false,
        }
    }
}

/// Check each checklist entry under the prefix.
pub fn check_components(prefix: &Path, components: &[&str]) -> Vec<ComponentCheck> {
    components
        .iter()
        .map(|component| ComponentCheck {
            path: (*component).to_string(),
            found: prefix.join(component).exists(),
        })
        .collect()
}

fn first_nonempty_lines(text: &str, limit: usize) -> Vec<&str> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .take(limit)
        .collect()
}

/// Runs the post-install verification sequence.
pub struct Verifier<'a> {
    request: &'a InstallRequest,
    locations: &'a Locations,
    logger: &'a Logger,
}

impl<'a> Verifier<'a> {
    pub fn new(request: &'a InstallRequest, locations: &'a Locations, logger: &'a Logger) -> Self {
        Self {
            request,
            locations,
            logger,
        }
    }

    /// Run every probe and return the verdict. Never raises: a missing
    /// prefix short-circuits to a failed report.
    pub async fn verify(&self) -> VerificationReport {
        self.logger.section("VERIFYING INSTALLATION");

        let prefix = &self.request.install_prefix;
        if !prefix.exists() {
            println!(
                "\n[FAIL] Installation directory not found: {}",
                prefix.display()
            );
            return VerificationReport::prefix_missing();
        }
        println!("\n[PASS] Installation directory exists: {}", prefix.display());

        println!("\nChecking for key components:");
        let components = check_components(prefix, &KEY_COMPONENTS);
        for check in &components {
            if check.found {
                println!("   [PASS] {}", check.path);
            } else {
                println!("   [WARN] {} (not found)", check.path);
            }
        }
        let found_count = components.iter().filter(|check| check.found).count();
        println!("\nComponents found: {found_count}/{}", components.len());

        self.list_installed_packages().await;
        self.run_rocminfo().await;
        self.run_rdhc().await;

        let passed = found_count >= PASS_THRESHOLD;
        if passed {
            println!("\n[PASS] Installation verification PASSED");
        } else {
            println!("\n[FAIL] Installation verification FAILED");
        }

        VerificationReport {
            prefix_exists: true,
            components,
            found_count,
            threshold: PASS_THRESHOLD,
            passed,
        }
    }

    /// Best-effort inventory probe via the family's listing tool.
    async fn list_installed_packages(&self) {
        println!("\nChecking installed packages:");
        let command = match self.request.family {
            PackageFamily::Deb => ExternalCommand::new("dpkg").arg("-l"),
            PackageFamily::RpmDnf => ExternalCommand::new("rpm").arg("-qa"),
            PackageFamily::RpmZypper => {
                ExternalCommand::new("zypper").args(["--non-interactive", "search", "-i", "rocm"])
            }
        }
        .timeout(LISTING_TIMEOUT);

        self.logger
            .debug("VERIFY", format!("Running: {}", command.display()));
        match command.run_captured().await {
            Ok(outcome) if outcome.success() => {
                let matches: Vec<&str> = outcome
                    .stdout
                    .lines()
                    .filter(|line| line.to_lowercase().contains("rocm"))
                    .collect();
                println!("   Found {} matching packages installed", matches.len());
                if !matches.is_empty() {
                    println!("\n   Sample packages:");
                    for line in matches.iter().take(5) {
                        println!("      {}", line.trim());
                    }
                    if matches.len() > 5 {
                        println!("      ... and {} more", matches.len() - 5);
                    }
                }
            }
            Ok(outcome) => {
                self.logger.warn(
                    "VERIFY",
                    format!(
                        "Package listing exited with status {} (non-fatal)",
                        outcome.status
                    ),
                );
            }
            Err(err) => {
                self.logger
                    .warn("VERIFY", format!("Could not query installed packages: {err}"));
            }
        }
    }

    /// Execute the diagnostic binary if present. Failure or timeout is a
    /// warning only; the test host may have no GPU.
    async fn run_rocminfo(&self) {
        let rocminfo = self.request.install_prefix.join("bin").join("rocminfo");
        if !rocminfo.exists() {
            return;
        }
        println!("\nTrying to run rocminfo...");
        let command = ExternalCommand::new(rocminfo.display().to_string())
            .timeout(DIAGNOSTIC_TIMEOUT);
        match command.run_captured().await {
            Ok(outcome) if outcome.success() => {
                println!("   [PASS] rocminfo executed successfully");
                println!("\n   First few lines of rocminfo output:");
                for line in first_nonempty_lines(&outcome.stdout, 10) {
                    println!("      {line}");
                }
            }
            Ok(_) => {
                println!("   [WARN] rocminfo failed (may require GPU hardware)");
            }
            Err(err) => {
                println!("   [WARN] Could not run rocminfo: {err}");
            }
        }
    }

    /// Execute the helper script with `--all`, retrying bare on failure.
    async fn run_rdhc(&self) {
        self.logger.section("TESTING HELPER SCRIPT");

        let prefix = &self.request.install_prefix;
        let script = prefix.join(&self.locations.rdhc_rel_path);
        if !script.exists() {
            println!("\n[WARN] Helper script not found at: {}", script.display());
            println!("       This is expected if the core package is not installed");
            return;
        }
        println!("\n[PASS] Helper script found at: {}", script.display());

        let base = if is_executable(&script) {
            ExternalCommand::new(script.display().to_string())
        } else {
            ExternalCommand::new("python3").arg(script.display().to_string())
        }
        .current_dir(prefix)
        .timeout(DIAGNOSTIC_TIMEOUT);

        let with_all = base.clone().arg("--all");
        println!("\nRunning: {}", with_all.display());
        match with_all.run_captured().await {
            Ok(outcome) if outcome.success() => {
                println!("   [PASS] helper script executed successfully with --all");
                for line in first_nonempty_lines(&outcome.stdout, 5) {
                    println!("      {line}");
                }
                return;
            }
            Ok(outcome) => {
                println!(
                    "   [WARN] helper script --all exited with status {}, retrying without arguments...",
                    outcome.status
                );
            }
            Err(err) => {
                println!("   [WARN] helper script --all failed ({err}), retrying without arguments...");
            }
        }

        println!("\nRunning: {}", base.display());
        match base.run_captured().await {
            Ok(outcome) if outcome.success() => {
                println!("   [PASS] helper script executed successfully");
                for line in first_nonempty_lines(&outcome.stdout, 5) {
                    println!("      {line}");
                }
            }
            Ok(outcome) => {
                println!(
                    "   [WARN] helper script exited with status {}",
                    outcome.status
                );
                for line in first_nonempty_lines(&outcome.stdout, 3) {
                    println!("      {line}");
                }
            }
            Err(err) => {
                println!("   [WARN] Could not run helper script: {err}");
            }
        }
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ReleaseKind;
    use std::path::PathBuf;

    fn request(prefix: PathBuf) -> InstallRequest {
        InstallRequest::new(
            "ubuntu2404",
            "https://example.com/deb/",
            ReleaseKind::Nightly,
            "gfx94x",
            prefix,
            None,
        )
        .unwrap()
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[tokio::test]
    async fn missing_prefix_short_circuits_to_failure() {
        let locations = Locations::default();
        let logger = Logger::new(None, false).unwrap();
        let request = request(PathBuf::from("/nonexistent/rocm/prefix"));
        let report = Verifier::new(&request, &locations, &logger).verify().await;
        assert!(!report.prefix_exists);
        assert!(!report.passed);
        assert_eq!(report.found_count, 0);
    }

    #[tokio::test]
    async fn two_of_four_components_pass_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("bin/rocminfo"));
        touch(&dir.path().join("lib/libamdhip64.so"));
        // The bundled rocminfo is an empty file, not executable, so the
        // diagnostic probe warns and moves on.
        let locations = Locations::default();
        let logger = Logger::new(None, false).unwrap();
        let request = request(dir.path().to_path_buf());
        let report = Verifier::new(&request, &locations, &logger).verify().await;
        assert!(report.prefix_exists);
        assert_eq!(report.found_count, 2);
        assert!(report.passed);
    }

    #[tokio::test]
    async fn one_of_four_components_fails_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("bin/hipcc"));
        let locations = Locations::default();
        let logger = Logger::new(None, false).unwrap();
        let request = request(dir.path().to_path_buf());
        let report = Verifier::new(&request, &locations, &logger).verify().await;
        assert_eq!(report.found_count, 1);
        assert!(!report.passed);
    }

    #[test]
    fn component_checks_preserve_checklist_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("include/hip/hip_runtime.h"));
        let checks = check_components(dir.path(), &KEY_COMPONENTS);
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[2].path, "include/hip/hip_runtime.h");
        assert!(checks[2].found);
        assert!(!checks[0].found);
    }

    #[test]
    fn nonempty_line_filter_trims_and_limits() {
        let text = "first\n\n   \nsecond\nthird\nfourth\n";
        let lines = first_nonempty_lines(text, 3);
        assert_eq!(lines, vec!["first", "second", "third"]);
    }
}
