/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::install
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Install the package under test through the family's native
    package manager, streaming progress to the console.

  Security / Safety Notes:
    GPG-check flags mirror the repository trust configured in
    the previous phase; no checks are weakened beyond what the
    operator requested.

  Dependencies:
    exec for bounded streamed command execution.

  Operational Scope:
    One install per run, with a 30-minute bound. Failure here
    aborts the run before verification.

  Revision History:
    2026-07-02 COD  Authored family-specific installers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Exhaustive dispatch on the closed family variant
    - Live output for long-running operations
    - Bounded timeout with explicit kill
============================================================*/

use std::time::Duration;

use crate::error::{Result, SynstallError};
use crate::exec::ExternalCommand;
use crate::logger::Logger;
use crate::profile::{InstallRequest, PackageFamily};

const INSTALL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Build the family's install command for the request.
pub fn install_command(request: &InstallRequest) -> ExternalCommand {
    let command = match request.family {
        PackageFamily::Deb => ExternalCommand::new("apt").args(["install", "-y"]),
        PackageFamily::RpmDnf => ExternalCommand::new("dnf").args(["install", "-y"]),
        PackageFamily::RpmZypper => {
            let zypper = ExternalCommand::new("zypper").arg("--non-interactive");
            let zypper = if request.gpg_key_url.is_some() {
                zypper.arg("--gpg-auto-import-keys")
            } else {
                zypper.arg("--no-gpg-checks")
            };
            zypper.args(["install", "-y"])
        }
    };
    command
        .arg(request.package_name.as_str())
        .timeout(INSTALL_TIMEOUT)
}

/// Run the install, treating non-zero exit or timeout as fatal.
pub async fn install_package(request: &InstallRequest, logger: &Logger) -> Result<()> {
    logger.section("INSTALLING PACKAGE FROM REPOSITORY");
    println!("\nPackage to install: {}", request.package_name);

    let command = install_command(request);
    let display = command.display();
    println!("\nRunning: {display}");
    println!("Installation progress (streaming output):\n");

    match command.run_streaming().await {
        Ok(outcome) if outcome.success() => {
            logger.info(
                "INSTALL",
                format!("{} installed successfully", request.package_name),
            );
            Ok(())
        }
        Ok(outcome) => Err(SynstallError::Install(format!(
            "`{display}` exited with status {}",
            outcome.status
        ))),
        Err(SynstallError::CommandTimeout { command, timeout }) => Err(SynstallError::Install(
            format!("`{command}` timed out after {timeout:?}"),
        )),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ReleaseKind;
    use std::path::PathBuf;

    fn request(os_profile: &str, gpg_key_url: Option<&str>) -> InstallRequest {
        InstallRequest::new(
            os_profile,
            "https://example.com/repo/",
            ReleaseKind::Nightly,
            "gfx94x",
            PathBuf::from("/opt/rocm/core"),
            gpg_key_url.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn deb_install_uses_apt() {
        let command = install_command(&request("ubuntu2404", None));
        assert_eq!(command.display(), "apt install -y amdrocm-gfx94x");
    }

    #[test]
    fn dnf_install_uses_dnf() {
        let command = install_command(&request("almalinux9", None));
        assert_eq!(command.display(), "dnf install -y amdrocm-gfx94x");
    }

    #[test]
    fn zypper_install_skips_gpg_without_a_key() {
        let command = install_command(&request("sles16", None));
        assert_eq!(
            command.display(),
            "zypper --non-interactive --no-gpg-checks install -y amdrocm-gfx94x"
        );
    }

    #[test]
    fn zypper_install_auto_imports_with_a_key() {
        let command = install_command(&request("sles16", Some("https://example.com/key.gpg")));
        assert_eq!(
            command.display(),
            "zypper --non-interactive --gpg-auto-import-keys install -y amdrocm-gfx94x"
        );
    }
}
