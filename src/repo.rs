/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::repo
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Configure the package-manager repository for the family
    under test: APT sources list with optional keyring trust,
    or dnf/zypper .repo ini sections, followed by a metadata
    refresh.

  Security / Safety Notes:
    GPG keys are fetched over HTTPS and dearmored through the
    system gpg binary; without a key the repository is marked
    trusted/unchecked exactly as the operator requested.

  Dependencies:
    reqwest for key download, tokio::process via exec for the
    package-manager shell-outs.

  Operational Scope:
    Runs once per acceptance test before installation. Any
    failure here aborts the whole run.

  Revision History:
    2026-07-02 COD  Authored family-specific configurators.
    2026-07-15 COD  Switched key fetch from wget to reqwest.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One handler per closed family variant
    - Best-effort steps downgraded to warnings, never ignored
    - Bounded timeouts on every refresh
============================================================*/

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use crate::config::Locations;
use crate::error::{Result, SynstallError};
use crate::exec::ExternalCommand;
use crate::logger::Logger;
use crate::profile::{InstallRequest, PackageFamily};

const REFRESH_TIMEOUT: Duration = Duration::from_secs(120);
const CACHE_CLEAN_TIMEOUT: Duration = Duration::from_secs(60);
const KEY_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Configures the repository source for one install request.
pub struct RepoConfigurator<'a> {
    request: &'a InstallRequest,
    locations: &'a Locations,
    logger: &'a Logger,
}

impl<'a> RepoConfigurator<'a> {
    pub fn new(request: &'a InstallRequest, locations: &'a Locations, logger: &'a Logger) -> Self {
        Self {
            request,
            locations,
            logger,
        }
    }

    /// Write the family's repository source and refresh its metadata.
    pub async fn configure(&self) -> Result<()> {
        match self.request.family {
            PackageFamily::Deb => self.configure_deb().await,
            PackageFamily::RpmDnf => self.configure_dnf().await,
            PackageFamily::RpmZypper => self.configure_zypper().await,
        }
    }

    async fn configure_deb(&self) -> Result<()> {
        self.logger.section("SETTING UP DEB REPOSITORY");
        println!("\nRepository URL: {}", self.request.repo_url);
        println!("Release Type: {}", self.request.release_kind);

        let keyring = if let Some(key_url) = &self.request.gpg_key_url {
            self.install_apt_keyring(key_url).await?;
            Some(self.locations.apt_keyring_file.as_path())
        } else {
            None
        };

        let entry = render_apt_source_line(&self.request.repo_url, keyring);
        write_config_file(&self.locations.apt_sources_list, &entry)?;
        self.logger.info(
            "REPO",
            format!(
                "Repository added to {}: {}",
                self.locations.apt_sources_list.display(),
                entry.trim()
            ),
        );

        println!("\nUpdating package lists...");
        let update = ExternalCommand::new("apt")
            .arg("update")
            .timeout(REFRESH_TIMEOUT);
        run_refresh(update).await
    }

    async fn configure_dnf(&self) -> Result<()> {
        self.logger.section("SETTING UP RPM REPOSITORY (dnf)");
        println!("\nRepository URL: {}", self.request.repo_url);
        println!("OS Profile: {}", self.request.os_profile);

        let content = render_repo_ini(
            &self.locations.repo_name,
            &self.request.repo_url,
            &self.request.release_kind.to_string(),
            self.request.gpg_key_url.as_deref(),
        );
        let repo_file = self.locations.yum_repo_file();
        write_config_file(&repo_file, &content)?;
        self.logger.info(
            "REPO",
            format!("Repository file created: {}", repo_file.display()),
        );
        println!("\nRepository configuration:\n{content}");

        // Stale cache entries can shadow the freshly published repo.
        let clean = ExternalCommand::new("dnf")
            .args(["clean", "all"])
            .timeout(CACHE_CLEAN_TIMEOUT);
        match clean.run_captured().await {
            Ok(outcome) if outcome.success() => {
                self.logger.info("REPO", "dnf cache cleaned");
            }
            Ok(outcome) => {
                self.logger.warn(
                    "REPO",
                    format!("dnf clean exited with status {} (non-fatal)", outcome.status),
                );
            }
            Err(err) => {
                self.logger
                    .warn("REPO", format!("dnf clean failed (non-fatal): {err}"));
            }
        }

        println!("\nRefreshing repository metadata...");
        let makecache = ExternalCommand::new("dnf")
            .arg("makecache")
            .timeout(REFRESH_TIMEOUT);
        run_refresh(makecache).await
    }

    async fn configure_zypper(&self) -> Result<()> {
        self.logger.section("SETTING UP RPM REPOSITORY (zypper)");
        println!("\nRepository URL: {}", self.request.repo_url);
        println!("OS Profile: {}", self.request.os_profile);

        // A stale repo with the same alias would mask the new baseurl.
        let remove = ExternalCommand::new("zypper")
            .args(["--non-interactive", "removerepo"])
            .arg(self.locations.repo_name.as_str())
            .timeout(CACHE_CLEAN_TIMEOUT);
        if let Err(err) = remove.run_captured().await {
            self.logger
                .warn("REPO", format!("removerepo skipped: {err}"));
        }

        let content = render_repo_ini(
            &self.locations.repo_name,
            &self.request.repo_url,
            &self.request.release_kind.to_string(),
            self.request.gpg_key_url.as_deref(),
        );
        let repo_file = self.locations.zypp_repo_file();
        write_config_file(&repo_file, &content)?;
        self.logger.info(
            "REPO",
            format!("Repository file created: {}", repo_file.display()),
        );
        println!("\nRepository configuration:\n{content}");

        println!("\nRefreshing repository metadata...");
        let mut refresh = ExternalCommand::new("zypper").arg("--non-interactive");
        if self.request.gpg_key_url.is_some() {
            refresh = refresh.arg("--gpg-auto-import-keys");
        }
        let refresh = refresh
            .arg("refresh")
            .arg(self.locations.repo_name.as_str())
            .timeout(REFRESH_TIMEOUT);
        run_refresh(refresh).await
    }

    /// Fetch the ASCII-armored key and dearmor it into the APT keyring.
    async fn install_apt_keyring(&self, key_url: &str) -> Result<()> {
        self.logger.section("SETTING UP GPG KEY");
        println!("\nGPG Key URL: {key_url}");

        let keyring_dir = &self.locations.apt_keyring_dir;
        std::fs::create_dir_all(keyring_dir).map_err(|err| {
            SynstallError::Filesystem(format!(
                "Failed to create keyring directory {}: {err}",
                keyring_dir.display()
            ))
        })?;
        set_mode(keyring_dir, 0o755)?;

        let armored = download_key(key_url).await?;
        let keyring_file = &self.locations.apt_keyring_file;
        let mut armored_path = keyring_file.as_os_str().to_os_string();
        armored_path.push(".asc");
        let armored_path = std::path::PathBuf::from(armored_path);
        std::fs::write(&armored_path, &armored).map_err(|err| {
            SynstallError::Filesystem(format!(
                "Failed to stage armored key {}: {err}",
                armored_path.display()
            ))
        })?;

        let dearmor = ExternalCommand::new("gpg")
            .args(["--batch", "--yes", "--dearmor", "--output"])
            .arg(keyring_file.display().to_string())
            .arg(armored_path.display().to_string())
            .timeout(KEY_DOWNLOAD_TIMEOUT);
        dearmor.run_checked().await?;
        let _ = std::fs::remove_file(&armored_path);

        set_mode(keyring_file, 0o644)?;
        self.logger.info(
            "REPO",
            format!("GPG key imported to {}", keyring_file.display()),
        );
        Ok(())
    }
}

/// Render the one-line APT source entry.
///
/// With a keyring the entry pins `signed-by`; without one the repository
/// is marked `trusted=yes`, matching the unsigned nightly channel.
pub fn render_apt_source_line(repo_url: &str, keyring: Option<&Path>) -> String {
    match keyring {
        Some(keyring) => format!(
            "deb [arch=amd64 signed-by={}] {repo_url} stable main\n",
            keyring.display()
        ),
        None => format!("deb [arch=amd64 trusted=yes] {repo_url} stable main\n"),
    }
}

/// Render the ini section shared by the dnf and zypper configurators.
pub fn render_repo_ini(
    repo_name: &str,
    repo_url: &str,
    release_kind: &str,
    gpg_key_url: Option<&str>,
) -> String {
    match gpg_key_url {
        Some(key_url) => format!(
            "[{repo_name}]\nname=ROCm {release_kind} repository\nbaseurl={repo_url}\nenabled=1\ngpgcheck=1\ngpgkey={key_url}\n"
        ),
        None => format!(
            "[{repo_name}]\nname=ROCm {release_kind} repository\nbaseurl={repo_url}\nenabled=1\ngpgcheck=0\n"
        ),
    }
}

fn write_config_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynstallError::Filesystem(format!(
                "Failed to create directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(path, content).map_err(|err| {
        SynstallError::Filesystem(format!("Failed to write {}: {err}", path.display()))
    })
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|err| {
        SynstallError::Filesystem(format!(
            "Failed to set permissions on {}: {err}",
            path.display()
        ))
    })
}

async fn download_key(key_url: &str) -> Result<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(KEY_DOWNLOAD_TIMEOUT)
        .user_agent("Syn-Stall/0.3 (linux)")
        .build()
        .map_err(|err| SynstallError::Network(format!("Failed to build HTTP client: {err}")))?;
    let response = client
        .get(key_url)
        .send()
        .await
        .map_err(|err| SynstallError::Network(format!("GPG key request to {key_url} failed: {err}")))?;
    if !response.status().is_success() {
        return Err(SynstallError::Network(format!(
            "GPG key request to {key_url} returned status {}",
            response.status()
        )));
    }
    let body = response
        .bytes()
        .await
        .map_err(|err| SynstallError::Network(format!("Failed to read GPG key body: {err}")))?;
    Ok(body.to_vec())
}

/// Run a refresh command, folding non-zero exit and timeout into
/// repository-setup failures.
async fn run_refresh(command: ExternalCommand) -> Result<()> {
    let display = command.display();
    println!("Running: {display}");
    match command.run_streaming().await {
        Ok(outcome) if outcome.success() => Ok(()),
        Ok(outcome) => Err(SynstallError::RepoSetup(format!(
            "`{display}` exited with status {}",
            outcome.status
        ))),
        Err(SynstallError::CommandTimeout { command, timeout }) => Err(SynstallError::RepoSetup(
            format!("`{command}` timed out after {timeout:?}"),
        )),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn unsigned_source_line_is_trusted_and_unsigned() {
        let line = render_apt_source_line("https://example.com/deb/20260204-1/", None);
        assert!(line.contains("trusted=yes"));
        assert!(!line.contains("signed-by"));
        assert!(line.ends_with("stable main\n"));
    }

    #[test]
    fn signed_source_line_pins_the_keyring() {
        let keyring = PathBuf::from("/etc/apt/keyrings/rocm.gpg");
        let line = render_apt_source_line("https://example.com/deb/20260204-1/", Some(&keyring));
        assert!(line.contains("signed-by=/etc/apt/keyrings/rocm.gpg"));
        assert!(!line.contains("trusted=yes"));
    }

    #[test]
    fn repo_ini_without_key_disables_gpgcheck() {
        let ini = render_repo_ini("rocm-test", "https://example.com/rpm/", "nightly", None);
        assert!(ini.starts_with("[rocm-test]\n"));
        assert!(ini.contains("gpgcheck=0"));
        assert!(!ini.contains("gpgkey="));
    }

    #[test]
    fn repo_ini_with_key_enables_gpgcheck() {
        let ini = render_repo_ini(
            "rocm-test",
            "https://example.com/rpm/",
            "prerelease",
            Some("https://example.com/gpg/rocm.gpg"),
        );
        assert!(ini.contains("gpgcheck=1"));
        assert!(ini.contains("gpgkey=https://example.com/gpg/rocm.gpg"));
        assert!(ini.contains("name=ROCm prerelease repository"));
    }

    #[test]
    fn config_files_are_written_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.list.d").join("rocm-test.list");
        write_config_file(&path, "deb [arch=amd64 trusted=yes] x stable main\n").unwrap();
        let read_back = std::fs::read_to_string(&path).unwrap();
        assert!(read_back.contains("trusted=yes"));
    }
}
