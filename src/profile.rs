/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::profile
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Map OS profile codes onto packaging families and derive
    the immutable install request (package name, repository
    URL) consumed by every later phase.

  Security / Safety Notes:
    Pure string and date validation; no I/O performed here.

  Dependencies:
    chrono for build-date validation, clap for value enums.

  Operational Scope:
    Constructed once at startup; downstream phases dispatch
    exhaustively on the closed PackageFamily variant.

  Revision History:
    2026-07-02 COD  Authored profile resolver and request type.
    2026-07-15 COD  Added local nightly URL construction.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Closed tagged dispatch instead of ad hoc string checks
    - Fail-fast validation before any side effect
    - Derived fields computed once, never mutated
============================================================*/

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Serialize;

use crate::error::{Result, SynstallError};

/// Packaging toolchain family derived from the OS profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageFamily {
    Deb,
    RpmDnf,
    RpmZypper,
}

impl PackageFamily {
    /// Resolve a family from an OS profile code by case-insensitive prefix.
    pub fn resolve(os_profile: &str) -> Result<Self> {
        let profile = os_profile.trim().to_lowercase();
        if profile.starts_with("ubuntu") || profile.starts_with("debian") {
            Ok(PackageFamily::Deb)
        } else if profile.starts_with("rhel")
            || profile.starts_with("almalinux")
            || profile.starts_with("centos")
            || profile.starts_with("azl")
        {
            Ok(PackageFamily::RpmDnf)
        } else if profile.starts_with("sles") {
            Ok(PackageFamily::RpmZypper)
        } else {
            Err(SynstallError::Config(format!(
                "Unable to derive package family from OS profile `{os_profile}`. \
                 Supported profiles: ubuntu*, debian*, rhel*, almalinux*, centos*, azl*, sles*"
            )))
        }
    }

}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageFamily::Deb => "DEB",
            PackageFamily::RpmDnf => "RPM (dnf)",
            PackageFamily::RpmZypper => "RPM (zypper)",
        };
        write!(f, "{name}")
    }
}

/// Release channel of the repository under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Nightly,
    Prerelease,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseKind::Nightly => write!(f, "nightly"),
            ReleaseKind::Prerelease => write!(f, "prerelease"),
        }
    }
}

/// Immutable description of one installation-acceptance run.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub os_profile: String,
    pub family: PackageFamily,
    pub release_kind: ReleaseKind,
    pub gfx_arch: String,
    pub package_name: String,
    pub repo_url: String,
    pub install_prefix: PathBuf,
    pub gpg_key_url: Option<String>,
}

impl InstallRequest {
    /// Validate inputs and derive the family and package name once.
    pub fn new(
        os_profile: &str,
        repo_url: &str,
        release_kind: ReleaseKind,
        gfx_arch: &str,
        install_prefix: PathBuf,
        gpg_key_url: Option<String>,
    ) -> Result<Self> {
        let os_profile = os_profile.trim().to_lowercase();
        let family = PackageFamily::resolve(&os_profile)?;
        let gfx_arch = gfx_arch.trim().to_lowercase();
        if gfx_arch.is_empty() {
            return Err(SynstallError::Config("GPU architecture cannot be empty".into()));
        }
        let repo_url = repo_url.trim().trim_end_matches('/').to_string();
        if repo_url.is_empty() {
            return Err(SynstallError::Config("Repository URL cannot be empty".into()));
        }
        let gpg_key_url = gpg_key_url.filter(|url| !url.trim().is_empty());
        let package_name = format!("amdrocm-{gfx_arch}");

        Ok(Self {
            os_profile,
            family,
            release_kind,
            gfx_arch,
            package_name,
            repo_url,
            install_prefix,
            gpg_key_url,
        })
    }
}

/// Validate a build date in YYYYMMDD form.
pub fn validate_build_date(date: &str) -> Result<()> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SynstallError::Config(format!(
            "Invalid date format: {date}. Must be YYYYMMDD (e.g., 20260204)"
        )));
    }
    NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| {
        SynstallError::Config(format!("Invalid calendar date: {date}"))
    })?;
    Ok(())
}

/// Construct a nightly repository URL from its parts.
///
/// DEB repositories live at `<base>/deb/<date>-<artifact_id>/`; RPM
/// repositories add the OS profile and architecture:
/// `<base>/rpm/<date>-<artifact_id>/<os_profile>/x86_64/`.
pub fn nightly_repo_url(
    base_url: &str,
    date: &str,
    artifact_id: &str,
    family: PackageFamily,
    os_profile: &str,
) -> Result<String> {
    validate_build_date(date)?;
    let artifact_id = artifact_id.trim();
    if artifact_id.is_empty() {
        return Err(SynstallError::Config("Artifact ID cannot be empty".into()));
    }
    let base = base_url.trim_end_matches('/');
    let url = match family {
        PackageFamily::Deb => {
            format!("{base}/deb/{date}-{artifact_id}/")
        }
        PackageFamily::RpmDnf | PackageFamily::RpmZypper => {
            format!("{base}/rpm/{date}-{artifact_id}/{os_profile}/x86_64/")
        }
    };
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deb_profiles_resolve_to_deb() {
        for profile in ["ubuntu2404", "Ubuntu2204", "DEBIAN12", "debian13"] {
            assert_eq!(PackageFamily::resolve(profile).unwrap(), PackageFamily::Deb);
        }
    }

    #[test]
    fn dnf_profiles_resolve_to_rpm_dnf() {
        for profile in ["rhel8", "RHEL9", "almalinux9", "centos9", "azl3"] {
            assert_eq!(
                PackageFamily::resolve(profile).unwrap(),
                PackageFamily::RpmDnf
            );
        }
    }

    #[test]
    fn sles_profiles_resolve_to_zypper() {
        for profile in ["sles15", "SLES16"] {
            assert_eq!(
                PackageFamily::resolve(profile).unwrap(),
                PackageFamily::RpmZypper
            );
        }
    }

    #[test]
    fn unknown_profile_is_a_config_error() {
        let err = PackageFamily::resolve("windows11").unwrap_err();
        assert!(matches!(err, SynstallError::Config(_)));
        assert!(err.to_string().contains("ubuntu*"));
    }

    #[test]
    fn package_name_derives_from_gfx_arch() {
        let request = InstallRequest::new(
            "ubuntu2404",
            "https://rocm.nightlies.example.com/deb/20260204-21658678136/",
            ReleaseKind::Nightly,
            "gfx1151",
            PathBuf::from("/opt/rocm/core"),
            None,
        )
        .unwrap();
        assert_eq!(request.package_name, "amdrocm-gfx1151");
        assert_eq!(request.family, PackageFamily::Deb);
    }

    #[test]
    fn gfx_arch_is_lowercased() {
        let request = InstallRequest::new(
            "rhel8",
            "https://example.com/rpm/",
            ReleaseKind::Nightly,
            "GFX94X",
            PathBuf::from("/opt/rocm/core"),
            None,
        )
        .unwrap();
        assert_eq!(request.package_name, "amdrocm-gfx94x");
    }

    #[test]
    fn empty_gpg_key_url_is_dropped() {
        let request = InstallRequest::new(
            "sles16",
            "https://example.com/rpm/",
            ReleaseKind::Prerelease,
            "gfx94x",
            PathBuf::from("/opt/rocm/core"),
            Some("  ".into()),
        )
        .unwrap();
        assert!(request.gpg_key_url.is_none());
    }

    #[test]
    fn nightly_deb_url_matches_expected_shape() {
        let url = nightly_repo_url(
            "https://rocm.nightlies.example.com",
            "20260204",
            "21658678136",
            PackageFamily::Deb,
            "ubuntu2404",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://rocm.nightlies.example.com/deb/20260204-21658678136/"
        );
    }

    #[test]
    fn nightly_rpm_url_carries_profile_and_arch() {
        let url = nightly_repo_url(
            "https://rocm.nightlies.example.com/",
            "20260204",
            "21658678136",
            PackageFamily::RpmDnf,
            "rhel8",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://rocm.nightlies.example.com/rpm/20260204-21658678136/rhel8/x86_64/"
        );
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for date in ["2026020", "202602040", "2026020a", "20261340"] {
            assert!(validate_build_date(date).is_err(), "accepted {date}");
        }
        assert!(validate_build_date("20260204").is_ok());
    }
}
