/*============================================================
  Synavera Project: Syn-Stall
  Module: synstall::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Resolve the filesystem locations touched by repository
    setup and verification: built-in defaults, overlaid by an
    optional TOML config file, overlaid by ROCM_* environment
    variables.

  Security / Safety Notes:
    Paths are taken as given; the tester is expected to run
    with whatever privileges the target locations require.

  Dependencies:
    serde/toml for the config file, dirs for its default path.

  Operational Scope:
    Loaded once at startup and shared read-only with the
    repository configurator and verifier.

  Revision History:
    2026-07-02 COD  Established location configuration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Configurable execution via config file and environment
    - Explicit precedence: env > file > defaults
    - No hidden path construction at call sites
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynstallError};

const ENV_REPO_NAME: &str = "ROCM_REPO_NAME";
const ENV_APT_KEYRING_DIR: &str = "ROCM_APT_KEYRING_DIR";
const ENV_APT_SOURCES_LIST: &str = "ROCM_APT_SOURCES_LIST";
const ENV_APT_KEYRING_FILE: &str = "ROCM_APT_KEYRING_FILE";
const ENV_ZYPP_REPOS_DIR: &str = "ROCM_ZYPP_REPOS_DIR";
const ENV_YUM_REPOS_DIR: &str = "ROCM_YUM_REPOS_DIR";
const ENV_RDHC_REL_PATH: &str = "ROCM_RDHC_REL_PATH";

/// Filesystem locations used by repository setup and verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Locations {
    /// Name of the repository entry written for the test run.
    pub repo_name: String,
    pub apt_keyring_dir: PathBuf,
    pub apt_keyring_file: PathBuf,
    pub apt_sources_list: PathBuf,
    pub yum_repos_dir: PathBuf,
    pub zypp_repos_dir: PathBuf,
    /// Helper script path relative to the install prefix.
    pub rdhc_rel_path: PathBuf,
}

impl Default for Locations {
    fn default() -> Self {
        Self {
            repo_name: "rocm-test".into(),
            apt_keyring_dir: "/etc/apt/keyrings".into(),
            apt_keyring_file: "/etc/apt/keyrings/rocm.gpg".into(),
            apt_sources_list: "/etc/apt/sources.list.d/rocm-test.list".into(),
            yum_repos_dir: "/etc/yum.repos.d".into(),
            zypp_repos_dir: "/etc/zypp/repos.d".into(),
            rdhc_rel_path: "libexec/rocm-core/rdhc.py".into(),
        }
    }
}

impl Locations {
    pub fn yum_repo_file(&self) -> PathBuf {
        self.yum_repos_dir.join(format!("{}.repo", self.repo_name))
    }

    pub fn zypp_repo_file(&self) -> PathBuf {
        self.zypp_repos_dir.join(format!("{}.repo", self.repo_name))
    }
}

/// Top-level Syn-Stall configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynstallConfig {
    pub locations: Locations,
}

impl SynstallConfig {
    /// Load configuration, preferring an explicit path over the default
    /// location; a missing default file yields built-in defaults, a
    /// missing explicit file is an error.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::load_file(explicit)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::load_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("synstall").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynstallError::Filesystem(format!(
                "Failed to read config file {}: {err}",
                path.display()
            ))
        })?;
        toml::from_str(&raw).map_err(|err| {
            SynstallError::Config(format!(
                "Failed to parse config file {}: {err}",
                path.display()
            ))
        })
    }

    /// Apply ROCM_* environment overrides via the supplied lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let locations = &mut self.locations;
        if let Some(name) = lookup(ENV_REPO_NAME) {
            locations.repo_name = name;
        }
        if let Some(dir) = lookup(ENV_APT_KEYRING_DIR) {
            locations.apt_keyring_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_APT_KEYRING_FILE) {
            locations.apt_keyring_file = PathBuf::from(file);
        }
        if let Some(list) = lookup(ENV_APT_SOURCES_LIST) {
            locations.apt_sources_list = PathBuf::from(list);
        }
        if let Some(dir) = lookup(ENV_ZYPP_REPOS_DIR) {
            locations.zypp_repos_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_YUM_REPOS_DIR) {
            locations.yum_repos_dir = PathBuf::from(dir);
        }
        if let Some(rel) = lookup(ENV_RDHC_REL_PATH) {
            locations.rdhc_rel_path = PathBuf::from(rel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_locations() {
        let locations = Locations::default();
        assert_eq!(locations.repo_name, "rocm-test");
        assert_eq!(
            locations.apt_sources_list,
            PathBuf::from("/etc/apt/sources.list.d/rocm-test.list")
        );
        assert_eq!(
            locations.yum_repo_file(),
            PathBuf::from("/etc/yum.repos.d/rocm-test.repo")
        );
        assert_eq!(
            locations.zypp_repo_file(),
            PathBuf::from("/etc/zypp/repos.d/rocm-test.repo")
        );
        assert_eq!(
            locations.rdhc_rel_path,
            PathBuf::from("libexec/rocm-core/rdhc.py")
        );
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut env = HashMap::new();
        env.insert("ROCM_REPO_NAME", "rocm-ci");
        env.insert("ROCM_APT_KEYRING_FILE", "/tmp/keyrings/ci.gpg");
        env.insert("ROCM_YUM_REPOS_DIR", "/tmp/yum.repos.d");
        env.insert("ROCM_RDHC_REL_PATH", "share/rdhc.py");

        let mut config = SynstallConfig::default();
        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.locations.repo_name, "rocm-ci");
        assert_eq!(
            config.locations.apt_keyring_file,
            PathBuf::from("/tmp/keyrings/ci.gpg")
        );
        assert_eq!(
            config.locations.yum_repo_file(),
            PathBuf::from("/tmp/yum.repos.d/rocm-ci.repo")
        );
        assert_eq!(config.locations.rdhc_rel_path, PathBuf::from("share/rdhc.py"));
        // Untouched fields keep their defaults.
        assert_eq!(
            config.locations.apt_sources_list,
            PathBuf::from("/etc/apt/sources.list.d/rocm-test.list")
        );
    }

    #[test]
    fn explicit_config_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[locations]\nrepo_name = \"rocm-smoke\"\nzypp_repos_dir = \"/tmp/zypp\""
        )
        .unwrap();

        let config = SynstallConfig::load_from_optional_path(Some(&path)).unwrap();
        assert_eq!(config.locations.repo_name, "rocm-smoke");
        assert_eq!(config.locations.zypp_repos_dir, PathBuf::from("/tmp/zypp"));
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let err =
            SynstallConfig::load_from_optional_path(Some(Path::new("/nonexistent/cfg.toml")))
                .unwrap_err();
        assert!(matches!(err, SynstallError::Filesystem(_)));
    }
}
