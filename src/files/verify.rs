//! Candidate materialization and syntax verification.
//!
//! # Responsibilities
//! - Write certificates into `certs.d/` and static files into the config dir
//! - Write the candidate to a scratch file
//! - Run `<binary> -c -f <scratch>` and capture its diagnostics
//!
//! # Design Decisions
//! - Auxiliary files are written before the check and never rolled back;
//!   only the active configuration is protected by verification
//! - The scratch file is removed on every exit path (dropped `NamedTempFile`)
//! - Static files may not take names the converger manages itself: the active
//!   configuration, its `<name>-*` siblings, the marker and `certs.d`

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::config::schema::{CERTS_DIR_NAME, MARKER_FILE_NAME};
use crate::config::HaproxyConfig;
use crate::resilience::timeouts::with_deadline;
use crate::source::ProxyConfiguration;

const SCRATCH_PREFIX: &str = "haproxy_new_config_";
const CERTS_DIR_MODE: u32 = 0o755;

/// Errors from materializing or verifying a candidate.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// haproxy rejected the candidate.
    #[error("invalid haproxy configuration ({status}): {diagnostics}")]
    InvalidConfig {
        config: String,
        diagnostics: String,
        status: ExitStatus,
    },

    #[error("refusing to write {kind} file with unsafe name {name:?}")]
    UnsafeFileName { kind: &'static str, name: String },

    #[error("failed to write {}: {source}", .path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare scratch configuration: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("failed to run syntax check with {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax check with {binary} did not finish within {}s", .deadline.as_secs())]
    Timeout { binary: String, deadline: Duration },
}

/// Materialize auxiliary files, then syntax check `candidate`.
pub async fn verify(
    haproxy: &HaproxyConfig,
    proxy: &ProxyConfiguration,
    candidate: &str,
    deadline: Duration,
) -> Result<(), VerifyError> {
    materialize(haproxy, proxy).await?;
    check_syntax(&haproxy.binary, candidate, deadline).await
}

/// Write certificates and static files, overwriting whatever is there.
pub async fn materialize(haproxy: &HaproxyConfig, proxy: &ProxyConfiguration) -> Result<(), VerifyError> {
    let certs_dir = haproxy.certs_dir();
    if !tokio::fs::try_exists(&certs_dir).await.unwrap_or(false) {
        create_certs_dir(&certs_dir).await?;
    }

    for (name, contents) in &proxy.certs {
        write_file(&certs_dir, "cert", name, contents).await?;
    }

    for (name, contents) in &proxy.files {
        if is_reserved_name(haproxy, name) {
            return Err(VerifyError::UnsafeFileName {
                kind: "static",
                name: name.clone(),
            });
        }
        write_file(&haproxy.config_path, "static", name, contents).await?;
    }

    tracing::debug!(
        certs = proxy.certs.len(),
        files = proxy.files.len(),
        "Auxiliary files written"
    );
    Ok(())
}

/// Run the haproxy syntax check against a scratch copy of `candidate`.
pub async fn check_syntax(binary: &str, candidate: &str, deadline: Duration) -> Result<(), VerifyError> {
    check_syntax_in(binary, candidate, deadline, &std::env::temp_dir()).await
}

/// [`check_syntax`] with the scratch file created in `scratch_dir`.
pub async fn check_syntax_in(
    binary: &str,
    candidate: &str,
    deadline: Duration,
    scratch_dir: &Path,
) -> Result<(), VerifyError> {
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempfile_in(scratch_dir)
        .map_err(VerifyError::Scratch)?;
    tokio::fs::write(scratch.path(), candidate)
        .await
        .map_err(VerifyError::Scratch)?;

    let child = Command::new(binary)
        .arg("-c")
        .arg("-f")
        .arg(scratch.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| VerifyError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    let output = with_deadline(
        deadline,
        async {
            child.wait_with_output().await.map_err(|source| VerifyError::Spawn {
                binary: binary.to_string(),
                source,
            })
        },
        || VerifyError::Timeout {
            binary: binary.to_string(),
            deadline,
        },
    )
    .await?;

    if !output.status.success() {
        let diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!(
            binary,
            status = %output.status,
            diagnostics = %diagnostics,
            config = %candidate,
            "haproxy rejected candidate configuration"
        );
        return Err(VerifyError::InvalidConfig {
            config: candidate.to_string(),
            diagnostics,
            status: output.status,
        });
    }

    tracing::debug!(binary, "Candidate configuration passed syntax check");
    Ok(())
}

async fn create_certs_dir(path: &Path) -> Result<(), VerifyError> {
    let materialize_err = |source| VerifyError::Materialize {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(path).await.map_err(materialize_err)?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(CERTS_DIR_MODE))
        .await
        .map_err(materialize_err)?;

    tracing::info!(path = %path.display(), "Created certificate directory");
    Ok(())
}

async fn write_file(dir: &Path, kind: &'static str, name: &str, contents: &str) -> Result<(), VerifyError> {
    if !is_plain_file_name(name) {
        return Err(VerifyError::UnsafeFileName {
            kind,
            name: name.to_string(),
        });
    }

    let path = dir.join(name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| VerifyError::Materialize { path, source })
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

fn is_reserved_name(haproxy: &HaproxyConfig, name: &str) -> bool {
    let config_name = haproxy.config_name.as_str();
    name == config_name
        || name == MARKER_FILE_NAME
        || name == CERTS_DIR_NAME
        || name
            .strip_prefix(config_name)
            .is_some_and(|rest| rest.starts_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn haproxy_in(dir: &Path) -> HaproxyConfig {
        HaproxyConfig {
            config_path: dir.to_path_buf(),
            ..HaproxyConfig::default()
        }
    }

    #[tokio::test]
    async fn test_materialize_writes_certs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let haproxy = haproxy_in(dir.path());
        let proxy = ProxyConfiguration {
            template: String::new(),
            certs: BTreeMap::from([("site.pem".to_string(), "CERT".to_string())]),
            files: BTreeMap::from([("errors.http".to_string(), "503".to_string())]),
        };

        materialize(&haproxy, &proxy).await.unwrap();

        let certs_dir = dir.path().join("certs.d");
        let mode = std::fs::metadata(&certs_dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_to_string(certs_dir.join("site.pem")).unwrap(), "CERT");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("errors.http")).unwrap(),
            "503"
        );

        // Second pass overwrites in place.
        let proxy = ProxyConfiguration {
            certs: BTreeMap::from([("site.pem".to_string(), "CERT2".to_string())]),
            ..ProxyConfiguration::default()
        };
        materialize(&haproxy, &proxy).await.unwrap();
        assert_eq!(std::fs::read_to_string(certs_dir.join("site.pem")).unwrap(), "CERT2");
    }

    #[tokio::test]
    async fn test_unsafe_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let proxy = ProxyConfiguration {
            files: BTreeMap::from([("../escape".to_string(), "x".to_string())]),
            ..ProxyConfiguration::default()
        };

        let err = materialize(&haproxy_in(dir.path()), &proxy).await.unwrap_err();
        assert!(matches!(err, VerifyError::UnsafeFileName { kind: "static", .. }));
    }

    #[tokio::test]
    async fn test_reserved_static_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let haproxy = haproxy_in(dir.path());
        std::fs::write(haproxy.active_config(), "active\n").unwrap();

        for name in [
            "haproxy.cfg",
            "haproxy.cfg-new",
            "haproxy.cfg-2024-01-01T00:00:00Z",
            "haproxy-lastupdated.txt",
            "certs.d",
        ] {
            let proxy = ProxyConfiguration {
                files: BTreeMap::from([(name.to_string(), "overwritten\n".to_string())]),
                ..ProxyConfiguration::default()
            };

            let err = materialize(&haproxy, &proxy).await.unwrap_err();

            assert!(
                matches!(&err, VerifyError::UnsafeFileName { kind: "static", name: n } if n == name),
                "{name} should be rejected, got {err}"
            );
        }
        assert_eq!(std::fs::read_to_string(haproxy.active_config()).unwrap(), "active\n");
        assert!(!dir.path().join("haproxy.cfg-new").exists());
        assert!(!haproxy.marker_file().exists());
    }

    #[tokio::test]
    async fn test_similar_static_names_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let proxy = ProxyConfiguration {
            files: BTreeMap::from([("haproxy.cfg.map".to_string(), "x".to_string())]),
            ..ProxyConfiguration::default()
        };

        materialize(&haproxy_in(dir.path()), &proxy).await.unwrap();

        assert!(dir.path().join("haproxy.cfg.map").exists());
    }

    fn scratch_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect()
    }

    #[tokio::test]
    async fn test_check_syntax_accepts() {
        check_syntax("true", "global\n", Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_scratch_removed_after_success() {
        let scratch = tempfile::tempdir().unwrap();

        check_syntax_in("true", "global\n", Duration::from_secs(5), scratch.path())
            .await
            .unwrap();

        assert!(scratch_files(scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_scratch_removed_after_rejection() {
        let scratch = tempfile::tempdir().unwrap();

        let err = check_syntax_in("false", "broken\n", Duration::from_secs(5), scratch.path())
            .await
            .unwrap_err();

        assert!(matches!(err, VerifyError::InvalidConfig { .. }));
        assert!(scratch_files(scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_slow_check_times_out() {
        let bin = tempfile::tempdir().unwrap();
        let checker = bin.path().join("slow-haproxy");
        std::fs::write(&checker, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&checker, std::fs::Permissions::from_mode(0o755)).unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let started = std::time::Instant::now();
        let err = check_syntax_in(
            checker.to_str().unwrap(),
            "global\n",
            Duration::from_millis(100),
            scratch.path(),
        )
        .await
        .unwrap_err();

        match err {
            VerifyError::Timeout { deadline, .. } => {
                assert_eq!(deadline, Duration::from_millis(100));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(scratch_files(scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_check_syntax_rejects() {
        let err = check_syntax("false", "broken\n", Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            VerifyError::InvalidConfig { config, status, .. } => {
                assert_eq!(config, "broken\n");
                assert!(!status.success());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = check_syntax("/nonexistent/haproxy", "global\n", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Spawn { .. }));
    }
}
