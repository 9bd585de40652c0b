use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "Data prefix:";

/// Extracts `<prefix>/bin/GMXRC` from the output of `gmx --version`.
pub fn gmxrc_from_version_output(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(|prefix| PathBuf::from(prefix).join("bin").join("GMXRC"))
}

/// Locates the GMXRC script of the GROMACS installation `program` belongs to.
///
/// Every failure is logged and yields `None`: commands then run with whatever
/// environment the shell already provides.
pub async fn discover_gmxrc(program: &str) -> Option<PathBuf> {
    let output = match Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("Could not execute '{} --version': {}", program, e);
            return None;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(gmxrc) = gmxrc_from_version_output(&stdout) else {
        warn!("No '{}' line in the output of '{} --version'", DATA_PREFIX, program);
        return None;
    };

    if !gmxrc.is_file() {
        warn!("No GMXRC found at: {}", gmxrc.display());
        return None;
    }
    debug!("Discovered GMXRC at {}", gmxrc.display());
    Some(gmxrc)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION_OUTPUT: &str = "\
                       :-) GROMACS - gmx, 2023.3 (-:

Executable:   /opt/gromacs-2023.3/bin/gmx
Data prefix:  /opt/gromacs-2023.3
Working dir:  /home/user
";

    #[test]
    fn data_prefix_line_yields_gmxrc_path() {
        assert_eq!(
            gmxrc_from_version_output(VERSION_OUTPUT),
            Some(PathBuf::from("/opt/gromacs-2023.3/bin/GMXRC"))
        );
    }

    #[test]
    fn output_without_data_prefix_yields_nothing() {
        assert_eq!(gmxrc_from_version_output("GROMACS version: 2023.3\n"), None);
        assert_eq!(gmxrc_from_version_output("Data prefix:   \n"), None);
    }

    #[tokio::test]
    async fn missing_program_is_not_an_error() {
        assert_eq!(discover_gmxrc("gmxflow-no-such-program").await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prefix_without_gmxrc_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-gmx");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho 'Data prefix:  {}'\n", dir.path().display()),
        )
        .unwrap();
        set_executable(&script);

        assert_eq!(discover_gmxrc(script.to_str().unwrap()).await, None);

        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(dir.path().join("bin/GMXRC"), "").unwrap();
        assert_eq!(
            discover_gmxrc(script.to_str().unwrap()).await,
            Some(dir.path().join("bin/GMXRC"))
        );
    }

    #[cfg(unix)]
    fn set_executable(path: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
