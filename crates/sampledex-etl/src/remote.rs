//! Running the external analysis engine inside a secondary environment.
//!
//! The external engine lives in a conda environment inside a Linux
//! subsystem reached through a launcher command (`wsl` by default). The
//! launcher runs `sampledex reanalyze --engine external` on the other side,
//! against the same sample database seen through its mount-point path.

use sampledex_core::paths::to_mount_style;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};

/// Quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[derive(Debug, Clone)]
pub struct RemoteLauncher {
    config: RemoteConfig,
}

impl RemoteLauncher {
    #[must_use]
    pub const fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// Shell snippet activating the analysis environment: the prefix path
    /// first, the named environment as fallback.
    fn activation(&self) -> String {
        let by_name = format!("conda activate {}", shell_quote(&self.config.env_name));
        match &self.config.env_path {
            Some(path) => format!(
                "conda activate {} 2>/dev/null || {by_name}",
                shell_quote(&to_mount_style(path))
            ),
            None => by_name,
        }
    }

    fn in_shell(&self, script: String) -> Vec<String> {
        vec![
            self.config.launcher.clone(),
            "bash".to_string(),
            "-ic".to_string(),
            script,
        ]
    }

    pub fn runtime_check_command(&self) -> Vec<String> {
        vec![
            self.config.launcher.clone(),
            "echo".to_string(),
            "test".to_string(),
        ]
    }

    pub fn shell_check_command(&self) -> Vec<String> {
        self.in_shell("which conda".to_string())
    }

    pub fn environment_check_command(&self) -> Vec<String> {
        self.in_shell(format!(
            "{} && {} --version",
            self.activation(),
            self.config.program
        ))
    }

    /// The reanalysis command for the database in `db_dir`, whose path is
    /// translated to mount-point style.
    pub fn analysis_command(&self, db_dir: &Path, force: bool) -> Vec<String> {
        let db_path = to_mount_style(&db_dir.to_string_lossy());
        let mut script = format!(
            "{} && {} reanalyze --engine external --db-path {}",
            self.activation(),
            self.config.program,
            shell_quote(&db_path)
        );
        if force {
            script.push_str(" --force");
        }
        script.push_str(" 2>&1");
        self.in_shell(script)
    }

    async fn status_of(args: &[String]) -> Option<ExitStatus> {
        let (program, rest) = args.split_first()?;
        log::debug!("Running {:?}", args);
        match Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) => Some(output.status),
            Err(e) => {
                log::debug!("Failed to start {}: {}", program, e);
                None
            }
        }
    }

    /// Check, in order, that the launcher works, that conda is available
    /// behind it, and that the analysis environment activates and has
    /// sampledex installed.
    pub async fn preflight(&self) -> Result<()> {
        let launcher = &self.config.launcher;

        if !Self::status_of(&self.runtime_check_command())
            .await
            .is_some_and(|s| s.success())
        {
            return Err(Error::setup(
                format!("The secondary runtime ('{launcher}') is not available."),
                format!(
                    "Install WSL with 'wsl --install' from an administrator prompt, reboot, \
                     and check that '{launcher} echo test' prints 'test'. \
                     Set remote.launcher in the config file to use a different launcher."
                ),
            ));
        }

        if !Self::status_of(&self.shell_check_command())
            .await
            .is_some_and(|s| s.success())
        {
            return Err(Error::setup(
                format!("conda was not found inside '{launcher}'."),
                "Install Miniconda inside the secondary environment and run 'conda init bash'.",
            ));
        }

        if !Self::status_of(&self.environment_check_command())
            .await
            .is_some_and(|s| s.success())
        {
            return Err(Error::setup(
                format!(
                    "The analysis environment could not be activated, or '{}' is not installed in it.",
                    self.config.program
                ),
                format!(
                    "Create the environment with 'conda create -n {}' and install sampledex in it, \
                     or point remote.env_path / remote.env_name in the config file at an existing one.",
                    self.config.env_name
                ),
            ));
        }

        Ok(())
    }

    /// Run the external reanalysis against `db_dir`, passing each output
    /// line to `on_line` as it arrives.
    pub async fn run(
        &self,
        db_dir: &Path,
        force: bool,
        mut on_line: impl FnMut(&str) + Send,
    ) -> Result<()> {
        let args = self.analysis_command(db_dir, force);
        let Some((program, rest)) = args.split_first() else {
            return Err(Error::Config("remote.launcher is empty".to_string()));
        };

        log::info!("Starting external analysis via {}", program);
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                Error::setup(
                    format!("Failed to start '{program}': {e}"),
                    "Check remote.launcher in the config file.",
                )
            })?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                on_line(&line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::setup(
                format!("External analysis failed ({status})."),
                format!(
                    "Review the output above. To reproduce, open the environment and run \
                     '{} reanalyze --engine external --db-path <database>'.",
                    self.config.program
                ),
            ));
        }

        log::info!("External analysis finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(launcher: &str, env_path: Option<&str>) -> RemoteLauncher {
        RemoteLauncher::new(RemoteConfig {
            launcher: launcher.to_string(),
            env_path: env_path.map(str::to_string),
            ..RemoteConfig::default()
        })
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/mnt/d/db"), "'/mnt/d/db'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_check_commands() {
        let remote = launcher("wsl", None);
        assert_eq!(remote.runtime_check_command(), vec!["wsl", "echo", "test"]);
        assert_eq!(remote.shell_check_command(), vec!["wsl", "bash", "-ic", "which conda"]);
        assert_eq!(
            remote.environment_check_command()[3],
            "conda activate 'env_wsl' && sampledex --version"
        );
    }

    #[test]
    fn test_analysis_command_translates_paths() {
        let remote = launcher("wsl", Some("D:\\envs\\sampledex"));
        let command = remote.analysis_command(Path::new("D:\\Libraries\\drums_db"), true);
        assert_eq!(&command[..3], &["wsl", "bash", "-ic"]);
        assert_eq!(
            command[3],
            "conda activate '/mnt/d/envs/sampledex' 2>/dev/null || conda activate 'env_wsl' \
             && sampledex reanalyze --engine external --db-path '/mnt/d/Libraries/drums_db' --force 2>&1"
        );
    }

    #[test]
    fn test_analysis_command_without_force() {
        let remote = launcher("wsl", None);
        let command = remote.analysis_command(Path::new("/home/u/sample_db"), false);
        assert!(command[3].ends_with("--db-path '/home/u/sample_db' 2>&1"));
        assert!(!command[3].contains("--force"));
    }

    #[tokio::test]
    async fn test_preflight_missing_launcher() {
        let remote = launcher("/nonexistent/launcher", None);
        let err = remote.preflight().await.unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
        assert!(err.to_string().contains("not available"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_preflight_failing_runtime() {
        let remote = launcher("false", None);
        let err = remote.preflight().await.unwrap_err();
        assert!(err.to_string().contains("wsl --install"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_streams_output() {
        // `echo` stands in for the launcher and prints the command it was given.
        let remote = launcher("echo", None);
        remote.preflight().await.unwrap();

        let mut lines = Vec::new();
        remote
            .run(Path::new("D:\\db"), false, |line| lines.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("reanalyze --engine external --db-path '/mnt/d/db'"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_is_setup_error() {
        let remote = launcher("false", None);
        let err = remote.run(Path::new("/db"), false, |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }
}
