//! The external model-runner boundary.
//!
//! The disaggregation model is an external black box: it reads a
//! uniform-cadence mains CSV, and writes one prediction file per requested
//! appliance. Only that I/O contract is modeled here; the trait seam keeps
//! the orchestrator testable without the real model installed.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::appliance::Appliance;

/// Abstraction over the appliance-disaggregation model.
///
/// `input` is the mains CSV written by the orchestrator (columns `time`,
/// `mains`). The runner returns one `(appliance, path)` pair per requested
/// appliance; each file carries a `preds` column in model-internal row
/// order, possibly with fewer rows than the input.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(
        &self,
        input: &Path,
        appliances: &[Appliance],
        sample_period: u32,
    ) -> io::Result<Vec<(Appliance, PathBuf)>>;
}

/// Runs the model as an external command, blocking until it exits.
///
/// The command is invoked as:
///
/// ```text
/// <program> --input <csv> --appliances <a,b,c> --sample-period <secs> --output-dir <dir>
/// ```
///
/// and is expected to leave `<dir>/<appliance_key>.csv` behind for every
/// requested appliance. No cancellation is exposed; a stuck invocation
/// blocks its device's slot until the process returns or is killed
/// externally.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    output_dir: PathBuf,
}

impl CommandRunner {
    /// Create a runner for `program`, collecting outputs under `output_dir`.
    pub fn new(program: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Where this runner expects the model to leave an appliance's output.
    pub fn output_path(&self, appliance: Appliance) -> PathBuf {
        self.output_dir.join(format!("{}.csv", appliance.key()))
    }

    fn appliance_arg(appliances: &[Appliance]) -> String {
        appliances
            .iter()
            .map(Appliance::label)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[async_trait]
impl ModelRunner for CommandRunner {
    async fn run(
        &self,
        input: &Path,
        appliances: &[Appliance],
        sample_period: u32,
    ) -> io::Result<Vec<(Appliance, PathBuf)>> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        info!(
            program = %self.program.display(),
            appliances = %Self::appliance_arg(appliances),
            "invoking disaggregation model"
        );

        let status = Command::new(&self.program)
            .arg("--input")
            .arg(input)
            .arg("--appliances")
            .arg(Self::appliance_arg(appliances))
            .arg("--sample-period")
            .arg(sample_period.to_string())
            .arg("--output-dir")
            .arg(&self.output_dir)
            .status()
            .await?;

        if !status.success() {
            return Err(io::Error::other(format!(
                "model runner exited with {status}"
            )));
        }

        Ok(appliances
            .iter()
            .map(|&a| (a, self.output_path(a)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_use_appliance_keys() {
        let runner = CommandRunner::new("/opt/nilm/run", "/tmp/nilm-out");
        assert_eq!(
            runner.output_path(Appliance::WashingMachine),
            PathBuf::from("/tmp/nilm-out/washing_machine.csv")
        );
    }

    #[test]
    fn test_appliance_arg_joins_labels() {
        let arg = CommandRunner::appliance_arg(&[
            Appliance::Fridge,
            Appliance::WashingMachine,
            Appliance::Kettle,
        ]);
        assert_eq!(arg, "fridge,washing machine,kettle");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new("/bin/false", dir.path());
        let result = runner
            .run(Path::new("/dev/null"), &[Appliance::Fridge], 5)
            .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_exit_reports_expected_paths() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new("/bin/true", dir.path());
        let outputs = runner
            .run(Path::new("/dev/null"), &[Appliance::Fridge, Appliance::Bulb], 5)
            .await
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, Appliance::Fridge);
        assert!(outputs[1].1.ends_with("bulb.csv"));
    }
}
