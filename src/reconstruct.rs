use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::ReconstructionSettings;
use crate::domain::GenomeId;
use crate::error::SpireError;

/// Builds a metabolic model from one genome file.
pub trait Reconstructor: Send + Sync {
    fn reconstruct(&self, genome: &GenomeId, input: &Path, output: &Path)
    -> Result<(), SpireError>;
}

/// CarveMe (`carve`) invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct CarveReconstructor {
    program: Option<PathBuf>,
    command: String,
    medium: String,
    gapfill: String,
}

impl CarveReconstructor {
    pub fn new(settings: &ReconstructionSettings) -> Self {
        Self {
            program: find_program(&settings.command),
            command: settings.command.clone(),
            medium: settings.medium.clone(),
            gapfill: settings.gapfill.clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "--dna".to_string(),
            input.to_string_lossy().to_string(),
            "--output".to_string(),
            output.to_string_lossy().to_string(),
            "-i".to_string(),
            self.medium.clone(),
            "-g".to_string(),
            self.gapfill.clone(),
            "-v".to_string(),
        ]
    }
}

impl Reconstructor for CarveReconstructor {
    fn reconstruct(
        &self,
        genome: &GenomeId,
        input: &Path,
        output: &Path,
    ) -> Result<(), SpireError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| SpireError::MissingTool(self.command.clone()))?;
        let args = self.args(input, output);
        debug!(program = %program.display(), ?args, "running reconstruction");
        let result = Command::new(program)
            .args(&args)
            .output()
            .map_err(|err| SpireError::Reconstruction {
                genome: genome.to_string(),
                message: err.to_string(),
            })?;
        if result.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", self.command, result.status)
        } else {
            stderr
        };
        Err(SpireError::Reconstruction {
            genome: genome.to_string(),
            message,
        })
    }
}

fn find_program(command: &str) -> Option<PathBuf> {
    let direct = Path::new(command);
    if direct.components().count() > 1 {
        return direct.exists().then(|| direct.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{command}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(command);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
