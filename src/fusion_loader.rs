//! Loading of a fixed/moving pair with progress reporting.

use crate::engine::FusionEngine;
use crate::error::FusionError;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Receives progress of a [`FusionLoader`].
pub trait LoadProgress: Send + Sync {
    /// Called with a short message and a percentage in `0..=100`.
    fn on_progress(&self, message: &str, percent: u8);

    /// Called once when loading fails. The error is returned to the caller as well.
    fn on_error(&self, _error: &FusionError) {}
}

/// Reports progress through `tracing`.
pub struct LogProgress;

impl LoadProgress for LogProgress {
    fn on_progress(&self, message: &str, percent: u8) {
        info!(percent, "{message}");
    }

    fn on_error(&self, err: &FusionError) {
        error!(%err, "Error loading images");
    }
}

/// Ignores all progress.
pub struct NoProgress;

impl LoadProgress for NoProgress {
    fn on_progress(&self, _message: &str, _percent: u8) {}
}

/// Loads the fixed series, then the moving series, into a fresh engine.
#[derive(Clone, Debug)]
pub struct FusionLoader {
    fixed_dir: PathBuf,
    moving_dir: PathBuf,
}

impl FusionLoader {
    pub fn new(fixed_dir: impl Into<PathBuf>, moving_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixed_dir: fixed_dir.into(),
            moving_dir: moving_dir.into(),
        }
    }

    /// Use the directory holding `selected_files` as the moving series.
    ///
    /// # Errors
    ///
    /// Fails when nothing is selected or the files span several directories.
    pub fn from_selection(
        fixed_dir: impl Into<PathBuf>,
        selected_files: &[impl AsRef<Path>],
    ) -> Result<Self, FusionError> {
        let dirs: BTreeSet<PathBuf> = selected_files
            .iter()
            .map(|file| {
                file.as_ref()
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default()
            })
            .collect();
        let mut dirs = dirs.into_iter();
        match (dirs.next(), dirs.next()) {
            (Some(moving_dir), None) => Ok(Self::new(fixed_dir, moving_dir)),
            (None, _) => Err(FusionError::EmptySelection),
            (Some(first), Some(second)) => {
                let mut all = vec![first, second];
                all.extend(dirs);
                Err(FusionError::MixedDirectories(all))
            }
        }
    }

    pub fn fixed_dir(&self) -> &Path {
        &self.fixed_dir
    }

    pub fn moving_dir(&self) -> &Path {
        &self.moving_dir
    }

    pub fn load(&self, progress: &dyn LoadProgress) -> Result<FusionEngine, FusionError> {
        self.load_into(FusionEngine::new(), progress)
    }

    /// Load into an existing engine, keeping its display settings and observers.
    pub fn load_into(
        &self,
        mut engine: FusionEngine,
        progress: &dyn LoadProgress,
    ) -> Result<FusionEngine, FusionError> {
        match self.load_steps(&mut engine, progress) {
            Ok(()) => {
                progress.on_progress("Done", 100);
                Ok(engine)
            }
            Err(err) => {
                progress.on_error(&err);
                Err(err)
            }
        }
    }

    fn load_steps(
        &self,
        engine: &mut FusionEngine,
        progress: &dyn LoadProgress,
    ) -> Result<(), FusionError> {
        progress.on_progress("Loading fixed image", 10);
        engine.load_fixed(&self.fixed_dir)?;
        progress.on_progress("Loading overlay image", 50);
        engine.load_moving(&self.moving_dir)?;
        progress.on_progress("Finalising", 90);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::VolumeRole;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        steps: Mutex<Vec<(String, u8)>>,
        errors: Mutex<usize>,
    }

    impl LoadProgress for Recorder {
        fn on_progress(&self, message: &str, percent: u8) {
            self.steps.lock().unwrap().push((message.to_owned(), percent));
        }

        fn on_error(&self, _error: &FusionError) {
            *self.errors.lock().unwrap() += 1;
        }
    }

    #[test]
    fn selection_must_share_a_directory() {
        let loader = FusionLoader::from_selection("fixed", &["ct/a.dcm", "ct/b.dcm"])
            .expect("one directory");
        assert_eq!(loader.moving_dir(), Path::new("ct"));

        let err = FusionLoader::from_selection("fixed", &["ct/a.dcm", "pet/b.dcm"])
            .expect_err("two directories");
        assert!(matches!(err, FusionError::MixedDirectories(ref dirs) if dirs.len() == 2));

        let none: [&str; 0] = [];
        assert!(matches!(
            FusionLoader::from_selection("fixed", &none),
            Err(FusionError::EmptySelection)
        ));
    }

    #[test]
    fn failed_fixed_load_stops_early() {
        let recorder = Recorder::default();
        let loader = FusionLoader::new("/nonexistent/fixed", "/nonexistent/moving");
        let err = loader.load(&recorder).err().expect("fixed directory is missing");

        assert_eq!(err.role(), Some(VolumeRole::Fixed));
        assert_eq!(
            *recorder.steps.lock().unwrap(),
            vec![("Loading fixed image".to_owned(), 10)]
        );
        assert_eq!(*recorder.errors.lock().unwrap(), 1);
    }
}
