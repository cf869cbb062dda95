use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lamebatch_encoder::EncoderConfig;

use crate::conversion::{CellId, JobDescriptor, DEFAULT_PROGRESS_BATCH};

/// A conversion matrix: every file (row) crossed with its selected
/// encoder settings (columns).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Project {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub settings: Vec<SettingConfig>,

    #[serde(default)]
    pub files: Vec<FileEntry>,

    /// Directory relative paths are resolved against. Set by the loader.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Worker threads, i.e. conversions running at once (default: CPU count).
    #[serde(default = "default_max_parallel_jobs")]
    pub max_parallel_jobs: usize,

    /// Encoded blocks between two progress reports of one job (default: 100).
    #[serde(default = "default_progress_batch")]
    pub progress_batch: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: default_max_parallel_jobs(),
            progress_batch: default_progress_batch(),
        }
    }
}

impl EngineConfig {
    /// Size of the worker pool; never zero.
    pub fn worker_count(&self) -> usize {
        self.max_parallel_jobs.max(1)
    }
}

fn default_max_parallel_jobs() -> usize {
    num_cpus::get()
}

fn default_progress_batch() -> u64 {
    DEFAULT_PROGRESS_BATCH
}

/// One encoder setting (a matrix column).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingConfig {
    pub name: String,

    /// LAME command-line style options, e.g. `"-m j -V 2"`.
    #[serde(default)]
    pub options: String,

    /// Directory the MP3 files of this column are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Appended to the file name stub before `.mp3`.
    #[serde(default)]
    pub tag: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl SettingConfig {
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig::parse(&self.options)
    }
}

/// One input file (a matrix row).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,

    /// Setting names to convert with; all settings when omitted.
    #[serde(default)]
    pub select: Option<Vec<String>>,
}

impl FileEntry {
    pub fn selects(&self, setting: &str) -> bool {
        match &self.select {
            Some(names) => names.iter().any(|n| n == setting),
            None => true,
        }
    }
}

impl Project {
    /// Resolve `path` against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Selected cells in row-major order.
    pub fn cells(&self) -> Vec<CellId> {
        let mut cells = Vec::new();
        for (row, file) in self.files.iter().enumerate() {
            for (column, setting) in self.settings.iter().enumerate() {
                if file.selects(&setting.name) {
                    cells.push(CellId::new(row, column));
                }
            }
        }
        cells
    }

    /// Output path of one cell: `output_dir/<stub><tag>.mp3`.
    pub fn output_path(&self, cell: CellId) -> Option<PathBuf> {
        let file = self.files.get(cell.row)?;
        let setting = self.settings.get(cell.column)?;
        let name = format!("{}{}.mp3", file_stub(&file.path), setting.tag);
        Some(self.resolve(&setting.output_dir).join(name))
    }

    /// Build one job per selected cell.
    pub fn descriptors(&self) -> Vec<JobDescriptor> {
        let configs: Vec<EncoderConfig> =
            self.settings.iter().map(SettingConfig::encoder_config).collect();

        self.cells()
            .into_iter()
            .filter_map(|cell| {
                let output = self.output_path(cell)?;
                Some(JobDescriptor::new(
                    cell,
                    self.resolve(&self.files[cell.row].path),
                    output,
                    configs[cell.column].clone(),
                ))
            })
            .collect()
    }
}

/// File name up to its first `.`, skipping empty sections so that
/// `.hidden.wav` yields `hidden`.
pub fn file_stub(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('.')
        .find(|section| !section.is_empty())
        .unwrap_or("output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stub() {
        assert_eq!(file_stub(Path::new("/music/track01.wav")), "track01");
        assert_eq!(file_stub(Path::new("take.2.final.wav")), "take");
        assert_eq!(file_stub(Path::new(".hidden.wav")), "hidden");
        assert_eq!(file_stub(Path::new("noext")), "noext");
        assert_eq!(file_stub(Path::new("..")), "output");
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_parallel_jobs, num_cpus::get());
        assert_eq!(engine.progress_batch, 100);

        let zero = EngineConfig {
            max_parallel_jobs: 0,
            ..engine
        };
        assert_eq!(zero.worker_count(), 1);
    }

    #[test]
    fn test_selection() {
        let all = FileEntry {
            path: "a.wav".into(),
            select: None,
        };
        let some = FileEntry {
            path: "b.wav".into(),
            select: Some(vec!["v2".into()]),
        };
        assert!(all.selects("anything"));
        assert!(some.selects("v2"));
        assert!(!some.selects("cbr"));
    }
}
