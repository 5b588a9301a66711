use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CrowdError, Result};

/// One recorded scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarPoint {
    pub name: String,
    pub step: usize,
    pub value: f64,
}

/// Experiments persisted as `{root}/{name}.jsonl`, one [`ScalarPoint`] per
/// line.
#[derive(Debug, Clone)]
pub struct ExperimentStore {
    root: PathBuf,
}

impl ExperimentStore {
    pub fn new(root: &Path) -> Result<ExperimentStore> {
        fs::create_dir_all(root).map_err(|e| CrowdError::io(root, e))?;
        Ok(ExperimentStore { root: root.to_path_buf() })
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", name))
    }

    /// Sorted experiment names.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| CrowdError::io(&self.root, e))? {
            let path = entry.map_err(|e| CrowdError::io(&self.root, e))?.path();
            if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn remove_all(&self) -> Result<()> {
        for name in self.list()? {
            let path = self.path_of(&name);
            fs::remove_file(&path).map_err(|e| CrowdError::io(&path, e))?;
        }
        Ok(())
    }

    /// Starts a new, empty experiment. Fails if `name` already exists.
    pub fn create(&self, name: &str) -> Result<ExperimentWriter> {
        check_name(name)?;
        let path = self.path_of(name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    CrowdError::Telemetry(format!("experiment '{}' already exists", name))
                }
                _ => CrowdError::io(&path, e),
            })?;
        Ok(ExperimentWriter { path, out: BufWriter::new(file) })
    }

    /// Reopens an existing experiment for appending.
    pub fn open(&self, name: &str) -> Result<ExperimentWriter> {
        check_name(name)?;
        let path = self.path_of(name);
        if !path.is_file() {
            return Err(CrowdError::Telemetry(format!("experiment '{}' does not exist", name)));
        }
        let file = OpenOptions::new().append(true).open(&path).map_err(|e| CrowdError::io(&path, e))?;
        Ok(ExperimentWriter { path, out: BufWriter::new(file) })
    }

    pub fn load(&self, name: &str) -> Result<Vec<ScalarPoint>> {
        check_name(name)?;
        let path = self.path_of(name);
        let file = File::open(&path).map_err(|e| CrowdError::io(&path, e))?;
        let mut points = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| CrowdError::io(&path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            points.push(serde_json::from_str(&line)?);
        }
        Ok(points)
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, Vec<ScalarPoint>>> {
        self.list()?
            .into_iter()
            .map(|name| {
                let points = self.load(&name)?;
                Ok((name, points))
            })
            .collect()
    }
}

/// Append handle for one experiment. Every point is flushed immediately.
#[derive(Debug)]
pub struct ExperimentWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ExperimentWriter {
    pub fn append(&mut self, point: &ScalarPoint) -> Result<()> {
        serde_json::to_writer(&mut self.out, point)?;
        self.out.write_all(b"\n").map_err(|e| CrowdError::io(&self.path, e))?;
        self.out.flush().map_err(|e| CrowdError::io(&self.path, e))
    }
}

/// Groups points by scalar name as `[step, value]` pairs.
pub fn series(points: &[ScalarPoint]) -> BTreeMap<&str, Vec<(usize, f64)>> {
    let mut out: BTreeMap<&str, Vec<(usize, f64)>> = BTreeMap::new();
    for p in points {
        out.entry(p.name.as_str()).or_default().push((p.step, p.value));
    }
    out
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(CrowdError::Telemetry(format!("invalid experiment name '{}'", name)));
    }
    Ok(())
}
