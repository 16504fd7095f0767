use crate::error::Result;
use crate::readers::{DatasetReader, LoadedSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::info;

/// Paths of the three independently sourced datasets, in join order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePaths {
    pub source_a: PathBuf,
    pub source_b: PathBuf,
    pub source_c: PathBuf,
}

impl SourcePaths {
    pub fn new(source_a: PathBuf, source_b: PathBuf, source_c: PathBuf) -> Self {
        Self {
            source_a,
            source_b,
            source_c,
        }
    }
}

/// The three loaded sources. `c` takes precedence on column collisions when joined.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub a: LoadedSource,
    pub b: LoadedSource,
    pub c: LoadedSource,
}

pub struct ConcurrentReader {
    reader: DatasetReader,
}

impl ConcurrentReader {
    pub fn new(reader: DatasetReader) -> Self {
        Self { reader }
    }

    /// Read all three sources concurrently on the blocking pool
    pub async fn read_sources(&self, paths: &SourcePaths) -> Result<SourceSet> {
        let a_handle = self.spawn_read(&paths.source_a);
        let b_handle = self.spawn_read(&paths.source_b);
        let c_handle = self.spawn_read(&paths.source_c);

        let (a, b, c) = tokio::try_join!(a_handle, b_handle, c_handle)?;
        let set = SourceSet {
            a: a?,
            b: b?,
            c: c?,
        };

        info!(
            a_rows = set.a.table.len(),
            b_rows = set.b.table.len(),
            c_rows = set.c.table.len(),
            "Loaded sources"
        );

        Ok(set)
    }

    fn spawn_read(&self, path: &Path) -> JoinHandle<Result<LoadedSource>> {
        let reader = self.reader.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let name = source_name(&path);
            reader.read_source(&path, &name)
        })
    }
}

impl Default for ConcurrentReader {
    fn default() -> Self {
        Self::new(DatasetReader::new())
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_three_sources() -> Result<()> {
        let dir = TempDir::new()?;
        let write = |name: &str, column: &str| -> Result<PathBuf> {
            let path = dir.path().join(name);
            std::fs::write(
                &path,
                format!("lon,lat,date,{}\n-79.5,8.98,2025-01-15,1.0\n", column),
            )?;
            Ok(path)
        };
        let paths = SourcePaths::new(
            write("agera5.csv", "Cloud_Cover_Mean_24h")?,
            write("climate.csv", "relative_humidity")?,
            write("era5_land.csv", "surface_pressure")?,
        );

        let set = ConcurrentReader::default().read_sources(&paths).await?;

        assert_eq!(set.a.table.name, "agera5.csv");
        assert_eq!(set.b.table.columns, vec!["relative_humidity".to_string()]);
        assert_eq!(set.c.table.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let paths = SourcePaths::new(
            PathBuf::from("/nonexistent/a.csv"),
            PathBuf::from("/nonexistent/b.csv"),
            PathBuf::from("/nonexistent/c.csv"),
        );
        assert!(ConcurrentReader::default().read_sources(&paths).await.is_err());
    }
}
