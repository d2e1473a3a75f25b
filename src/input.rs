use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Collects the input files for one run: either the single file at `input`,
/// or every file under the directory (recursively) whose name ends with
/// `extension`. The list is sorted so that a re-run visits files in the same
/// order and produces the same chunk layout.
pub fn collect_files(input: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(input)
        .with_context(|| format!("Failed to open input location: {:?}", input))?;

    let mut files = Vec::new();
    if metadata.is_file() {
        files.push(input.to_path_buf());
    } else {
        walk(input, extension, &mut files)?;
        files.sort();
    }

    if files.is_empty() {
        bail!("No {} files found under: {:?}", extension, input);
    }

    debug!(count = files.len(), input = ?input, "Input files collected");
    Ok(files)
}

fn walk(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in: {:?}", dir))?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, extension, files)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(extension))
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "x").unwrap();
    }

    #[test]
    fn directory_is_filtered_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.ndjson"));
        touch(&dir.path().join("a.ndjson"));
        touch(&dir.path().join("ignored.txt"));

        let files = collect_files(dir.path(), ".ndjson").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.ndjson", "b.ndjson"]);
    }

    #[test]
    fn nested_directories_are_walked() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("part/inner")).unwrap();
        touch(&dir.path().join("part/inner/c.json"));
        touch(&dir.path().join("d.json"));

        let files = collect_files(dir.path(), ".json").unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn single_file_is_returned_as_is() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.csv");
        touch(&path);

        let files = collect_files(&path, ".csv").unwrap();
        assert_eq!(files, vec![path]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(collect_files(dir.path(), ".ndjson").is_err());
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(collect_files(Path::new("/nonexistent/input"), ".ndjson").is_err());
    }
}
