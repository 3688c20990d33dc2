//! Locating source subtitle files and their translated counterparts.

use crate::translate::output_file_name;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

fn is_srt(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("srt"))
        .unwrap_or(false)
}

/// Recursively collect `.srt` files under `root`, sorted by path.
pub fn find_srt_files(root: &Path) -> Result<Vec<PathBuf>> {
    trace!("find_srt_files root={}", root.display());
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && is_srt(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Pair each source file with where its `language` translation is written.
pub fn find_pairs(
    sources: &[PathBuf],
    output_dir: &Path,
    language: &str,
) -> Vec<(PathBuf, PathBuf)> {
    sources
        .iter()
        .map(|src| {
            let name = src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let candidate = output_dir.join(language).join(output_file_name(&name, language));
            (src.clone(), candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_nested_srt_files_case_insensitively() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("season1")).unwrap();
        fs::write(dir.path().join("b.srt"), "").unwrap();
        fs::write(dir.path().join("season1").join("a.SRT"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_srt_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("b.srt"), dir.path().join("season1").join("a.SRT")]
        );
    }

    #[test]
    fn pairs_with_translated_names() {
        let pairs = find_pairs(&[PathBuf::from("in/ep1_EN.srt")], Path::new("out"), "Thai");
        assert_eq!(
            pairs,
            vec![(PathBuf::from("in/ep1_EN.srt"), PathBuf::from("out/Thai/ep1_THAI.srt"))]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(find_srt_files(&dir.path().join("nope")).is_err());
    }
}
