//! Zip intake and output.
//! A source may be a folder or a `.zip` of one; translated folders can be packed back up.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Extract a `.zip` archive into `dest`, creating it if needed.
/// `.rar` and every other extension are rejected.
pub fn extract_archive(path: &Path, dest: &Path) -> Result<()> {
    match extension(path).as_str() {
        "zip" => {
            fs::create_dir_all(dest)?;
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let mut archive = ZipArchive::new(file)?;
            archive.extract(dest)?;
            debug!("extracted {} entries from {}", archive.len(), path.display());
            Ok(())
        }
        "rar" => bail!("RAR archives are not supported; repack {} as .zip", path.display()),
        _ => bail!("unsupported archive format: {} (use .zip)", path.display()),
    }
}

/// Pack every file under `folder` into `out_zip`, with paths relative to `folder`.
pub fn make_zip(folder: &Path, out_zip: &Path) -> Result<()> {
    if let Some(parent) = out_zip.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(out_zip).with_context(|| format!("creating {}", out_zip.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    let mut count = 0;
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(folder)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        let mut src = File::open(entry.path())?;
        io::copy(&mut src, &mut zip)?;
        count += 1;
    }
    zip.finish()?.flush()?;
    info!("packed {count} file(s) into {}", out_zip.display());
    Ok(())
}

/// A source folder, either given directly or extracted from an archive.
/// An extracted folder lives as long as the value.
pub struct Intake {
    root: PathBuf,
    _extracted: Option<TempDir>,
}

impl Intake {
    /// Use `path` directly when it is a folder, otherwise extract it.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self {
                root: path.to_path_buf(),
                _extracted: None,
            });
        }
        if !path.exists() {
            bail!("source not found: {}", path.display());
        }
        let dir = tempfile::tempdir()?;
        extract_archive(path, dir.path())?;
        Ok(Self {
            root: dir.path().to_path_buf(),
            _extracted: Some(dir),
        })
    }

    /// Folder to search for subtitle files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::find_srt_files;
    use tempfile::tempdir;

    #[test]
    fn packs_and_extracts_nested_folders() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("out");
        fs::create_dir_all(folder.join("Thai")).unwrap();
        fs::write(folder.join("Thai/ep1_THAI.srt"), "1\n").unwrap();
        fs::write(folder.join("notes.txt"), "x").unwrap();

        let zip_path = dir.path().join("packed/out.zip");
        make_zip(&folder, &zip_path).unwrap();
        assert!(zip_path.exists());

        let dest = dir.path().join("unpacked");
        extract_archive(&zip_path, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("Thai/ep1_THAI.srt")).unwrap(), "1\n");
        assert_eq!(fs::read_to_string(dest.join("notes.txt")).unwrap(), "x");
    }

    #[test]
    fn rejects_rar_and_unknown_formats() {
        let dir = tempdir().unwrap();
        let rar = dir.path().join("subs.rar");
        fs::write(&rar, b"Rar!").unwrap();
        let err = extract_archive(&rar, dir.path()).unwrap_err();
        assert!(err.to_string().contains("RAR"));

        let tar = dir.path().join("subs.tar");
        fs::write(&tar, b"").unwrap();
        assert!(extract_archive(&tar, dir.path()).is_err());
        assert!(Intake::open(&tar).is_err());
        assert!(Intake::open(&dir.path().join("missing.zip")).is_err());
    }

    #[test]
    fn intake_accepts_folders_and_zips() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("src");
        fs::create_dir_all(folder.join("season1")).unwrap();
        fs::write(folder.join("season1/ep1_EN.srt"), "1\n").unwrap();

        let direct = Intake::open(&folder).unwrap();
        assert_eq!(direct.root(), folder.as_path());

        let zip_path = dir.path().join("src.ZIP");
        make_zip(&folder, &zip_path).unwrap();
        let intake = Intake::open(&zip_path).unwrap();
        let files = find_srt_files(intake.root()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("season1/ep1_EN.srt"));

        let root = intake.root().to_path_buf();
        drop(intake);
        assert!(!root.exists());
    }
}
