use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DESCRIPTION_FILE: &str = "description.bin";
pub const VOICE_LABEL_FILE: &str = "voice-label.wav";
pub const SOURCE_IMAGE_FILE: &str = "image.png";

/// Directory layout of the catalog: one sub-directory per description id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLayout {
    root: PathBuf,
}

impl CatalogLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    pub fn description_path(&self, id: &str) -> PathBuf {
        self.entry_dir(id).join(DESCRIPTION_FILE)
    }

    pub fn voice_label_path(&self, id: &str) -> PathBuf {
        self.entry_dir(id).join(VOICE_LABEL_FILE)
    }

    pub fn source_image_path(&self, id: &str) -> PathBuf {
        self.entry_dir(id).join(SOURCE_IMAGE_FILE)
    }

    pub fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn ensure_entry_dir(&self, id: &str) -> io::Result<PathBuf> {
        let dir = self.entry_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn remove_entry_dir(&self, id: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.entry_dir(id)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Entry directories in lexical order. A missing root has no entries.
    pub fn entry_dirs(&self) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn paths_live_under_the_entry_dir() {
        let layout = CatalogLayout::new("/data");
        assert_eq!(layout.entry_dir("abc"), PathBuf::from("/data/abc"));
        assert_eq!(
            layout.description_path("abc"),
            PathBuf::from("/data/abc/description.bin")
        );
        assert_eq!(
            layout.voice_label_path("abc"),
            PathBuf::from("/data/abc/voice-label.wav")
        );
        assert_eq!(layout.source_image_path("abc"), PathBuf::from("/data/abc/image.png"));
    }

    #[test]
    fn entry_dirs_skip_files() {
        let dir = tempdir().unwrap();
        let layout = CatalogLayout::new(dir.path());
        layout.ensure_entry_dir("b").unwrap();
        layout.ensure_entry_dir("a").unwrap();
        fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        let dirs = layout.entry_dirs().unwrap();
        assert_eq!(dirs, vec![dir.path().join("a"), dir.path().join("b")]);

        layout.remove_entry_dir("a").unwrap();
        layout.remove_entry_dir("a").unwrap();
        assert_eq!(layout.entry_dirs().unwrap().len(), 1);
    }

    #[test]
    fn missing_root_has_no_entries() {
        let dir = tempdir().unwrap();
        let layout = CatalogLayout::new(dir.path().join("absent"));
        assert!(layout.entry_dirs().unwrap().is_empty());
    }
}
