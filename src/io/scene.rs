//! Scene catalog: raw zip products and already imported SLCs behind one type

use crate::io::safe::RawProduct;
use crate::io::slc::ImportedSlc;
use crate::types::{DateRange, StackResult};
use std::fs;
use std::path::{Path, PathBuf};

/// One acquisition, either still packed or already imported
#[derive(Debug, Clone, PartialEq)]
pub enum Scene {
    RawProduct(RawProduct),
    ImportedSlc(ImportedSlc),
}

impl Scene {
    /// Zip files are raw products, anything else is read as a tab file
    pub fn from_path<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref();
        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        if is_zip {
            RawProduct::from_path(path).map(Scene::RawProduct)
        } else {
            ImportedSlc::from_tab(path).map(Scene::ImportedSlc)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Scene::RawProduct(p) => &p.path,
            Scene::ImportedSlc(s) => s.tab(),
        }
    }

    pub fn date_range(&self) -> DateRange {
        match self {
            Scene::RawProduct(p) => p.date,
            Scene::ImportedSlc(s) => s.date_range(),
        }
    }

    /// `YYYYMMDD` of the acquisition center
    pub fn short_date(&self) -> String {
        self.date_range().short()
    }
}

/// Ordered collection of scenes to select from
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scenes: Vec<Scene>,
}

impl Catalog {
    /// Collect every `*.zip` product in a directory
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> StackResult<Self> {
        let dir = dir.as_ref();
        let mut zips: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("zip"))
                    .unwrap_or(false)
            })
            .collect();
        zips.sort();

        log::info!("Found {} zip products in {}", zips.len(), dir.display());
        Ok(Self::from_paths(zips))
    }

    /// Parse scenes from explicit paths; unparsable entries are skipped
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let scenes = paths
            .into_iter()
            .filter_map(|path| match Scene::from_path(path.as_ref()) {
                Ok(scene) => Some(scene),
                Err(e) => {
                    log::warn!("Skipping '{}': {}", path.as_ref().display(), e);
                    None
                }
            })
            .collect();

        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        self.scenes
    }
}

impl From<Vec<Scene>> for Catalog {
    fn from(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_from_dir_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        for name in [
            "S1A_IW_SLC__1SDV_20160714T163343_20160714T163410_012147_012D31_5A1C.zip",
            "S1A_IW_SLC__1SDV_20160702T163342_20160702T163409_011972_012763_24E2.zip",
            "notes.zip",
            "readme.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let catalog = Catalog::from_dir(dir.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.scenes()[0].short_date(), "20160702");
        assert!(matches!(catalog.scenes()[1], Scene::RawProduct(_)));
    }
}
