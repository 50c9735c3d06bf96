//! Sentinel-1 SAFE products delivered as zip archives

use crate::args;
use crate::io::annotation::AnnotationParser;
use crate::io::command::CommandRunner;
use crate::io::slc::{ImportedSlc, SubSwathFiles};
use crate::types::{DateRange, ResultExt, StackError, StackResult, LONG_DATE_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// Number of IW sub-swaths in a TOPS product
pub const SUBSWATH_COUNT: usize = 3;

/// Shortest filename the positional grammar can be applied to
const MIN_FILENAME_LEN: usize = 67;

/// Kinds of per-sub-swath members inside a SAFE archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Measurement,
    Annotation,
    Calibration,
    Noise,
}

impl MemberKind {
    fn pattern(&self, mission: &str, iw: usize, pol: &str) -> String {
        let stem = format!(
            "{}-iw{}-slc-{}-",
            regex::escape(&mission.to_lowercase()),
            iw,
            regex::escape(&pol.to_lowercase())
        );

        match self {
            MemberKind::Measurement => format!(r"(^|/)measurement/{}[^/]*\.tiff$", stem),
            MemberKind::Annotation => format!(r"(^|/)annotation/{}[^/]*\.xml$", stem),
            MemberKind::Calibration => {
                format!(r"(^|/)annotation/calibration/calibration-{}[^/]*\.xml$", stem)
            }
            MemberKind::Noise => format!(r"(^|/)annotation/calibration/noise-{}[^/]*\.xml$", stem),
        }
    }
}

/// Identity of a raw Sentinel-1 product, parsed from its filename
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub path: PathBuf,
    pub mission: String,
    pub mode: String,
    pub product_type: String,
    pub resolution: String,
    pub level: String,
    pub product_class: String,
    pub polarization: String,
    pub absolute_orbit: String,
    pub data_take_id: String,
    pub unique_id: String,
    pub date: DateRange,
}

impl RawProduct {
    /// Parse product identity from the fixed-offset filename grammar
    pub fn from_path<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StackError::InvalidFormat(format!("no filename in '{}'", path.display())))?;

        if !name.is_ascii() || name.len() < MIN_FILENAME_LEN {
            return Err(StackError::InvalidFormat(format!(
                "'{}' is not a Sentinel-1 product filename",
                name
            )));
        }

        let start = Self::parse_time(&name[17..32])?;
        let stop = Self::parse_time(&name[33..48])?;

        Ok(Self {
            path: path.to_path_buf(),
            mission: name[0..3].to_string(),
            mode: name[4..6].to_string(),
            product_type: name[7..10].to_string(),
            resolution: name[10..11].to_string(),
            level: name[12..13].to_string(),
            product_class: name[13..14].to_string(),
            polarization: name[14..16].to_string(),
            absolute_orbit: name[49..55].to_string(),
            data_take_id: name[56..62].to_string(),
            unique_id: name[63..67].to_string(),
            date: DateRange::new(start, stop),
        })
    }

    fn parse_time(s: &str) -> StackResult<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(s, LONG_DATE_FORMAT)
            .map(|t| t.and_utc())
            .map_err(|e| StackError::InvalidFormat(format!("failed to parse date from string '{}': {}", s, e)))
    }

    pub fn short_date(&self) -> String {
        self.date.short()
    }

    pub fn open(&self) -> StackResult<SafeArchive> {
        SafeArchive::open(&self.path)
    }

    /// Extract the annotation of sub-swath `iw` into `dest` and check its header
    pub fn extract_annotation(&self, iw: usize, polarization: &str, dest: &Path) -> StackResult<PathBuf> {
        let mut archive = self.open()?;
        let member = archive.find_member(MemberKind::Annotation, &self.mission, iw, polarization)?;
        let annotation = archive.extract(&member, dest)?;

        AnnotationParser::verify(&annotation, iw, polarization)?;
        Ok(annotation)
    }

    /// Import all sub-swaths of the product as SLCs into `slc_dir`.
    ///
    /// An existing tab file for the same date and polarization is reused when
    /// its acquisition lies within this product; a tab imported from another
    /// slice of the same day is an error.
    pub fn import_slc(
        &self,
        runner: &CommandRunner,
        slc_dir: &Path,
        polarization: &str,
    ) -> StackResult<ImportedSlc> {
        let pol = polarization.to_lowercase();
        let date = self.short_date();
        let tab = slc_dir.join(format!("{}.{}.SLC_tab", date, pol));

        if tab.exists() {
            let existing = ImportedSlc::from_tab(&tab)?;
            let center = existing.date_range().center;

            if center < self.date.start || center > self.date.stop {
                return Err(StackError::Config(format!(
                    "'{}' was imported from another product of {}, not from '{}'",
                    tab.display(),
                    date,
                    self.path.display()
                )));
            }

            log::info!("SLC of {} already imported: {}", date, tab.display());
            return Ok(existing);
        }

        fs::create_dir_all(slc_dir)?;
        let mut archive = self.open()?;
        let mut subswaths = Vec::with_capacity(SUBSWATH_COUNT);

        for iw in 1..=SUBSWATH_COUNT {
            let scratch = TempDir::new()?;
            let mut member = |kind| -> StackResult<PathBuf> {
                let name = archive.find_member(kind, &self.mission, iw, &pol)?;
                archive.extract(&name, scratch.path())
            };

            let tiff = member(MemberKind::Measurement)?;
            let annotation = member(MemberKind::Annotation)?;
            let calibration = member(MemberKind::Calibration)?;
            let noise = member(MemberKind::Noise)?;

            AnnotationParser::verify(&annotation, iw, &pol)?;

            let dat = slc_dir.join(format!("{}.iw{}.{}.slc", date, iw, pol));
            let files = SubSwathFiles::for_data(dat);

            log::info!("Importing IW{} of {} into {}", iw, self.path.display(), files.dat.display());

            runner
                .call(
                    "par_S1_SLC",
                    &args![&tiff, &annotation, &calibration, &noise, &files.par, &files.dat, &files.tops_par],
                )
                .with_context(|| format!("failed to import IW{} of '{}'", iw, self.path.display()))?;

            subswaths.push(files);
        }

        ImportedSlc::create(tab, subswaths, self.date)
    }
}

/// Zip archive of a SAFE product
pub struct SafeArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl SafeArchive {
    pub fn open<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("failed to open product '{}'", path.display()))?;
        let archive = ZipArchive::new(file)
            .map_err(|e| StackError::Archive(format!("Failed to open ZIP '{}': {}", path.display(), e)))?;

        Ok(Self { path, archive })
    }

    /// List all member names in the archive
    pub fn list_files(&mut self) -> StackResult<Vec<String>> {
        let mut files = Vec::with_capacity(self.archive.len());

        for i in 0..self.archive.len() {
            let file = self
                .archive
                .by_index(i)
                .map_err(|e| StackError::Archive(format!("Failed to access file {}: {}", i, e)))?;
            files.push(file.name().to_string());
        }

        Ok(files)
    }

    /// Locate the member of the given kind for sub-swath `iw`
    pub fn find_member(
        &mut self,
        kind: MemberKind,
        mission: &str,
        iw: usize,
        polarization: &str,
    ) -> StackResult<String> {
        let pattern = kind.pattern(mission, iw, polarization);
        let regex = Regex::new(&pattern)
            .map_err(|e| StackError::Archive(format!("invalid member pattern '{}': {}", pattern, e)))?;

        self.list_files()?
            .into_iter()
            .find(|name| regex.is_match(name))
            .ok_or_else(|| {
                StackError::Archive(format!(
                    "no {:?} member for IW{} ({}) in '{}'",
                    kind,
                    iw,
                    polarization,
                    self.path.display()
                ))
            })
    }

    /// Copy a member into `dest`, keeping its base name
    pub fn extract(&mut self, member: &str, dest: &Path) -> StackResult<PathBuf> {
        let mut zip_file = self
            .archive
            .by_name(member)
            .map_err(|e| StackError::Archive(format!("Failed to access {}: {}", member, e)))?;

        let base = Path::new(member)
            .file_name()
            .ok_or_else(|| StackError::Archive(format!("member '{}' has no file name", member)))?;
        let target = dest.join(base);

        let mut out = File::create(&target)?;
        std::io::copy(&mut zip_file, &mut out)?;

        log::debug!("Extracted {} to {}", member, target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PRODUCT: &str = "S1A_IW_SLC__1SDV_20160702T163342_20160702T163409_011972_012763_24E2.zip";

    #[test]
    fn test_filename_grammar() {
        let product = RawProduct::from_path(Path::new("/data").join(PRODUCT)).unwrap();

        assert_eq!(product.mission, "S1A");
        assert_eq!(product.mode, "IW");
        assert_eq!(product.product_type, "SLC");
        assert_eq!(product.resolution, "_");
        assert_eq!(product.level, "1");
        assert_eq!(product.product_class, "S");
        assert_eq!(product.polarization, "DV");
        assert_eq!(product.absolute_orbit, "011972");
        assert_eq!(product.data_take_id, "012763");
        assert_eq!(product.unique_id, "24E2");
        assert_eq!(product.date.start, Utc.with_ymd_and_hms(2016, 7, 2, 16, 33, 42).unwrap());
        assert_eq!(product.short_date(), "20160702");
    }

    #[test]
    fn test_short_filename_rejected() {
        assert!(matches!(
            RawProduct::from_path("S1A_IW_SLC__1SDV_2016.zip"),
            Err(StackError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_bad_date_rejected() {
        let name = PRODUCT.replace("20160702T163342", "2016070XT163342");
        assert!(RawProduct::from_path(name).is_err());
    }

    #[test]
    fn test_member_patterns() {
        let annot = Regex::new(&MemberKind::Annotation.pattern("S1A", 2, "vv")).unwrap();
        let calib = Regex::new(&MemberKind::Calibration.pattern("S1A", 2, "vv")).unwrap();

        let name = "X.SAFE/annotation/s1a-iw2-slc-vv-20160702t163343-20160702t163408-011972-012763-005.xml";
        assert!(annot.is_match(name));
        assert!(!annot.is_match(&name.replace("iw2", "iw1")));
        assert!(!annot.is_match(&name.replace("annotation/", "annotation/calibration/calibration-")));
        assert!(calib.is_match(&name.replace("annotation/", "annotation/calibration/calibration-")));
    }
}
