//! Imported (and registered) multi-sub-swath SLCs described by tab files

use crate::io::params::ParamFile;
use crate::types::{DateRange, ResultExt, StackError, StackResult};
use chrono::{Duration, NaiveDate};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Move a file into `dir`, keeping its base name
pub fn relocate_file(path: &Path, dir: &Path) -> StackResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| StackError::InvalidFormat(format!("'{}' has no file name", path.display())))?;
    let target = dir.join(name);

    if target == path {
        return Ok(target);
    }

    fs::rename(path, &target).map_err(|source| StackError::Relocation {
        from: path.to_path_buf(),
        to: target.clone(),
        source,
    })?;

    Ok(target)
}

/// Data, parameter and TOPS parameter files of one sub-swath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSwathFiles {
    pub dat: PathBuf,
    pub par: PathBuf,
    pub tops_par: PathBuf,
}

impl SubSwathFiles {
    /// Derive `.par` and `.TOPS_par` names from the data file
    pub fn for_data(dat: PathBuf) -> Self {
        let par = PathBuf::from(format!("{}.par", dat.display()));
        let tops_par = PathBuf::from(format!("{}.TOPS_par", dat.display()));
        Self { dat, par, tops_par }
    }

    fn from_tab_line(line: &str) -> StackResult<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [dat, par, tops_par] => Ok(Self {
                dat: PathBuf::from(dat),
                par: PathBuf::from(par),
                tops_par: PathBuf::from(tops_par),
            }),
            _ => Err(StackError::InvalidFormat(format!(
                "tab line '{}' must contain data, parameter and TOPS parameter files",
                line
            ))),
        }
    }

    fn tab_line(&self) -> String {
        format!("{} {} {}\n", self.dat.display(), self.par.display(), self.tops_par.display())
    }

    pub fn exists(&self) -> bool {
        self.dat.is_file() && self.par.is_file() && self.tops_par.is_file()
    }

    /// Registered counterpart inside `dir` (`slc` becomes `rslc` in the name)
    fn registered_in(&self, dir: &Path) -> Self {
        let name = self
            .dat
            .file_name()
            .map(|n| n.to_string_lossy().replace("slc", "rslc"))
            .unwrap_or_else(|| "rslc".to_string());
        Self::for_data(dir.join(name))
    }

    fn relocate(&self, dir: &Path) -> StackResult<Self> {
        Ok(Self {
            dat: relocate_file(&self.dat, dir)?,
            par: relocate_file(&self.par, dir)?,
            tops_par: relocate_file(&self.tops_par, dir)?,
        })
    }
}

/// SLC made of up to three sub-swaths, listed in a tab file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSlc {
    tab: PathBuf,
    subswaths: Vec<SubSwathFiles>,
    date: DateRange,
}

impl ImportedSlc {
    /// Load an SLC from its tab file; the date comes from the first sub-swath's parameters
    pub fn from_tab<P: AsRef<Path>>(tab: P) -> StackResult<Self> {
        let tab = tab.as_ref();
        log::debug!("Parsing tabfile: '{}'", tab.display());

        let content = fs::read_to_string(tab)
            .with_context(|| format!("failed to read tab file '{}'", tab.display()))?;

        let subswaths = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(SubSwathFiles::from_tab_line)
            .collect::<StackResult<Vec<_>>>()?;

        let first = match subswaths.first() {
            Some(first) if subswaths.len() <= 3 => first,
            _ => {
                return Err(StackError::InvalidFormat(format!(
                    "tab file '{}' lists {} sub-swaths, expected 1 to 3",
                    tab.display(),
                    subswaths.len()
                )))
            }
        };

        let date = Self::read_date(&first.par)
            .with_context(|| format!("failed to read acquisition date of '{}'", tab.display()))?;

        Ok(Self {
            tab: tab.to_path_buf(),
            subswaths,
            date,
        })
    }

    /// Read `date`, `start_time` and `end_time` from an SLC parameter file
    pub fn read_date(par: &Path) -> StackResult<DateRange> {
        let params = ParamFile::from_file(par)?;

        let (year, month, day) = (
            params.int("date", 0)?,
            params.int("date", 1)?,
            params.int("date", 2)?,
        );

        let midnight = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| StackError::ParseValue {
                key: "date".to_string(),
                value: format!("{} {} {}", year, month, day),
                reason: "not a calendar date".to_string(),
            })?
            .and_utc();

        let seconds = |key: &str| -> StackResult<Duration> {
            let s = params.float(key, 0)?;
            Ok(Duration::microseconds((s * 1e6).round() as i64))
        };

        Ok(DateRange::new(midnight + seconds("start_time")?, midnight + seconds("end_time")?))
    }

    /// Create the tab file for the given sub-swaths
    pub fn create(tab: PathBuf, subswaths: Vec<SubSwathFiles>, date: DateRange) -> StackResult<Self> {
        let slc = Self { tab, subswaths, date };
        slc.write_tab()?;
        Ok(slc)
    }

    /// (Re)write the tab file listing the sub-swaths
    pub fn write_tab(&self) -> StackResult<()> {
        let mut file = fs::File::create(&self.tab)
            .with_context(|| format!("failed to create tab file '{}'", self.tab.display()))?;

        for iw in &self.subswaths {
            file.write_all(iw.tab_line().as_bytes())?;
        }

        Ok(())
    }

    pub fn tab(&self) -> &Path {
        &self.tab
    }

    pub fn subswaths(&self) -> &[SubSwathFiles] {
        &self.subswaths
    }

    pub fn date_range(&self) -> DateRange {
        self.date
    }

    /// Short date identifier used by the toolkit
    pub fn id(&self) -> String {
        self.date.short()
    }

    /// Whether all sub-swath files are present
    pub fn exists(&self) -> bool {
        self.subswaths.iter().all(SubSwathFiles::exists)
    }

    /// Registered SLC paths inside `dir`; nothing is written
    pub fn registered_in(&self, dir: &Path) -> Self {
        let name = self
            .tab
            .file_name()
            .map(|n| n.to_string_lossy().replace("SLC_tab", "RSLC_tab"))
            .unwrap_or_else(|| format!("{}.RSLC_tab", self.id()));

        Self {
            tab: dir.join(name),
            subswaths: self.subswaths.iter().map(|iw| iw.registered_in(dir)).collect(),
            date: self.date,
        }
    }

    /// Move every sub-swath into `dir` and write a new tab file there
    pub fn relocate(&self, dir: &Path) -> StackResult<Self> {
        fs::create_dir_all(dir)?;

        let subswaths = self
            .subswaths
            .iter()
            .map(|iw| iw.relocate(dir))
            .collect::<StackResult<Vec<_>>>()?;

        let moved = Self::create(relocate_target(&self.tab, dir), subswaths, self.date)?;

        if moved.tab != self.tab && self.tab.exists() {
            fs::remove_file(&self.tab)?;
        }

        Ok(moved)
    }
}

fn relocate_target(path: &Path, dir: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}
