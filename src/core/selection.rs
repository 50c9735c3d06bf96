//! Scene selection against an AOI, a date window and a master burst grid

use crate::core::burst_grid::{BurstGridExtractor, SceneBurstGrid};
use crate::core::geometry::{aoi_contained, burst_alignment_distance, burst_counts_match, is_aligned};
use crate::io::command::CommandRunner;
use crate::io::scene::Scene;
use crate::types::{Aoi, DateRange, StackError, StackResult, SHORT_DATE_FORMAT};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Token requesting automatic master selection
pub const AUTO_MASTER: &str = "auto";

/// How the master scene is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterSelector {
    /// Chronologically earliest surviving scene
    Auto,
    /// Scene whose `YYYYMMDD` date equals the string
    Date(String),
}

impl FromStr for MasterSelector {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == AUTO_MASTER {
            return Ok(MasterSelector::Auto);
        }

        NaiveDate::parse_from_str(s, SHORT_DATE_FORMAT).map_err(|e| {
            StackError::Config(format!("master date '{}' is neither 'auto' nor YYYYMMDD: {}", s, e))
        })?;
        Ok(MasterSelector::Date(s.to_string()))
    }
}

impl fmt::Display for MasterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterSelector::Auto => f.write_str(AUTO_MASTER),
            MasterSelector::Date(d) => f.write_str(d),
        }
    }
}

/// Acquisition window; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateFilter {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl DateFilter {
    pub fn new(after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> StackResult<Self> {
        if let (Some(a), Some(b)) = (after, before) {
            if a >= b {
                return Err(StackError::Config(format!(
                    "date window is empty: start {} is not before stop {}",
                    a, b
                )));
            }
        }
        Ok(Self { after, before })
    }

    /// Bounds given as `YYYYMMDD`, each meaning midnight UTC of that day
    pub fn from_short_dates(start: Option<&str>, stop: Option<&str>) -> StackResult<Self> {
        let parse = |s: &str| -> StackResult<DateTime<Utc>> {
            NaiveDate::parse_from_str(s.trim(), SHORT_DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc())
                .ok_or_else(|| StackError::Config(format!("malformed date bound '{}', expected YYYYMMDD", s)))
        };

        Self::new(start.map(parse).transpose()?, stop.map(parse).transpose()?)
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    /// Start strictly after the lower bound and stop strictly before the upper bound
    pub fn accepts(&self, range: &DateRange) -> bool {
        self.after.map_or(true, |after| range.start > after)
            && self.before.map_or(true, |before| range.stop < before)
    }
}

/// Why a scene was left out of the selection
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    ExtractionFailed(String),
    OutsideAoi,
    OutsideDateRange,
    BurstCountMismatch,
    Misaligned { distance: f64 },
    /// Another scene of the same day was accepted first
    SameDate { kept: PathBuf },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::ExtractionFailed(e) => write!(f, "burst grid extraction failed: {}", e),
            RejectionReason::OutsideAoi => f.write_str("AOI is not covered by the sub-swath footprints"),
            RejectionReason::OutsideDateRange => f.write_str("acquisition is outside the date window"),
            RejectionReason::BurstCountMismatch => {
                f.write_str("does not have same number of bursts in every IW as the master")
            }
            RejectionReason::Misaligned { distance } => {
                write!(f, "burst grid is offset from the master by {:.4}", distance)
            }
            RejectionReason::SameDate { kept } => {
                write!(f, "a scene of the same day is already selected: '{}'", kept.display())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub scene: PathBuf,
    pub reason: RejectionReason,
}

/// Scene together with its cached burst grid
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub scene: Scene,
    pub grid: SceneBurstGrid,
}

/// Outcome of a selection run
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Accepted scenes in chronological order, master included
    pub accepted: Vec<Candidate>,
    /// Index of the master in `accepted`; `None` when nothing survived
    pub master_index: Option<usize>,
    pub rejected: Vec<Rejection>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn master(&self) -> Option<&Candidate> {
        self.master_index.and_then(|i| self.accepted.get(i))
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.accepted.iter().map(|c| &c.scene)
    }

    /// Persistable form of the selection
    pub fn to_record(&self) -> Option<SelectionRecord> {
        let master = self.master()?;
        Some(SelectionRecord {
            master_date: master.scene.short_date(),
            master_index: self.master_index?,
            scenes: self.scenes().map(|s| s.path().to_path_buf()).collect(),
        })
    }

    fn reject(&mut self, scene: &Scene, reason: RejectionReason) {
        log::info!("Rejecting '{}': {}", scene.path().display(), reason);
        self.rejected.push(Rejection {
            scene: scene.path().to_path_buf(),
            reason,
        });
    }
}

/// Selection result as written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub master_date: String,
    pub master_index: usize,
    pub scenes: Vec<PathBuf>,
}

impl SelectionRecord {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StackResult<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;

        log::info!("Selection of {} scenes written to {}", self.scenes.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let record: Self = serde_json::from_reader(reader)?;

        if record.master_index >= record.scenes.len() {
            return Err(StackError::Config(format!(
                "master index {} is out of range for {} scenes",
                record.master_index,
                record.scenes.len()
            )));
        }

        Ok(record)
    }
}

/// Filters a catalog down to the scenes compatible with the master
pub struct SelectionPipeline<'a> {
    extractor: BurstGridExtractor<'a>,
    polarization: String,
    workers: usize,
}

impl<'a> SelectionPipeline<'a> {
    pub fn new(runner: &'a CommandRunner, polarization: &str, workers: usize) -> Self {
        Self {
            extractor: BurstGridExtractor::new(runner),
            polarization: polarization.to_lowercase(),
            workers: workers.max(1),
        }
    }

    /// Run the selection.
    ///
    /// Scenes whose burst grid cannot be extracted are dropped with a logged
    /// reason. An explicit master date matching none of the surviving scenes
    /// is a configuration error. Only the earliest accepted scene of a day is
    /// kept, since imported SLCs are named by date.
    pub fn select(
        &self,
        catalog: Vec<Scene>,
        aoi: &Aoi,
        dates: Option<&DateFilter>,
        master: &MasterSelector,
    ) -> StackResult<Selection> {
        let mut selection = Selection::default();
        let total = catalog.len();
        let mut survivors = Vec::with_capacity(total);

        for (scene, grid) in self.extract_grids(catalog)? {
            let grid = match grid {
                Ok(grid) => grid,
                Err(e) => {
                    log::warn!("Failed to extract burst grid of '{}': {}", scene.path().display(), e);
                    selection.reject(&scene, RejectionReason::ExtractionFailed(e.to_string()));
                    continue;
                }
            };

            if !aoi_contained(aoi, &grid) {
                selection.reject(&scene, RejectionReason::OutsideAoi);
                continue;
            }

            if let Some(filter) = dates {
                if !filter.accepts(&scene.date_range()) {
                    selection.reject(&scene, RejectionReason::OutsideDateRange);
                    continue;
                }
            }

            survivors.push(Candidate { scene, grid });
        }

        log::info!("{} of {} scenes cover the AOI and date window", survivors.len(), total);

        if survivors.is_empty() {
            if let MasterSelector::Date(date) = master {
                return Err(StackError::Config(format!(
                    "no scene left after filtering to match the master date '{}'",
                    date
                )));
            }
            log::warn!("No scenes left after AOI and date filtering");
            return Ok(selection);
        }

        survivors.sort_by_key(|c| c.scene.date_range().center);

        let master_pos = match master {
            MasterSelector::Auto => 0,
            MasterSelector::Date(date) => survivors
                .iter()
                .position(|c| c.scene.short_date() == *date)
                .ok_or_else(|| {
                    StackError::Config(format!("no scene matches the master date '{}'", date))
                })?,
        };

        let master_grid = survivors[master_pos].grid;
        log::info!(
            "Master scene: {} ({})",
            survivors[master_pos].scene.short_date(),
            survivors[master_pos].scene.path().display()
        );

        let mut dates: HashMap<String, PathBuf> = HashMap::new();

        for (pos, candidate) in survivors.into_iter().enumerate() {
            if !burst_counts_match(&master_grid, &candidate.grid) {
                selection.reject(&candidate.scene, RejectionReason::BurstCountMismatch);
                continue;
            }

            let distance = burst_alignment_distance(&master_grid, &candidate.grid)?;
            if !is_aligned(distance) {
                selection.reject(&candidate.scene, RejectionReason::Misaligned { distance });
                continue;
            }

            let date = candidate.scene.short_date();
            if let Some(kept) = dates.get(&date) {
                let kept = kept.clone();
                selection.reject(&candidate.scene, RejectionReason::SameDate { kept });
                continue;
            }
            dates.insert(date, candidate.scene.path().to_path_buf());

            if pos == master_pos {
                selection.master_index = Some(selection.accepted.len());
            }
            selection.accepted.push(candidate);
        }

        log::info!("Selected {} scenes", selection.accepted.len());
        Ok(selection)
    }

    #[cfg(feature = "parallel")]
    fn extract_grids(&self, scenes: Vec<Scene>) -> StackResult<Vec<(Scene, StackResult<SceneBurstGrid>)>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| StackError::Config(format!("failed to build extraction pool: {}", e)))?;

        Ok(pool.install(|| {
            scenes
                .into_par_iter()
                .map(|scene| {
                    let grid = self.extractor.scene_grid(&scene, &self.polarization);
                    (scene, grid)
                })
                .collect()
        }))
    }

    #[cfg(not(feature = "parallel"))]
    fn extract_grids(&self, scenes: Vec<Scene>) -> StackResult<Vec<(Scene, StackResult<SceneBurstGrid>)>> {
        Ok(scenes
            .into_iter()
            .map(|scene| {
                let grid = self.extractor.scene_grid(&scene, &self.polarization);
                (scene, grid)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn range(day: u32) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2016, 7, day, 16, 33, 42).unwrap(),
            Utc.with_ymd_and_hms(2016, 7, day, 16, 34, 9).unwrap(),
        )
    }

    #[test]
    fn test_master_selector_parsing() {
        assert_eq!("auto".parse::<MasterSelector>().unwrap(), MasterSelector::Auto);
        assert_eq!(
            "20160714".parse::<MasterSelector>().unwrap(),
            MasterSelector::Date("20160714".to_string())
        );
        assert!("2016-07-14".parse::<MasterSelector>().is_err());
    }

    #[test]
    fn test_date_filter_bounds() {
        let filter = DateFilter::from_short_dates(Some("20160705"), Some("20160720")).unwrap();

        assert!(!filter.accepts(&range(2)));
        assert!(filter.accepts(&range(14)));
        assert!(!filter.accepts(&range(26)));

        let open_end = DateFilter::from_short_dates(Some("20160705"), None).unwrap();
        assert!(open_end.accepts(&range(26)));
        assert!(DateFilter::default().is_unbounded());
    }

    #[test]
    fn test_malformed_date_window() {
        assert!(DateFilter::from_short_dates(Some("2016/07/05"), None).is_err());
        assert!(matches!(
            DateFilter::from_short_dates(Some("20160720"), Some("20160705")),
            Err(StackError::Config(_))
        ));
    }

    #[test]
    fn test_record_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("selection.json");
        let record = SelectionRecord {
            master_date: "20160702".to_string(),
            master_index: 0,
            scenes: vec![PathBuf::from("/data/a.zip"), PathBuf::from("/data/b.zip")],
        };

        record.save(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"master_date\": \"20160702\""));
        assert_eq!(SelectionRecord::load(&path).unwrap(), record);
    }
}
