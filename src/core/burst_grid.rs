//! Burst timing grid and footprint of each IW sub-swath

use crate::args;
use crate::io::command::{Arg, CommandRunner};
use crate::io::params::ParamFile;
use crate::io::safe::SUBSWATH_COUNT;
use crate::io::scene::Scene;
use crate::types::{Point, Rectangle, ResultExt, StackError, StackResult};
use std::path::Path;
use tempfile::TempDir;

/// Maximum number of bursts tracked per sub-swath
pub const MAX_BURSTS: usize = 10;

const PAR_COMMAND: &str = "par_S1_SLC";
const CORNER_COMMANDS: [&str; 2] = ["ScanSAR_burst_corners", "SLC_burst_corners"];

/// Burst grid of one sub-swath
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstGrid {
    burst_count: usize,
    burst_times: [f64; MAX_BURSTS],
    footprint: Rectangle,
}

/// Burst grids of the three sub-swaths, in IW1..IW3 order
pub type SceneBurstGrid = [BurstGrid; SUBSWATH_COUNT];

impl BurstGrid {
    /// Build a grid; more than `MAX_BURSTS` timing values is an error
    pub fn new(burst_times: &[f64], footprint: Rectangle) -> StackResult<Self> {
        if burst_times.len() > MAX_BURSTS {
            return Err(StackError::BurstCapacity {
                count: burst_times.len(),
                capacity: MAX_BURSTS,
            });
        }

        let mut times = [0.0; MAX_BURSTS];
        times[..burst_times.len()].copy_from_slice(burst_times);

        Ok(Self {
            burst_count: burst_times.len(),
            burst_times: times,
            footprint,
        })
    }

    pub fn burst_count(&self) -> usize {
        self.burst_count
    }

    /// Timing markers of the populated bursts
    pub fn burst_times(&self) -> &[f64] {
        &self.burst_times[..self.burst_count]
    }

    pub fn footprint(&self) -> &Rectangle {
        &self.footprint
    }
}

/// Extracts burst grids by way of the toolkit's parameter and corner commands
pub struct BurstGridExtractor<'a> {
    runner: &'a CommandRunner,
}

impl<'a> BurstGridExtractor<'a> {
    pub fn new(runner: &'a CommandRunner) -> Self {
        Self { runner }
    }

    /// Grid of one sub-swath from its raw annotation file.
    ///
    /// The intermediate parameter files live in a scratch directory that is
    /// removed when this returns, whatever the outcome.
    pub fn from_annotation(&self, annotation: &Path) -> StackResult<BurstGrid> {
        let scratch = TempDir::new()?;
        let par = scratch.path().join("burst_grid.par");
        let tops_par = scratch.path().join("burst_grid.par.TOPS_par");

        self.runner
            .call(
                PAR_COMMAND,
                &args![Arg::Absent, annotation, Arg::Absent, Arg::Absent, &par, Arg::Absent, &tops_par],
            )
            .with_context(|| format!("failed to import parameter files from '{}'", annotation.display()))?;

        self.from_parameter_files(&par, &tops_par)
    }

    /// Grid of one sub-swath from existing SLC and TOPS parameter files
    pub fn from_parameter_files(&self, par: &Path, tops_par: &Path) -> StackResult<BurstGrid> {
        let corners = self
            .runner
            .call_any(&CORNER_COMMANDS, &args![par, tops_par])
            .context("failed to compute burst corners")?;

        let tops = ParamFile::from_file(tops_par)?;
        let count = tops
            .int("number_of_bursts", 0)
            .context("failed to retrieve number of bursts")?;

        let count = usize::try_from(count).map_err(|_| StackError::ParseValue {
            key: "number_of_bursts".to_string(),
            value: count.to_string(),
            reason: "negative burst count".to_string(),
        })?;

        if count > MAX_BURSTS {
            return Err(StackError::BurstCapacity {
                count,
                capacity: MAX_BURSTS,
            });
        }

        let burst_times = (1..=count)
            .map(|i| {
                let key = format!("burst_asc_node_{}", i);
                tops.float(&key, 0)
                    .with_context(|| format!("failed to get burst timing '{}'", key))
            })
            .collect::<StackResult<Vec<f64>>>()?;

        let footprint = parse_footprint(&ParamFile::from_text(&corners))?;

        BurstGrid::new(&burst_times, footprint)
    }

    /// Grids of all three sub-swaths of a scene; any sub-swath failure fails the scene
    pub fn scene_grid(&self, scene: &Scene, polarization: &str) -> StackResult<SceneBurstGrid> {
        let mut grids = Vec::with_capacity(SUBSWATH_COUNT);

        match scene {
            Scene::RawProduct(product) => {
                let scratch = TempDir::new()?;
                for iw in 1..=SUBSWATH_COUNT {
                    let grid = product
                        .extract_annotation(iw, polarization, scratch.path())
                        .and_then(|annotation| self.from_annotation(&annotation))
                        .with_context(|| {
                            format!("failed to retrieve IW{} information of '{}'", iw, product.path.display())
                        })?;
                    grids.push(grid);
                }
            }
            Scene::ImportedSlc(slc) => {
                if slc.subswaths().len() != SUBSWATH_COUNT {
                    return Err(StackError::InvalidFormat(format!(
                        "'{}' has {} sub-swaths, burst grid needs {}",
                        slc.tab().display(),
                        slc.subswaths().len(),
                        SUBSWATH_COUNT
                    )));
                }

                for (i, iw) in slc.subswaths().iter().enumerate() {
                    let grid = self
                        .from_parameter_files(&iw.par, &iw.tops_par)
                        .with_context(|| {
                            format!("failed to retrieve IW{} information of '{}'", i + 1, slc.tab().display())
                        })?;
                    grids.push(grid);
                }
            }
        }

        grids
            .try_into()
            .map_err(|_| StackError::InvalidFormat("incomplete sub-swath burst grids".to_string()))
    }
}

fn parse_footprint(info: &ParamFile) -> StackResult<Rectangle> {
    let point = |lon: &str, lat: &str| -> StackResult<Point> {
        Ok(Point::new(
            info.float(lon, 0).context("failed to retrieve longitude value")?,
            info.float(lat, 0).context("failed to retrieve latitude value")?,
        ))
    };

    Ok(Rectangle {
        max: point("Max_Lon", "Max_Lat")?,
        min: point("Min_Lon", "Min_Lat")?,
    })
}
