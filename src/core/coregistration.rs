//! Chained co-registration of a stack against its master
//!
//! Two sweeps walk away from the master, forward and backward in time. Each
//! keeps its own auxiliary reference: the last scene of the sweep that was
//! registered and passed the quality gate.

use crate::args;
use crate::core::quality::{QualityGate, QualityVerdict};
use crate::io::command::{Arg, CommandRunner};
use crate::io::params::ParamFile;
use crate::io::slc::{relocate_file, ImportedSlc};
use crate::types::{LookFactors, ResultExt, StackError, StackResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const COREG_COMMAND: &str = "S1_coreg_TOPS";
const RASTER_COMMAND: &str = "rasmph_pwr24";

/// Master MLI the raster preview is drawn on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterPreview {
    pub mli_dat: PathBuf,
    pub mli_par: PathBuf,
}

/// Parameters handed to the registration command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregOptions {
    /// Elevation model in radar coordinates
    pub hgt: PathBuf,
    pub looks: LookFactors,
    pub poly1: Option<u32>,
    pub poly2: Option<u32>,
    pub coherence_threshold: f64,
    pub fraction_threshold: f64,
    pub phase_stdev_threshold: f64,
    pub clean: bool,
    pub use_inter: bool,
    pub raster_preview: Option<RasterPreview>,
    /// Run the two sweeps concurrently
    pub parallel_sweeps: bool,
}

impl Default for CoregOptions {
    fn default() -> Self {
        Self {
            hgt: PathBuf::new(),
            looks: LookFactors::default(),
            poly1: None,
            poly2: None,
            coherence_threshold: 0.8,
            fraction_threshold: 0.01,
            phase_stdev_threshold: 0.8,
            clean: false,
            use_inter: true,
            raster_preview: None,
            parallel_sweeps: false,
        }
    }
}

/// Work directory plus the permanent homes of registered SLCs and interferograms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub work_dir: PathBuf,
    pub rslc_dir: PathBuf,
    pub ifg_dir: PathBuf,
}

impl OutputLayout {
    /// `RSLC` and `IFG` subdirectories of the output directory
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        let work_dir = output_dir.as_ref().to_path_buf();
        Self {
            rslc_dir: work_dir.join("RSLC"),
            ifg_dir: work_dir.join("IFG"),
            work_dir,
        }
    }

    pub fn create(&self) -> StackResult<()> {
        for dir in [&self.work_dir, &self.rslc_dir, &self.ifg_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
        }
        Ok(())
    }
}

/// Files of a differential interferogram named `<master>_<scene>.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interferogram {
    pub dat: PathBuf,
    pub par: PathBuf,
    pub diff_par: PathBuf,
    pub quality: PathBuf,
    pub sim: Option<PathBuf>,
}

impl Interferogram {
    pub fn from_stem(dir: &Path, master_id: &str, scene_id: &str) -> Self {
        let stem = format!("{}_{}", master_id, scene_id);
        let file = |ext: &str| dir.join(format!("{}.{}", stem, ext));

        let sim = file("sim");
        Self {
            dat: file("diff"),
            par: file("off"),
            diff_par: file("diff_par"),
            quality: file("results"),
            sim: sim.is_file().then_some(sim),
        }
    }

    pub fn relocate(&self, dir: &Path) -> StackResult<Self> {
        Ok(Self {
            dat: relocate_file(&self.dat, dir)?,
            par: relocate_file(&self.par, dir)?,
            diff_par: relocate_file(&self.diff_par, dir)?,
            quality: relocate_file(&self.quality, dir)?,
            sim: self.sim.as_deref().map(|sim| relocate_file(sim, dir)).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    RegisteringForward,
    RegisteringBackward,
    RegisteringBoth,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    Forward,
    Backward,
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sweep::Forward => f.write_str("forward"),
            Sweep::Backward => f.write_str("backward"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PairStatus {
    /// Registered in this run and accepted by the quality gate
    Registered { rslc: ImportedSlc },
    /// Registered SLC was already on disk; no command was run
    Reused { rslc: ImportedSlc },
    /// Rejected by the quality gate; the sweep reference is unchanged
    Rejected { residual: f64 },
}

/// One visited scene of a sweep
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub sweep: Sweep,
    pub scene_id: String,
    /// Auxiliary reference the pair was registered with, if any
    pub reference: Option<String>,
    pub status: PairStatus,
}

impl PairOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self.status, PairStatus::Rejected { .. })
    }

    pub fn rslc(&self) -> Option<&ImportedSlc> {
        match &self.status {
            PairStatus::Registered { rslc } | PairStatus::Reused { rslc } => Some(rslc),
            PairStatus::Rejected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoregReport {
    pub master_id: String,
    /// Forward sweep outcomes followed by backward sweep outcomes
    pub outcomes: Vec<PairOutcome>,
}

impl CoregReport {
    pub fn accepted(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| o.is_accepted())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(|o| !o.is_accepted())
    }

    pub fn sweep(&self, sweep: Sweep) -> impl Iterator<Item = &PairOutcome> {
        self.outcomes.iter().filter(move |o| o.sweep == sweep)
    }
}

/// Drives the registration command over a chronologically ordered stack
pub struct CoregistrationOrchestrator<'a> {
    runner: &'a CommandRunner,
    layout: OutputLayout,
    options: CoregOptions,
    gate: QualityGate,
    raster_ext: String,
    state: OrchestratorState,
}

impl<'a> CoregistrationOrchestrator<'a> {
    pub fn new(runner: &'a CommandRunner, layout: OutputLayout, options: CoregOptions) -> Self {
        Self {
            runner,
            layout,
            options,
            gate: QualityGate,
            raster_ext: "bmp".to_string(),
            state: OrchestratorState::Idle,
        }
    }

    /// File extension of raster previews
    pub fn with_raster_ext(mut self, ext: &str) -> Self {
        self.raster_ext = ext.trim_start_matches('.').to_string();
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Register every scene of `stack` except the master.
    ///
    /// A failing registration command or a failed move of an output file
    /// aborts the whole run. Quality rejections are logged and skipped.
    pub fn run(&mut self, stack: &[ImportedSlc], master_index: usize) -> StackResult<CoregReport> {
        if stack.is_empty() {
            return Err(StackError::EmptyStack);
        }

        let master = stack.get(master_index).ok_or_else(|| {
            StackError::Config(format!(
                "master index {} is out of range for a stack of {} scenes",
                master_index,
                stack.len()
            ))
        })?;

        if self.options.hgt.as_os_str().is_empty() {
            return Err(StackError::Config(
                "path to the elevation model in radar coordinates has to be given".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(stack.len());
        if let Some(dup) = stack.iter().find(|slc| !seen.insert(slc.id())) {
            return Err(StackError::Config(format!(
                "more than one scene of {} in the stack ('{}')",
                dup.id(),
                dup.tab().display()
            )));
        }

        self.layout.create()?;
        log::info!("Master date: {}", master.id());

        let forward: Vec<&ImportedSlc> = stack[master_index + 1..].iter().collect();
        let backward: Vec<&ImportedSlc> = stack[..master_index].iter().rev().collect();

        let (forward, backward) = if self.options.parallel_sweeps {
            self.state = OrchestratorState::RegisteringBoth;
            let this = &*self;
            let (f, b) = rayon::join(
                || this.sweep(Sweep::Forward, master, &forward),
                || this.sweep(Sweep::Backward, master, &backward),
            );
            (f?, b?)
        } else {
            self.state = OrchestratorState::RegisteringForward;
            let f = self.sweep(Sweep::Forward, master, &forward)?;
            self.state = OrchestratorState::RegisteringBackward;
            let b = self.sweep(Sweep::Backward, master, &backward)?;
            (f, b)
        };

        self.state = OrchestratorState::Done;

        let mut outcomes = forward;
        outcomes.extend(backward);

        let report = CoregReport {
            master_id: master.id(),
            outcomes,
        };
        log::info!(
            "Co-registration finished: {} accepted, {} rejected",
            report.accepted().count(),
            report.rejected().count()
        );

        Ok(report)
    }

    fn sweep(
        &self,
        sweep: Sweep,
        master: &ImportedSlc,
        scenes: &[&ImportedSlc],
    ) -> StackResult<Vec<PairOutcome>> {
        let mut reference: Option<ImportedSlc> = None;
        let mut outcomes = Vec::with_capacity(scenes.len());

        for scene in scenes {
            let status = self
                .register_pair(master, scene, reference.as_ref())
                .with_context(|| format!("{} sweep: co-registration of '{}' failed", sweep, scene.id()))?;

            let used = reference.as_ref().map(ImportedSlc::id);

            match &status {
                PairStatus::Registered { rslc } | PairStatus::Reused { rslc } => {
                    reference = Some(rslc.clone());
                }
                PairStatus::Rejected { residual } => {
                    log::warn!(
                        "Coregistration of '{}' failed (azimuth offset sum {:.4})! Moving to the next scene",
                        scene.id(),
                        residual
                    );
                }
            }

            outcomes.push(PairOutcome {
                sweep,
                scene_id: scene.id(),
                reference: used,
                status,
            });
        }

        Ok(outcomes)
    }

    fn register_pair(
        &self,
        master: &ImportedSlc,
        scene: &ImportedSlc,
        reference: Option<&ImportedSlc>,
    ) -> StackResult<PairStatus> {
        let settled = scene.registered_in(&self.layout.rslc_dir);
        if settled.exists() && settled.tab().is_file() {
            log::info!("Registered SLC '{}' already in place", settled.tab().display());
            return Ok(PairStatus::Reused { rslc: settled });
        }

        let target = scene.registered_in(&self.layout.work_dir);
        if target.exists() {
            log::info!("Coregistered RSLC of '{}' already exists, moving it to directory", scene.id());
            let rslc = target.relocate(&self.layout.rslc_dir)?;
            return Ok(PairStatus::Reused { rslc });
        }

        target.write_tab()?;

        let opt = &self.options;
        let mut arguments = args![
            absolute(master.tab())?,
            master.id(),
            absolute(scene.tab())?,
            scene.id(),
            target.tab(),
            absolute(&opt.hgt)?,
            opt.looks.range,
            opt.looks.azimuth,
            opt.poly1,
            opt.poly2,
            opt.coherence_threshold,
            opt.fraction_threshold,
            opt.phase_stdev_threshold,
            Arg::flag(opt.clean),
            Arg::flag(opt.use_inter),
        ];

        match reference {
            Some(r) => {
                log::info!("Coregistering: '{}'. Reference: '{}'", scene.tab().display(), r.tab().display());
                arguments.extend(args![absolute(r.tab())?, r.id()]);
            }
            None => log::info!("Coregistering: '{}'", scene.tab().display()),
        }

        self.runner.call_in(&self.layout.work_dir, COREG_COMMAND, &arguments)?;

        let ifg = Interferogram::from_stem(&self.layout.work_dir, &master.id(), &scene.id());
        let QualityVerdict { residual, accepted } = self.gate.evaluate(&ifg.quality)?;

        if !accepted {
            discard(&target)?;
            if opt.clean {
                self.clean(&master.id(), &scene.id())?;
            }
            return Ok(PairStatus::Rejected { residual });
        }

        let rslc = target.relocate(&self.layout.rslc_dir)?;
        let ifg = ifg
            .relocate(&self.layout.ifg_dir)
            .with_context(|| format!("failed to move interferogram '{}' to IFG directory", ifg.dat.display()))?;

        if let Some(preview) = &opt.raster_preview {
            self.raster(&ifg, preview)
                .with_context(|| format!("failed to create raster image for interferogram '{}'", ifg.dat.display()))?;
        }

        if opt.clean {
            self.clean(&master.id(), &scene.id())?;
        }

        Ok(PairStatus::Registered { rslc })
    }

    fn raster(&self, ifg: &Interferogram, preview: &RasterPreview) -> StackResult<PathBuf> {
        let width = ParamFile::from_file(&preview.mli_par)?.int("range_samples", 0)?;
        let raster = PathBuf::from(format!("{}.{}", ifg.dat.display(), self.raster_ext));

        self.runner.call(
            RASTER_COMMAND,
            &args![
                &ifg.dat,
                &preview.mli_dat,
                width,
                1,
                1,
                Arg::Absent,
                self.options.looks.range,
                self.options.looks.azimuth,
                Arg::Absent,
                Arg::Absent,
                Arg::Absent,
                &raster,
            ],
        )?;

        Ok(raster)
    }

    /// Remove what the registration left behind for this pair in the work directory
    fn clean(&self, master_id: &str, scene_id: &str) -> StackResult<()> {
        for prefix in [scene_id.to_string(), format!("{}_{}", master_id, scene_id)] {
            let pattern = self.layout.work_dir.join(format!("{}*", prefix));
            let pattern = pattern.to_string_lossy();

            let entries = glob::glob(&pattern).map_err(|e| {
                StackError::Config(format!("globbing for leftover files with '{}' failed: {}", pattern, e))
            })?;

            for entry in entries {
                let path = entry.map_err(|e| StackError::Io(e.into()))?;
                if path.is_file() {
                    fs::remove_file(&path)
                        .with_context(|| format!("failed to remove file '{}'", path.display()))?;
                }
            }
        }

        Ok(())
    }
}

/// Remove a rejected registration so a later run does not adopt it
fn discard(rslc: &ImportedSlc) -> StackResult<()> {
    let files = rslc
        .subswaths()
        .iter()
        .flat_map(|iw| [&iw.dat, &iw.par, &iw.tops_par])
        .map(PathBuf::as_path)
        .chain(std::iter::once(rslc.tab()));

    for file in files {
        if file.is_file() {
            fs::remove_file(file)?;
        }
    }

    Ok(())
}

/// Commands run inside the work directory, so inputs are passed as absolute paths
fn absolute(path: &Path) -> StackResult<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("failed to resolve '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_interferogram_naming() {
        let dir = TempDir::new().unwrap();
        let ifg = Interferogram::from_stem(dir.path(), "20160702", "20160714");

        assert_eq!(ifg.dat, dir.path().join("20160702_20160714.diff"));
        assert_eq!(ifg.par, dir.path().join("20160702_20160714.off"));
        assert_eq!(ifg.diff_par, dir.path().join("20160702_20160714.diff_par"));
        assert_eq!(ifg.quality, dir.path().join("20160702_20160714.results"));
        assert!(ifg.sim.is_none());

        std::fs::write(dir.path().join("20160702_20160714.sim"), b"").unwrap();
        assert!(Interferogram::from_stem(dir.path(), "20160702", "20160714").sim.is_some());
    }

    #[test]
    fn test_layout() {
        let layout = OutputLayout::new("/data/stack");
        assert_eq!(layout.rslc_dir, PathBuf::from("/data/stack/RSLC"));
        assert_eq!(layout.ifg_dir, PathBuf::from("/data/stack/IFG"));
    }

    #[test]
    fn test_default_options() {
        let opt: CoregOptions = serde_json::from_str(r#"{"hgt": "dem.hgt", "poly1": 3}"#).unwrap();

        assert_eq!(opt.poly1, Some(3));
        assert_eq!(opt.poly2, None);
        assert_eq!(opt.coherence_threshold, 0.8);
        assert!(opt.use_inter);
        assert!(!opt.clean);
    }

    #[test]
    fn test_empty_stack() {
        let runner = CommandRunner::new(
            crate::io::command::CommandResolver::default(),
            std::sync::Arc::new(crate::io::command::SystemExecutor::new(None).unwrap()),
        );
        let dir = TempDir::new().unwrap();
        let mut orchestrator = CoregistrationOrchestrator::new(&runner, OutputLayout::new(dir.path()), CoregOptions::default());

        assert!(matches!(orchestrator.run(&[], 0), Err(StackError::EmptyStack)));
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }
}
