//! Scripted stand-in for the SAR toolkit and on-disk SLC fixtures

#![allow(dead_code)]

use s1stack::io::{CommandResolver, CommandRunner, Executor, ImportedSlc};
use s1stack::{StackError, StackResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const COMMANDS: [&str; 4] = ["par_S1_SLC", "SLC_burst_corners", "S1_coreg_TOPS", "rasmph_pwr24"];

/// Sub-swath footprints as (min_lon, min_lat, max_lon, max_lat)
pub const FOOTPRINTS: [(f64, f64, f64, f64); 3] = [
    (17.0, 46.0, 18.0, 48.0),
    (17.8, 46.0, 19.0, 48.0),
    (18.8, 46.0, 20.0, 48.0),
];

/// Default burst timing per sub-swath
pub fn burst_times() -> [Vec<f64>; 3] {
    [
        vec![1000.0, 1002.75, 1005.5],
        vec![1001.0, 1003.75, 1006.5],
        vec![1002.0, 1004.75, 1007.5],
    ]
}

#[derive(Debug, Clone)]
pub struct Call {
    pub command: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
}

/// Fake executor.
///
/// `SLC_burst_corners` echoes the corner lines stored in the SLC parameter
/// file. `S1_coreg_TOPS` writes the registered SLC listed in its output tab
/// and an interferogram whose results file rejects the scenes in `reject`.
#[derive(Default)]
pub struct FakeToolkit {
    pub calls: Mutex<Vec<Call>>,
    pub reject: HashSet<String>,
    pub fail: HashSet<String>,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            reject: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing(ids: &[&str]) -> Self {
        Self {
            fail: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls_of(&self, command: &str) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command == command)
            .cloned()
            .collect()
    }

    /// Parameter files for the sub-swath named in the annotation file
    fn import(&self, args: &[String]) -> StackResult<String> {
        let annotation = Path::new(&args[1])
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let iw = ["-iw1-", "-iw2-", "-iw3-"]
            .iter()
            .position(|s| annotation.contains(s))
            .unwrap_or(0);
        let (min_lon, min_lat, max_lon, max_lat) = FOOTPRINTS[iw];

        fs::write(
            &args[4],
            format!(
                "date: 2016 07 02 16 33 42.0\nstart_time: 59622.0 s\nend_time: 59649.0 s\n\
                 Max_Lon: {}\nMax_Lat: {}\nMin_Lon: {}\nMin_Lat: {}\n",
                max_lon, max_lat, min_lon, min_lat
            ),
        )?;

        let all = burst_times();
        let times = &all[iw];
        let mut tops = format!("number_of_bursts: {}\n", times.len());
        for (i, t) in times.iter().enumerate() {
            tops.push_str(&format!("burst_asc_node_{}: {} s\n", i + 1, t));
        }
        fs::write(&args[6], tops)?;

        if args[5] != "-" {
            fs::write(&args[5], b"slc")?;
        }

        Ok(String::new())
    }

    fn coreg(&self, args: &[String], dir: &Path) -> StackResult<String> {
        let (master_id, scene_id) = (&args[1], &args[3]);

        if self.fail.contains(scene_id) {
            return Err(StackError::Command {
                command: "S1_coreg_TOPS".to_string(),
                args: args.join(" "),
                output: "ERROR: insufficient coherence in burst overlap".to_string(),
            });
        }

        let scene_tab = fs::read_to_string(&args[2])?;
        let rslc_tab = fs::read_to_string(&args[4])?;

        for (slc_line, rslc_line) in scene_tab.lines().zip(rslc_tab.lines()) {
            let slc: Vec<&str> = slc_line.split_whitespace().collect();
            let rslc: Vec<&str> = rslc_line.split_whitespace().collect();
            fs::write(rslc[0], b"rslc")?;
            fs::copy(slc[1], rslc[1])?;
            fs::copy(slc[2], rslc[2])?;
        }

        let stem = dir.join(format!("{}_{}", master_id, scene_id));
        let offset = if self.reject.contains(scene_id) { 0.0002 } else { 1.0 };
        for ext in ["diff", "off", "diff_par"] {
            fs::write(stem.with_extension(ext), b"ifg")?;
        }
        fs::write(
            stem.with_extension("results"),
            format!("azimuth_pixel_offset {}\nrange_pixel_offset 0.01\n", offset),
        )?;
        fs::write(dir.join(format!("{}.iw1.vv.rslc.lt", scene_id)), b"leftover")?;

        Ok(String::new())
    }
}

impl Executor for FakeToolkit {
    fn execute(&self, program: &Path, args: &[String], dir: Option<&Path>) -> StackResult<String> {
        let command = program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        self.calls.lock().unwrap().push(Call {
            command: command.clone(),
            args: args.to_vec(),
            dir: dir.map(Path::to_path_buf),
        });

        match command.as_str() {
            "SLC_burst_corners" => {
                let par = fs::read_to_string(&args[0])?;
                Ok(par
                    .lines()
                    .filter(|l| l.starts_with("Max_") || l.starts_with("Min_"))
                    .map(|l| format!("{}\n", l))
                    .collect())
            }
            "par_S1_SLC" => self.import(args),
            "S1_coreg_TOPS" => self.coreg(args, dir.unwrap_or(Path::new("."))),
            "rasmph_pwr24" => {
                fs::write(&args[11], b"BM")?;
                Ok(String::new())
            }
            _ => Err(StackError::UnknownCommand(command)),
        }
    }
}

pub fn runner(toolkit: Arc<FakeToolkit>) -> CommandRunner {
    let resolver = CommandResolver::from_entries(COMMANDS.iter().map(|c| (*c, format!("/opt/GAMMA/bin/{}", c))));
    CommandRunner::new(resolver, toolkit)
}

/// Fixture description of one imported SLC
pub struct SlcFixture {
    /// `YYYYMMDD`
    pub date: &'static str,
    pub burst_times: [Vec<f64>; 3],
    pub footprints: [(f64, f64, f64, f64); 3],
    /// Omit `number_of_bursts` from the TOPS parameters
    pub broken: bool,
}

impl SlcFixture {
    pub fn new(date: &'static str) -> Self {
        Self {
            date,
            burst_times: burst_times(),
            footprints: FOOTPRINTS,
            broken: false,
        }
    }

    /// Write the three sub-swaths and the tab file into `dir`
    pub fn write(&self, dir: &Path) -> ImportedSlc {
        let (y, m, d) = (&self.date[0..4], &self.date[4..6], &self.date[6..8]);
        let mut tab = String::new();

        for iw in 0..3 {
            let dat = dir.join(format!("{}.iw{}.vv.slc", self.date, iw + 1));
            let par = PathBuf::from(format!("{}.par", dat.display()));
            let tops_par = PathBuf::from(format!("{}.TOPS_par", dat.display()));
            let (min_lon, min_lat, max_lon, max_lat) = self.footprints[iw];

            fs::write(&dat, b"slc").unwrap();
            fs::write(
                &par,
                format!(
                    "title: S1A {}\ndate: {} {} {} 16 33 42.0\nstart_time: 59622.0 s\nend_time: 59649.0 s\n\
                     Max_Lon: {}\nMax_Lat: {}\nMin_Lon: {}\nMin_Lat: {}\n",
                    self.date, y, m, d, max_lon, max_lat, min_lon, min_lat
                ),
            )
            .unwrap();

            let mut tops = String::new();
            if !self.broken {
                tops.push_str(&format!("number_of_bursts: {}\n", self.burst_times[iw].len()));
            }
            for (i, t) in self.burst_times[iw].iter().enumerate() {
                tops.push_str(&format!("burst_asc_node_{}: {} s\n", i + 1, t));
            }
            fs::write(&tops_par, tops).unwrap();

            tab.push_str(&format!("{} {} {}\n", dat.display(), par.display(), tops_par.display()));
        }

        let tab_path = dir.join(format!("{}.vv.SLC_tab", self.date));
        fs::write(&tab_path, tab).unwrap();
        ImportedSlc::from_tab(&tab_path).unwrap()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
