//! Run configuration loaded from a JSON document

use crate::core::coregistration::CoregOptions;
use crate::core::selection::{DateFilter, MasterSelector};
use crate::types::{Aoi, ResultExt, StackError, StackResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "S1STACK_CONFIG";

/// Location and layout of the SAR toolkit installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitSettings {
    pub root: PathBuf,
    /// Toolkit modules whose `bin` and `scripts` directories are indexed
    pub modules: Vec<String>,
    pub raster_ext: String,
    /// Wall-clock limit for one external command; `None` waits forever
    pub command_timeout_secs: Option<u64>,
}

impl Default for ToolkitSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            modules: ["DIFF", "DISP", "ISP", "LAT", "IPTA"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            raster_ext: "bmp".to_string(),
            command_timeout_secs: None,
        }
    }
}

impl ToolkitSettings {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub polarization: String,
    pub aoi: Option<Aoi>,
    /// Lower date bound, `YYYYMMDD`
    pub start: Option<String>,
    /// Upper date bound, `YYYYMMDD`
    pub stop: Option<String>,
    /// `auto` or a `YYYYMMDD` master date
    pub master: String,
    /// Size of the burst grid extraction pool
    pub workers: usize,
    pub output: PathBuf,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            polarization: "vv".to_string(),
            aoi: None,
            start: None,
            stop: None,
            master: "auto".to_string(),
            workers: 4,
            output: PathBuf::from("selection.json"),
        }
    }
}

impl SelectionConfig {
    pub fn master_selector(&self) -> StackResult<MasterSelector> {
        self.master.parse()
    }

    pub fn date_filter(&self) -> StackResult<DateFilter> {
        DateFilter::from_short_dates(self.start.as_deref(), self.stop.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregConfig {
    pub output_dir: PathBuf,
    /// Where raw products are imported to before registration
    pub slc_dir: PathBuf,
    #[serde(flatten)]
    pub options: CoregOptions,
}

impl Default for CoregConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("coreg"),
            slc_dir: PathBuf::from("SLC"),
            options: CoregOptions::default(),
        }
    }
}

/// Complete configuration of a selection and co-registration run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub toolkit: ToolkitSettings,
    pub selection: SelectionConfig,
    pub coregistration: CoregConfig,
}

impl StackConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open configuration '{}'", path.display()))?;

        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse configuration '{}'", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Configuration file to use: explicit path, then `$S1STACK_CONFIG`,
    /// then `s1stack/config.json` under the user configuration directory
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        dirs::config_dir()
            .map(|dir| dir.join("s1stack").join("config.json"))
            .filter(|path| path.is_file())
    }

    /// Load the located configuration, falling back to defaults when none exists
    pub fn load(explicit: Option<&Path>) -> StackResult<Self> {
        match Self::locate(explicit) {
            Some(path) => Self::from_file(path),
            None => {
                log::warn!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Checks done before any external command is run
    pub fn validate(&self) -> StackResult<()> {
        if self.selection.aoi.is_none() {
            return Err(StackError::Config("no AOI given".to_string()));
        }

        if self.selection.workers == 0 {
            return Err(StackError::Config("number of workers must be positive".to_string()));
        }

        self.selection.date_filter()?;
        self.selection.master_selector()?;

        let looks = self.coregistration.options.looks;
        if looks.range == 0 || looks.azimuth == 0 {
            return Err(StackError::Config(format!(
                "look factors must be positive, got {}x{}",
                looks.range, looks.azimuth
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "toolkit": { "root": "/opt/GAMMA", "command_timeout_secs": 3600 },
        "selection": {
            "aoi": [
                {"lon": 19.0, "lat": 47.0}, {"lon": 19.5, "lat": 47.0},
                {"lon": 19.5, "lat": 47.4}, {"lon": 19.0, "lat": 47.4}
            ],
            "start": "20160601",
            "master": "20160702"
        },
        "coregistration": { "output_dir": "/data/coreg", "hgt": "/data/dem.hgt", "looks": {"range": 4, "azimuth": 1} }
    }"#;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: StackConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(config.toolkit.modules, vec!["DIFF", "DISP", "ISP", "LAT", "IPTA"]);
        assert_eq!(config.toolkit.raster_ext, "bmp");
        assert_eq!(config.toolkit.command_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.selection.polarization, "vv");
        assert_eq!(config.selection.workers, 4);
        assert_eq!(config.coregistration.options.looks.range, 4);
        assert_eq!(config.coregistration.options.phase_stdev_threshold, 0.8);
        assert_eq!(
            config.selection.master_selector().unwrap(),
            MasterSelector::Date("20160702".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(StackConfig::default().validate(), Err(StackError::Config(_))));

        let mut config: StackConfig = serde_json::from_str(CONFIG).unwrap();
        config.selection.stop = Some("20160501".to_string());
        assert!(config.validate().is_err());

        let mut config: StackConfig = serde_json::from_str(CONFIG).unwrap();
        config.selection.master = "first".to_string();
        assert!(config.validate().is_err());

        let mut config: StackConfig = serde_json::from_str(CONFIG).unwrap();
        config.coregistration.options.looks.azimuth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/custom.json");
        assert_eq!(StackConfig::locate(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, CONFIG).unwrap();

        let config = StackConfig::from_file(&path).unwrap();
        assert_eq!(config.coregistration.output_dir, PathBuf::from("/data/coreg"));
        assert_eq!(config.coregistration.options.hgt, PathBuf::from("/data/dem.hgt"));
    }
}
