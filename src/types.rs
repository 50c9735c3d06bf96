use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Short date format used for scene identifiers (e.g. `20160702`)
pub const SHORT_DATE_FORMAT: &str = "%Y%m%d";

/// Long date format used in product filenames (e.g. `20160702T163342`)
pub const LONG_DATE_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Geographic point, longitude on x and latitude on y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Axis-aligned geographic rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub max: Point,
    pub min: Point,
}

impl Rectangle {
    pub fn new(min: Point, max: Point) -> Self {
        Self { max, min }
    }
}

/// Area of interest as four independent corner points.
///
/// The corners are not required to form a rectangle; containment checks
/// only ever look at the vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aoi(pub [Point; 4]);

impl Aoi {
    /// Build an AOI from the four corners of a lon/lat bounding box
    pub fn from_bounds(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Aoi([
            Point::new(min_lon, min_lat),
            Point::new(max_lon, min_lat),
            Point::new(max_lon, max_lat),
            Point::new(min_lon, max_lat),
        ])
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.0
    }
}

/// Acquisition time span of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub center: DateTime<Utc>,
}

impl DateRange {
    /// Create a date range; the center is the midpoint of start and stop
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        let center = stop - (stop - start) / 2;
        Self { start, stop, center }
    }

    /// Short `YYYYMMDD` representation of the center time
    pub fn short(&self) -> String {
        self.center.format(SHORT_DATE_FORMAT).to_string()
    }
}

/// Range and azimuth look factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookFactors {
    pub range: u32,
    pub azimuth: u32,
}

impl Default for LookFactors {
    fn default() -> Self {
        Self { range: 1, azimuth: 1 }
    }
}

/// Error types for scene selection and co-registration
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("parameter '{key}' not found in {source_name}")]
    MissingParameter { key: String, source_name: String },

    #[error("failed to parse value '{value}' of parameter '{key}': {reason}")]
    ParseValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("command '{command} {args}' failed, output of command is: {output}")]
    Command {
        command: String,
        args: String,
        output: String,
    },

    #[error("command '{command}' did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("executable '{0}' is not available in the toolkit")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{count} bursts exceed the capacity of {capacity} bursts per sub-swath")]
    BurstCapacity { count: usize, capacity: usize },

    #[error(
        "number of bursts in first SLC IW{swath} ({first}) is not equal to \
         the number of bursts in the second SLC IW{swath} ({second})"
    )]
    BurstCountMismatch {
        swath: usize,
        first: usize,
        second: usize,
    },

    #[error("failed to move '{from}' to '{to}': {source}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("no scenes to co-register")]
    EmptyStack,

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<StackError>,
    },
}

impl StackError {
    /// Wrap the error with a message naming the failing stage
    pub fn context(self, context: impl Into<String>) -> Self {
        StackError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error of a context chain
    pub fn root_cause(&self) -> &StackError {
        match self {
            StackError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;

/// Attach a context message to the error of a result
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> StackResult<T>;

    fn with_context<F, S>(self, f: F) -> StackResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<StackError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: impl Into<String>) -> StackResult<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F, S>(self, f: F) -> StackResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
