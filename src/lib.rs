//! s1stack: Sentinel-1 TOPS stack selection and chained co-registration
//!
//! Selects the scenes of a Sentinel-1 IW catalog that cover an area of
//! interest and share the master's burst grid, then drives an external SAR
//! toolkit to register the stack against the master, one sweep forward and
//! one backward in time.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{Aoi, DateRange, LookFactors, Point, Rectangle, ResultExt, StackError, StackResult};

pub use config::StackConfig;
pub use io::{Arg, Catalog, CommandResolver, CommandRunner, Executor, ImportedSlc, RawProduct, Scene, SystemExecutor};
pub use core::{
    BurstGridExtractor, CoregOptions, CoregReport, CoregistrationOrchestrator, DateFilter, MasterSelector,
    OutputLayout, QualityGate, Selection, SelectionPipeline, SelectionRecord,
};
