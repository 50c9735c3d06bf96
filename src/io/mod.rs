//! I/O modules: external toolkit boundary, parameter files, products and SLCs

pub mod command;
pub mod params;
pub mod annotation;
pub mod safe;
pub mod slc;
pub mod scene;

pub use command::{Arg, CommandResolver, CommandRunner, Executor, SystemExecutor};
pub use params::ParamFile;
pub use safe::{RawProduct, SafeArchive};
pub use slc::{ImportedSlc, SubSwathFiles};
pub use scene::{Catalog, Scene};
