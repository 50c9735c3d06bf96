//! Core stack processing modules

pub mod burst_grid;
pub mod geometry;
pub mod selection;
pub mod quality;
pub mod coregistration;

// Re-export main types
pub use burst_grid::{BurstGrid, BurstGridExtractor, SceneBurstGrid, MAX_BURSTS};
pub use geometry::{aoi_contained, burst_alignment_distance, burst_counts_match, is_aligned, is_non_zero_after_rounding};
pub use selection::{DateFilter, MasterSelector, Rejection, RejectionReason, Selection, SelectionPipeline, SelectionRecord};
pub use quality::{QualityGate, QualityVerdict};
pub use coregistration::{
    CoregOptions, CoregReport, CoregistrationOrchestrator, Interferogram, OrchestratorState, OutputLayout,
    PairOutcome, PairStatus, RasterPreview, Sweep,
};
