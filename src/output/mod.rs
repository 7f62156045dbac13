/*!
 * Final audio artifacts.
 */

pub mod assembler;

pub use assembler::{
    ArtifactPlan, AssemblyPlan, AssemblyReport, AssemblySettings, OutputArtifact, OutputAssembler, SegmentGap,
};
