//! Slice timing, Fourier regressor synthesis and table assembly.

mod slice_timing;
mod synth;
mod table;

pub use slice_timing::{parse_offsets, SliceOrder, SlicePattern, SliceTiming};
pub use synth::{nearest_sample, output_grid, synthesize, SignalRegressors, COMPONENTS};
pub use table::{assemble, ColumnLayout, RegressorTable};
