//! Context modelling: quantisation tables, neighbourhood contexts, the
//! median predictor and the per-plane adaptive state banks.

pub mod context;
pub mod quant;

pub use context::{Neighbourhood, PlaneContext, median3};
pub use quant::{MAX_CONTEXT_INPUTS, MAX_QUANT_TABLES, QuantTable};
