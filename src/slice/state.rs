// src/slice/state.rs

//! Adaptive state a slice carries from one frame to the next.

use crate::coder::fresh_symbol_state;
use crate::header::params::GlobalParams;
use crate::model::PlaneContext;
use crate::utils::error::{Ffv1Error, Result};

/// Entropy state of one slice index, owned by the encoder or decoder and
/// handed to that slice's job each frame.
///
/// Contexts adapt across frames. They go back to the stream's initial
/// states on key frames, on slices that request a reset, and whenever a
/// plane switches to a table with a different context count.
#[derive(Debug, Clone, Default)]
pub struct SliceState {
    pub planes: Vec<PlaneContext>,
    /// The contexts are unusable after a decoding failure until reset.
    pub damaged: bool,
}

fn restore(plane: &mut PlaneContext, p: &GlobalParams) {
    plane.states.fill(fresh_symbol_state());
    let initial = p
        .initial_states
        .get(plane.quant_index)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    plane.reset(initial);
}

impl SliceState {
    /// Selects a quantisation table per plane context.
    pub fn configure(&mut self, p: &GlobalParams, quant_indices: &[usize]) -> Result<()> {
        if self.planes.len() != quant_indices.len() {
            self.planes.clear();
            self.planes.try_reserve_exact(quant_indices.len())?;
            self.planes.resize_with(quant_indices.len(), PlaneContext::default);
        }
        for (plane, &q) in self.planes.iter_mut().zip(quant_indices) {
            let table = p.quant_tables.get(q).ok_or_else(|| {
                Ffv1Error::invalid(format!("quantisation table {} of {}", q, p.quant_tables.len()))
            })?;
            let before = plane.context_count;
            plane.configure(q, table.context_count)?;
            if before != table.context_count {
                restore(plane, p);
            }
        }
        Ok(())
    }

    /// Puts every context back to its initial state and clears the damage.
    pub fn reset(&mut self, p: &GlobalParams) {
        for plane in &mut self.planes {
            restore(plane, p);
        }
        self.damaged = false;
    }
}
