//! Pointwise Hamiltonian minimisation over a control lattice.

use crate::cost::CostModel;
use crate::dynamics::Dynamics;
use crate::gradient::UpwindGradient;

/// `min_u [ L(x, u) + Σ f_i(x, u) · D_i V ]` over `controls`.
///
/// `D_i V` is the upwind difference selected by the sign of `f_i`.
/// Returns the minimum and the index of the minimising control; ties go
/// to the earliest control. A NaN Hamiltonian is returned immediately so
/// callers see it. An empty control set yields `+∞`.
pub fn hamiltonian(
    position: &[f64],
    gradient: &UpwindGradient,
    dynamics: &dyn Dynamics,
    cost: &dyn CostModel,
    controls: &[Vec<f64>],
) -> (f64, usize) {
    let mut best = (f64::INFINITY, 0);
    for (i, control) in controls.iter().enumerate() {
        let rate = dynamics.rate(position, control);
        let h = cost.stage(position, control) + gradient.upwind_dot(&rate);
        if h.is_nan() {
            return (h, i);
        }
        if h < best.0 {
            best = (h, i);
        }
    }
    best
}
