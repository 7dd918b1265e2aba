//! Gradient clipping utilities

use crate::Tensor;

/// Clip gradients by global norm
///
/// global_norm = sqrt(Σ‖g_i‖²); when it exceeds `max_norm` every gradient is
/// scaled by `max_norm / global_norm`, preserving relative magnitudes.
///
/// Returns the global norm measured before clipping.
pub fn clip_grad_norm(params: &mut [Tensor], max_norm: f32) -> f32 {
    let total_norm_sq: f32 = params
        .iter()
        .filter_map(|p| p.grad())
        .map(|g| g.iter().map(|&x| x * x).sum::<f32>())
        .sum();

    let global_norm = total_norm_sq.sqrt();

    if global_norm > max_norm {
        let clip_coef = max_norm / global_norm;
        for param in params.iter_mut() {
            if let Some(grad) = param.grad() {
                param.set_grad(grad * clip_coef);
            }
        }
    }

    global_norm
}
