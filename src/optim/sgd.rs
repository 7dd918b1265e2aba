//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::Tensor;
use ndarray::Array1;

/// SGD optimizer with optional momentum
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    fn ensure_velocities(&mut self, params: &[Tensor]) {
        if self.velocities.len() != params.len() {
            self.velocities = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_velocities(params);

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            if self.momentum > 0.0 {
                // v = momentum * v - lr * grad
                let velocity = match &self.velocities[i] {
                    Some(v) => v * self.momentum - &grad * self.lr,
                    None => &grad * (-self.lr),
                };
                *param.data_mut() += &velocity;
                self.velocities[i] = Some(velocity);
            } else {
                *param.data_mut() -= &(&grad * self.lr);
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn reset(&mut self) {
        self.velocities.clear();
    }

    fn name(&self) -> &str {
        "sgd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sgd_plain_step() {
        let mut params = vec![Tensor::from_vec(vec![1.0, 2.0], true)];
        params[0].set_grad(ndarray::arr1(&[0.5, -1.0]));

        let mut optimizer = SGD::new(0.1, 0.0);
        optimizer.step(&mut params);

        assert_abs_diff_eq!(params[0].data()[0], 0.95, epsilon = 1e-6);
        assert_abs_diff_eq!(params[0].data()[1], 2.1, epsilon = 1e-6);
    }

    #[test]
    fn test_sgd_momentum_accelerates() {
        let mut params = vec![Tensor::from_vec(vec![0.0], true)];
        let mut optimizer = SGD::new(0.1, 0.9);

        params[0].set_grad(ndarray::arr1(&[1.0]));
        optimizer.step(&mut params);
        let first = params[0].data()[0];

        params[0].set_grad(ndarray::arr1(&[1.0]));
        optimizer.step(&mut params);
        let second_move = params[0].data()[0] - first;

        assert!(second_move.abs() > first.abs());
    }
}
