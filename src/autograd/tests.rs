//! Tests for autograd operations with gradient checking

use super::*;
use approx::assert_abs_diff_eq;
use proptest::prelude::*;

/// Finite difference gradient checker
///
/// Computes numerical gradient using central difference:
/// f'(x) ≈ (f(x + h) - f(x - h)) / (2h)
fn finite_difference<F>(f: F, x: &[f32], epsilon: f32) -> Vec<f32>
where
    F: Fn(&[f32]) -> f32,
{
    let mut grad = vec![0.0; x.len()];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();

    for i in 0..x.len() {
        x_plus[i] = x[i] + epsilon;
        x_minus[i] = x[i] - epsilon;

        grad[i] = (f(&x_plus) - f(&x_minus)) / (2.0 * epsilon);

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    grad
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_tensor_creation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        assert_eq!(t.len(), 3);
        assert!(t.requires_grad());
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_tensor_grad_accumulation() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);

        t.accumulate_grad(ndarray::arr1(&[1.0, 1.0, 1.0]));
        assert_eq!(t.grad().unwrap()[0], 1.0);

        t.accumulate_grad(ndarray::arr1(&[1.0, 1.0, 1.0]));
        assert_eq!(t.grad().unwrap()[0], 2.0);
    }

    #[test]
    fn test_clone_shares_grad_cell() {
        let t = Tensor::from_vec(vec![1.0], true);
        let c = t.clone();
        c.set_grad(ndarray::arr1(&[3.0]));
        assert_eq!(t.grad().unwrap()[0], 3.0);
        assert_eq!(t.node_id(), c.node_id());
    }

    #[test]
    fn test_item_of_empty_is_nan() {
        assert!(Tensor::from_vec(vec![], false).item().is_nan());
        assert_eq!(Tensor::scalar(2.5, false).item(), 2.5);
    }

    #[test]
    fn test_add_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], true);
        let c = add(&a, &b);

        assert_abs_diff_eq!(c.data()[2], 9.0);

        backward(&c, Some(ndarray::arr1(&[1.0, 1.0, 1.0])));

        assert_abs_diff_eq!(a.grad().unwrap()[0], 1.0);
        assert_abs_diff_eq!(b.grad().unwrap()[0], 1.0);
    }

    #[test]
    fn test_sub_backward() {
        let a = Tensor::from_vec(vec![3.0, 2.0], true);
        let b = Tensor::from_vec(vec![1.0, 5.0], true);
        let c = sub(&a, &b);

        assert_abs_diff_eq!(c.data()[1], -3.0);

        backward(&c, None);

        assert_abs_diff_eq!(a.grad().unwrap()[1], 1.0);
        assert_abs_diff_eq!(b.grad().unwrap()[1], -1.0);
    }

    #[test]
    fn test_mul_backward() {
        let a = Tensor::from_vec(vec![2.0, 3.0], true);
        let b = Tensor::from_vec(vec![5.0, 7.0], true);
        let c = mul(&a, &b);

        backward(&c, Some(ndarray::arr1(&[1.0, 1.0])));

        // ∂(a*b)/∂a = b
        assert_abs_diff_eq!(a.grad().unwrap()[0], 5.0);
        assert_abs_diff_eq!(a.grad().unwrap()[1], 7.0);

        // ∂(a*b)/∂b = a
        assert_abs_diff_eq!(b.grad().unwrap()[0], 2.0);
        assert_abs_diff_eq!(b.grad().unwrap()[1], 3.0);
    }

    #[test]
    fn test_shared_subexpression_gets_full_gradient() {
        // y = sum(h * h) + sum(h) with h = 2x; dy/dx = 2 * (2h + 1)
        let x = Tensor::from_vec(vec![1.0, -0.5], true);
        let h = scale(&x, 2.0);
        let y = add(&sum(&mul(&h, &h)), &sum(&h));

        backward(&y, None);

        let grad = x.grad().unwrap();
        assert_abs_diff_eq!(grad[0], 2.0 * (2.0 * 2.0 + 1.0), epsilon = 1e-5);
        assert_abs_diff_eq!(grad[1], 2.0 * (2.0 * -1.0 + 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_relu_backward() {
        let a = Tensor::from_vec(vec![-1.0, 0.0, 1.0, 2.0], true);
        let c = relu(&a);

        assert_abs_diff_eq!(c.data()[0], 0.0);
        assert_abs_diff_eq!(c.data()[3], 2.0);

        backward(&c, Some(ndarray::arr1(&[1.0, 1.0, 1.0, 1.0])));

        let grad_a = a.grad().unwrap();
        assert_abs_diff_eq!(grad_a[0], 0.0);
        assert_abs_diff_eq!(grad_a[1], 0.0);
        assert_abs_diff_eq!(grad_a[2], 1.0);
        assert_abs_diff_eq!(grad_a[3], 1.0);
    }

    #[test]
    fn test_sigmoid_at_zero() {
        let a = Tensor::from_vec(vec![0.0], true);
        let s = sigmoid(&a);
        assert_abs_diff_eq!(s.data()[0], 0.5);

        backward(&s, None);
        assert_abs_diff_eq!(a.grad().unwrap()[0], 0.25);
    }

    #[test]
    fn test_exp_log_inverse() {
        let a = Tensor::from_vec(vec![0.3, 1.7], true);
        let b = log(&exp(&a));
        assert_abs_diff_eq!(b.data()[0], 0.3, epsilon = 1e-6);

        backward(&b, None);
        assert_abs_diff_eq!(a.grad().unwrap()[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_log_of_zero_is_not_finite() {
        let a = Tensor::from_vec(vec![0.0], true);
        assert!(!log(&a).item().is_finite());
    }

    #[test]
    fn test_mean_backward() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 6.0], true);
        let m = mean(&a);
        assert_abs_diff_eq!(m.item(), 3.0);

        backward(&m, None);
        assert_abs_diff_eq!(a.grad().unwrap()[2], 0.25);
    }

    #[test]
    fn test_tile_backward_folds_copies() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let t = tile(&a, 3);
        assert_eq!(t.len(), 6);
        assert_abs_diff_eq!(t.data()[4], 1.0);

        backward(&sum(&t), None);
        assert_abs_diff_eq!(a.grad().unwrap()[0], 3.0);
        assert_abs_diff_eq!(a.grad().unwrap()[1], 3.0);
    }

    #[test]
    fn test_matmul_forward_backward() {
        // [1 2; 3 4] @ [5; 6] = [17; 39]
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let b = Tensor::from_vec(vec![5.0, 6.0], true);
        let c = matmul(&a, &b, 2, 2, 1);

        assert_abs_diff_eq!(c.data()[0], 17.0);
        assert_abs_diff_eq!(c.data()[1], 39.0);

        backward(&c, None);

        // ∂/∂A = 1 @ bᵀ, ∂/∂b = Aᵀ @ 1
        let grad_a = a.grad().unwrap();
        assert_abs_diff_eq!(grad_a[0], 5.0);
        assert_abs_diff_eq!(grad_a[1], 6.0);
        let grad_b = b.grad().unwrap();
        assert_abs_diff_eq!(grad_b[0], 4.0);
        assert_abs_diff_eq!(grad_b[1], 6.0);
    }

    #[test]
    fn test_no_grad_records_nothing() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let c = no_grad(|| mul(&a, &a));

        assert!(!c.requires_grad());
        assert!(c.backward_op().is_none());
    }

    #[test]
    fn test_constant_inputs_record_nothing() {
        let a = Tensor::from_vec(vec![1.0], false);
        let b = Tensor::from_vec(vec![2.0], false);
        assert!(add(&a, &b).backward_op().is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_mul_sum_gradient_check(
        xy in prop::collection::vec((-5.0f32..5.0, -5.0f32..5.0), 2..16)
    ) {
        let (x, y): (Vec<f32>, Vec<f32>) = xy.into_iter().unzip();

        let a = Tensor::from_vec(x.clone(), true);
        let b = Tensor::from_vec(y.clone(), false);
        let loss = sum(&mul(&a, &b));
        backward(&loss, None);

        let analytical = a.grad().unwrap();
        let numerical = finite_difference(
            |x_val| {
                let t_a = Tensor::from_vec(x_val.to_vec(), false);
                let t_b = Tensor::from_vec(y.clone(), false);
                sum(&mul(&t_a, &t_b)).item()
            },
            &x,
            1e-2,
        );

        for (an, num) in analytical.iter().zip(numerical.iter()) {
            prop_assert!((an - num).abs() < 5e-2, "analytical {} vs numerical {}", an, num);
        }
    }

    #[test]
    fn prop_sigmoid_gradient_check(
        x in prop::collection::vec(-4.0f32..4.0, 1..12)
    ) {
        let a = Tensor::from_vec(x.clone(), true);
        backward(&sum(&sigmoid(&a)), None);

        let analytical = a.grad().unwrap();
        let numerical = finite_difference(
            |x_val| sum(&sigmoid(&Tensor::from_vec(x_val.to_vec(), false))).item(),
            &x,
            1e-2,
        );

        for (an, num) in analytical.iter().zip(numerical.iter()) {
            prop_assert!((an - num).abs() < 1e-2);
        }
    }

    #[test]
    fn prop_matmul_gradient_check(
        m in 1usize..4,
        k in 1usize..4,
        seed in prop::collection::vec(-2.0f32..2.0, 16)
    ) {
        let n = 2;
        let a_vals: Vec<f32> = seed.iter().take(m * k).copied().collect();
        let b_vals: Vec<f32> = seed.iter().rev().take(k * n).copied().collect();

        let a = Tensor::from_vec(a_vals.clone(), true);
        let b = Tensor::from_vec(b_vals.clone(), false);
        backward(&sum(&matmul(&a, &b, m, k, n)), None);

        let analytical = a.grad().unwrap();
        let numerical = finite_difference(
            |x_val| {
                let t_a = Tensor::from_vec(x_val.to_vec(), false);
                let t_b = Tensor::from_vec(b_vals.clone(), false);
                sum(&matmul(&t_a, &t_b, m, k, n)).item()
            },
            &a_vals,
            1e-2,
        );

        for (an, num) in analytical.iter().zip(numerical.iter()) {
            prop_assert!((an - num).abs() < 5e-2);
        }
    }
}
