//! Autograd operations with backward passes

use super::{is_grad_enabled, BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

type GradCell = Rc<RefCell<Option<Array1<f32>>>>;

/// Whether an op over `inputs` should record a backward operation
fn tracks_grad(inputs: &[&Tensor]) -> bool {
    is_grad_enabled() && inputs.iter().any(|t| t.requires_grad())
}

/// Build the result tensor, attaching the backward op when gradients are tracked
fn record<F>(data: Array1<f32>, inputs: &[&Tensor], make_op: F) -> Tensor
where
    F: FnOnce(GradCell) -> Rc<dyn BackwardOp>,
{
    let requires_grad = tracks_grad(inputs);
    let mut result = Tensor::new(data, requires_grad);
    if requires_grad {
        let op = make_op(result.grad_cell());
        result.set_backward_op(op);
    }
    result
}

/// Add two tensors
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "add: tensors must have same length");
    record(a.data() + b.data(), &[a, b], |result_grad| {
        Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad,
        })
    })
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Subtract `b` from `a` element-wise
pub fn sub(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "sub: tensors must have same length");
    record(a.data() - b.data(), &[a, b], |result_grad| {
        Rc::new(SubBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad,
        })
    })
}

struct SubBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for SubBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(-grad);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Multiply two tensors element-wise
pub fn mul(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "mul: tensors must have same length");
    record(a.data() * b.data(), &[a, b], |result_grad| {
        Rc::new(MulBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad,
        })
    })
}

struct MulBackward {
    a: Tensor,
    b: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for MulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * b
                self.a.accumulate_grad(grad * self.b.data());
            }
            if self.b.requires_grad() {
                // ∂L/∂b = ∂L/∂out * a
                self.b.accumulate_grad(grad * self.a.data());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    record(a.data() * factor, &[a], |result_grad| {
        Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad,
        })
    })
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad * self.factor);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Add a constant to every element
pub fn add_scalar(a: &Tensor, value: f32) -> Tensor {
    record(a.data() + value, &[a], |result_grad| {
        Rc::new(PassThroughBackward {
            a: a.clone(),
            result_grad,
        })
    })
}

struct PassThroughBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for PassThroughBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Element-wise exponential
pub fn exp(a: &Tensor) -> Tensor {
    let data = a.data().mapv(f32::exp);
    let output = data.clone();
    record(data, &[a], |result_grad| {
        Rc::new(ExpBackward {
            a: a.clone(),
            output,
            result_grad,
        })
    })
}

struct ExpBackward {
    a: Tensor,
    output: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for ExpBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂exp(a)/∂a = exp(a)
                self.a.accumulate_grad(grad * &self.output);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Element-wise natural logarithm
///
/// Non-positive inputs produce `-inf`/NaN, which the fitting loop reports as a
/// non-finite loss.
pub fn log(a: &Tensor) -> Tensor {
    record(a.data().mapv(f32::ln), &[a], |result_grad| {
        Rc::new(LogBackward {
            a: a.clone(),
            result_grad,
        })
    })
}

struct LogBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for LogBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂ln(a)/∂a = 1/a
                self.a.accumulate_grad(grad / self.a.data());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Logistic sigmoid
pub fn sigmoid(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| 1.0 / (1.0 + (-x).exp()));
    let output = data.clone();
    record(data, &[a], |result_grad| {
        Rc::new(SigmoidBackward {
            a: a.clone(),
            output,
            result_grad,
        })
    })
}

struct SigmoidBackward {
    a: Tensor,
    output: Array1<f32>,
    result_grad: GradCell,
}

impl BackwardOp for SigmoidBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // σ'(x) = σ(x)(1 - σ(x))
                let local = self.output.mapv(|s| s * (1.0 - s));
                self.a.accumulate_grad(grad * &local);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    record(a.data().mapv(|x| x.max(0.0)), &[a], |result_grad| {
        Rc::new(ReluBackward {
            a: a.clone(),
            result_grad,
        })
    })
}

struct ReluBackward {
    a: Tensor,
    result_grad: GradCell,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let mask = self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad * &mask);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sum of all elements, as a scalar tensor
pub fn sum(a: &Tensor) -> Tensor {
    let total = a.data().sum();
    record(Array1::from(vec![total]), &[a], |result_grad| {
        Rc::new(SumBackward {
            a: a.clone(),
            factor: 1.0,
            result_grad,
        })
    })
}

/// Mean of all elements, as a scalar tensor
pub fn mean(a: &Tensor) -> Tensor {
    let n = a.len().max(1) as f32;
    let total = a.data().sum() / n;
    record(Array1::from(vec![total]), &[a], |result_grad| {
        Rc::new(SumBackward {
            a: a.clone(),
            factor: 1.0 / n,
            result_grad,
        })
    })
}

struct SumBackward {
    a: Tensor,
    factor: f32,
    result_grad: GradCell,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // Broadcast the scalar gradient to every input element
                let g = grad[0] * self.factor;
                self.a.accumulate_grad(Array1::from_elem(self.a.len(), g));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Repeat `a` end to end `times` times
///
/// Used to broadcast a per-column vector across the rows of a flattened batch.
pub fn tile(a: &Tensor, times: usize) -> Tensor {
    let mut data = Vec::with_capacity(a.len() * times);
    for _ in 0..times {
        data.extend(a.data().iter().copied());
    }
    record(Array1::from(data), &[a], |result_grad| {
        Rc::new(TileBackward {
            a: a.clone(),
            times,
            result_grad,
        })
    })
}

struct TileBackward {
    a: Tensor,
    times: usize,
    result_grad: GradCell,
}

impl BackwardOp for TileBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                let n = self.a.len();
                let mut folded = Array1::zeros(n);
                for copy in 0..self.times {
                    for i in 0..n {
                        folded[i] += grad[copy * n + i];
                    }
                }
                self.a.accumulate_grad(folded);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Matrix multiplication of row-major matrices
///
/// `a` is `m×k`, `b` is `k×n`; the result is `m×n`.
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "matmul: a must be m*k");
    assert_eq!(b.len(), k * n, "matmul: b must be k*n");

    let data = matmul_raw(a.data(), b.data(), m, k, n);
    record(data, &[a, b], |result_grad| {
        Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad,
        })
    })
}

fn matmul_raw(a: &Array1<f32>, b: &Array1<f32>, m: usize, k: usize, n: usize) -> Array1<f32> {
    let a = a.view().into_shape_with_order((m, k)).expect("a is m*k");
    let b = b.view().into_shape_with_order((k, n)).expect("b is k*n");
    let c = a.dot(&b);
    Array1::from_iter(c.iter().copied())
}

fn transpose_raw(a: &Array1<f32>, rows: usize, cols: usize) -> Array1<f32> {
    let view = a.view().into_shape_with_order((rows, cols)).expect("shape checked");
    Array1::from_iter(view.t().iter().copied())
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: GradCell,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂A = ∂L/∂C @ Bᵀ  (m×n @ n×k)
                let b_t = transpose_raw(self.b.data(), self.k, self.n);
                self.a
                    .accumulate_grad(matmul_raw(grad, &b_t, self.m, self.n, self.k));
            }
            if self.b.requires_grad() {
                // ∂L/∂B = Aᵀ @ ∂L/∂C  (k×m @ m×n)
                let a_t = transpose_raw(self.a.data(), self.m, self.k);
                self.b
                    .accumulate_grad(matmul_raw(&a_t, grad, self.k, self.m, self.n));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}
