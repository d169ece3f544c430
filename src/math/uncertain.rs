//! First-order (linearised) uncertainty propagation.
//!
//! An `Uncertain` carries a value and enough information to compute its
//! variance after arbitrary compositions of `+ - * /`, `exp` and `ln`:
//!
//! - a gradient with respect to the parameters of one fit, together with that
//!   fit's covariance matrix (shared through an `Arc`), and
//! - an extra variance term for contributions that are independent of that fit.
//!
//! Quantities derived from the same fit therefore stay correlated (`x - x` has
//! zero variance, `A / mu` uses the `A`/`mu` covariance), while quantities from
//! different sources combine as independent. Mixing two different fits folds the
//! second one's full variance into the independent term, which drops any
//! correlation it may have with later operands.

use std::f64::consts::LN_2;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use nalgebra::DMatrix;

#[derive(Debug, Clone)]
pub struct Uncertain {
    value: f64,
    source: Option<Arc<DMatrix<f64>>>,
    // Sensitivities w.r.t. the parameters of `source`; empty when `source` is None.
    grad: Vec<f64>,
    independent_var: f64,
}

impl Uncertain {
    /// A quantity with no uncertainty.
    pub fn exact(value: f64) -> Self {
        Self {
            value,
            source: None,
            grad: Vec::new(),
            independent_var: 0.0,
        }
    }

    /// An independent quantity with the given standard deviation.
    pub fn new(value: f64, std_dev: f64) -> Self {
        Self {
            independent_var: std_dev * std_dev,
            ..Self::exact(value)
        }
    }

    /// Wrap the parameters of one fit so that their covariance is tracked.
    pub fn from_fit(values: &[f64], covariance: DMatrix<f64>) -> Vec<Self> {
        let k = values.len();
        let source = Arc::new(covariance);
        values
            .iter()
            .enumerate()
            .map(|(j, &value)| {
                let mut grad = vec![0.0; k];
                grad[j] = 1.0;
                Self {
                    value,
                    source: Some(Arc::clone(&source)),
                    grad,
                    independent_var: 0.0,
                }
            })
            .collect()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn variance(&self) -> f64 {
        let correlated = match &self.source {
            Some(cov) => {
                let k = self.grad.len();
                let mut acc = 0.0;
                for a in 0..k {
                    for b in 0..k {
                        acc += self.grad[a] * cov[(a, b)] * self.grad[b];
                    }
                }
                acc
            }
            None => 0.0,
        };
        (correlated + self.independent_var).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn exp(&self) -> Self {
        let v = self.value.exp();
        self.unary(v, v)
    }

    pub fn ln(&self) -> Self {
        self.unary(self.value.ln(), 1.0 / self.value)
    }

    pub fn log2(&self) -> Self {
        self.unary(self.value.log2(), 1.0 / (self.value * LN_2))
    }

    /// Evaluate an arbitrary scalar function of several uncertain inputs.
    ///
    /// Partial derivatives are taken by central differences, then propagated
    /// exactly like the built-in operators.
    pub fn apply<F>(inputs: &[&Uncertain], f: F) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut point: Vec<f64> = inputs.iter().map(|u| u.value).collect();
        let value = f(&point);
        let mut out = Self::exact(value);

        for (j, input) in inputs.iter().enumerate() {
            let x = point[j];
            let h = f64::EPSILON.cbrt() * x.abs().max(1.0);
            point[j] = x + h;
            let hi = f(&point);
            point[j] = x - h;
            let lo = f(&point);
            point[j] = x;
            out.accumulate(input, (hi - lo) / (2.0 * h));
        }
        out
    }

    fn unary(&self, value: f64, d: f64) -> Self {
        let mut out = Self::exact(value);
        out.accumulate(self, d);
        out
    }

    fn binary(a: &Self, b: &Self, value: f64, da: f64, db: f64) -> Self {
        let mut out = Self::exact(value);
        out.accumulate(a, da);
        out.accumulate(b, db);
        out
    }

    /// Add `d * other` to the linearised error terms of `self`.
    fn accumulate(&mut self, other: &Self, d: f64) {
        if d == 0.0 {
            return;
        }
        match &other.source {
            None => {
                self.independent_var += d * d * other.independent_var;
            }
            Some(theirs) => {
                if self.source.is_none() {
                    self.source = Some(Arc::clone(theirs));
                    self.grad = vec![0.0; other.grad.len()];
                }
                let same = self
                    .source
                    .as_ref()
                    .is_some_and(|ours| Arc::ptr_eq(ours, theirs));
                if same {
                    for (g, og) in self.grad.iter_mut().zip(&other.grad) {
                        *g += d * og;
                    }
                    self.independent_var += d * d * other.independent_var;
                } else {
                    self.independent_var += d * d * other.variance();
                }
            }
        }
    }
}

impl From<f64> for Uncertain {
    fn from(value: f64) -> Self {
        Self::exact(value)
    }
}

impl Neg for &Uncertain {
    type Output = Uncertain;
    fn neg(self) -> Uncertain {
        self.unary(-self.value, -1.0)
    }
}

impl Neg for Uncertain {
    type Output = Uncertain;
    fn neg(self) -> Uncertain {
        -&self
    }
}

fn add(a: &Uncertain, b: &Uncertain) -> Uncertain {
    Uncertain::binary(a, b, a.value + b.value, 1.0, 1.0)
}

fn sub(a: &Uncertain, b: &Uncertain) -> Uncertain {
    Uncertain::binary(a, b, a.value - b.value, 1.0, -1.0)
}

fn mul(a: &Uncertain, b: &Uncertain) -> Uncertain {
    Uncertain::binary(a, b, a.value * b.value, b.value, a.value)
}

fn div(a: &Uncertain, b: &Uncertain) -> Uncertain {
    Uncertain::binary(
        a,
        b,
        a.value / b.value,
        1.0 / b.value,
        -a.value / (b.value * b.value),
    )
}

macro_rules! impl_op {
    ($trait:ident, $method:ident, $f:ident) => {
        impl $trait<&Uncertain> for &Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: &Uncertain) -> Uncertain {
                $f(self, rhs)
            }
        }
        impl $trait<Uncertain> for Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: Uncertain) -> Uncertain {
                $f(&self, &rhs)
            }
        }
        impl $trait<&Uncertain> for Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: &Uncertain) -> Uncertain {
                $f(&self, rhs)
            }
        }
        impl $trait<Uncertain> for &Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: Uncertain) -> Uncertain {
                $f(self, &rhs)
            }
        }
        impl $trait<f64> for &Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: f64) -> Uncertain {
                $f(self, &Uncertain::exact(rhs))
            }
        }
        impl $trait<f64> for Uncertain {
            type Output = Uncertain;
            fn $method(self, rhs: f64) -> Uncertain {
                $f(&self, &Uncertain::exact(rhs))
            }
        }
        impl $trait<&Uncertain> for f64 {
            type Output = Uncertain;
            fn $method(self, rhs: &Uncertain) -> Uncertain {
                $f(&Uncertain::exact(self), rhs)
            }
        }
        impl $trait<Uncertain> for f64 {
            type Output = Uncertain;
            fn $method(self, rhs: Uncertain) -> Uncertain {
                $f(&Uncertain::exact(self), &rhs)
            }
        }
    };
}

impl_op!(Add, add, add);
impl_op!(Sub, sub, sub);
impl_op!(Mul, mul, mul);
impl_op!(Div, div, div);
