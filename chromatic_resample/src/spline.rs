//! One-dimensional interpolation kernels.
//!
//! Two families are provided:
//!
//! - step interpolants (`nearest`, `previous`, `next`), piecewise constant;
//! - interpolating B-splines of degree 1, 2 and 3 (`linear`, `quadratic`,
//!   `cubic`). Degree 1 places knots on the data points, degree 3 uses the
//!   not-a-knot condition, degree 2 puts interior knots on interval midpoints
//!   with the first and last midpoint omitted.
//!
//! Outside the fitted range every kernel keeps evaluating the polynomial
//! piece of the boundary interval. For step kernels this is the boundary
//! value, for `linear` the boundary slope, for `quadratic`/`cubic` the
//! boundary polynomial.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pivot magnitude below which the collocation system is treated as singular.
/// Basis values lie in `[0, 1]`, so an absolute bound is adequate.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Interpolation method applied to every channel of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationKind {
    Nearest,
    Previous,
    Next,
    #[default]
    Linear,
    Quadratic,
    Cubic,
}

impl InterpolationKind {
    pub fn all() -> [InterpolationKind; 6] {
        [
            InterpolationKind::Nearest,
            InterpolationKind::Previous,
            InterpolationKind::Next,
            InterpolationKind::Linear,
            InterpolationKind::Quadratic,
            InterpolationKind::Cubic,
        ]
    }

    /// Polynomial degree of each piece
    pub fn degree(&self) -> usize {
        match self {
            InterpolationKind::Nearest | InterpolationKind::Previous | InterpolationKind::Next => 0,
            InterpolationKind::Linear => 1,
            InterpolationKind::Quadratic => 2,
            InterpolationKind::Cubic => 3,
        }
    }

    /// Minimum number of distinct knots needed to fit this kind
    pub fn min_points(&self) -> usize {
        (self.degree() + 1).max(2)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationKind::Nearest => "nearest",
            InterpolationKind::Previous => "previous",
            InterpolationKind::Next => "next",
            InterpolationKind::Linear => "linear",
            InterpolationKind::Quadratic => "quadratic",
            InterpolationKind::Cubic => "cubic",
        }
    }
}

impl fmt::Display for InterpolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        InterpolationKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| format!("unknown interpolation kind '{}'", s))
    }
}

/// Reasons a kernel cannot be fitted to a point set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("needs at least {required} points, got {got}")]
    TooFewPoints { required: usize, got: usize },

    #[error("x and y lengths differ ({x_len} vs {y_len})")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("x values must be strictly increasing (index {index}: {previous} then {current})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("collocation matrix is singular at column {column}")]
    Singular { column: usize },
}

/// A fitted one-dimensional function.
pub trait Interpolant: Send + Sync {
    /// Evaluate at `x`, extrapolating outside the fitted range
    fn evaluate(&self, x: f64) -> f64;

    /// Smallest and largest fitted x
    fn domain(&self) -> (f64, f64);

    fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

/// Fit a kernel of the given kind through `(xs, ys)`.
///
/// `xs` must be strictly increasing and contain at least
/// [`InterpolationKind::min_points`] values.
pub fn fit(
    kind: InterpolationKind,
    xs: &[f64],
    ys: &[f64],
) -> Result<Box<dyn Interpolant>, FitError> {
    validate_points(kind, xs, ys)?;

    let interpolant: Box<dyn Interpolant> = match kind {
        InterpolationKind::Nearest => Box::new(StepInterpolant::new(StepMode::Nearest, xs, ys)),
        InterpolationKind::Previous => Box::new(StepInterpolant::new(StepMode::Previous, xs, ys)),
        InterpolationKind::Next => Box::new(StepInterpolant::new(StepMode::Next, xs, ys)),
        InterpolationKind::Linear | InterpolationKind::Quadratic | InterpolationKind::Cubic => {
            Box::new(BSpline::interpolate(xs, ys, kind.degree())?)
        }
    };
    Ok(interpolant)
}

fn validate_points(kind: InterpolationKind, xs: &[f64], ys: &[f64]) -> Result<(), FitError> {
    if xs.len() != ys.len() {
        return Err(FitError::LengthMismatch {
            x_len: xs.len(),
            y_len: ys.len(),
        });
    }
    if xs.len() < kind.min_points() {
        return Err(FitError::TooFewPoints {
            required: kind.min_points(),
            got: xs.len(),
        });
    }
    if let Some(index) = xs
        .iter()
        .zip(ys)
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(FitError::NonFinite { index });
    }
    if let Some(index) = (1..xs.len()).find(|&i| xs[i] <= xs[i - 1]) {
        return Err(FitError::NotIncreasing {
            index,
            previous: xs[index - 1],
            current: xs[index],
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepMode {
    Nearest,
    Previous,
    Next,
}

/// Piecewise-constant kernel.
#[derive(Debug, Clone)]
pub struct StepInterpolant {
    mode: StepMode,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl StepInterpolant {
    fn new(mode: StepMode, xs: &[f64], ys: &[f64]) -> Self {
        Self {
            mode,
            xs: xs.to_vec(),
            ys: ys.to_vec(),
        }
    }
}

impl Interpolant for StepInterpolant {
    fn evaluate(&self, x: f64) -> f64 {
        let n = self.xs.len();
        match self.mode {
            StepMode::Previous => {
                let idx = self.xs.partition_point(|&v| v <= x);
                self.ys[idx.saturating_sub(1)]
            }
            StepMode::Next => {
                let idx = self.xs.partition_point(|&v| v < x);
                self.ys[idx.min(n - 1)]
            }
            StepMode::Nearest => {
                let idx = self.xs.partition_point(|&v| v < x);
                if idx == 0 {
                    return self.ys[0];
                }
                if idx == n {
                    return self.ys[n - 1];
                }
                // Exact midpoints resolve to the lower knot.
                if x - self.xs[idx - 1] <= self.xs[idx] - x {
                    self.ys[idx - 1]
                } else {
                    self.ys[idx]
                }
            }
        }
    }

    fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }
}

/// Interpolating B-spline with clamped end knots.
#[derive(Debug, Clone)]
pub struct BSpline {
    degree: usize,
    knots: Vec<f64>,
    coefficients: Vec<f64>,
}

impl BSpline {
    /// Solve for the spline of `degree` passing through every `(xs[i], ys[i])`.
    pub fn interpolate(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, FitError> {
        let n = xs.len();
        if degree == 0 || n < degree + 1 {
            return Err(FitError::TooFewPoints {
                required: degree.max(1) + 1,
                got: n,
            });
        }

        let knots = interpolation_knots(xs, degree);
        let mut collocation = Array2::<f64>::zeros((n, n));
        for (row, &x) in xs.iter().enumerate() {
            let span = find_span(&knots, degree, n, x);
            let basis = basis_functions(&knots, degree, span, x);
            for (offset, value) in basis.into_iter().enumerate() {
                collocation[[row, span - degree + offset]] = value;
            }
        }

        let coefficients = solve_dense(collocation, Array1::from(ys.to_vec()))?;
        Ok(Self {
            degree,
            knots,
            coefficients: coefficients.to_vec(),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Interpolant for BSpline {
    fn evaluate(&self, x: f64) -> f64 {
        let n = self.coefficients.len();
        let span = find_span(&self.knots, self.degree, n, x);
        basis_functions(&self.knots, self.degree, span, x)
            .into_iter()
            .enumerate()
            .map(|(offset, basis)| basis * self.coefficients[span - self.degree + offset])
            .sum()
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }
}

/// Knot vector of length `n + degree + 1` with `degree + 1` fold end knots.
fn interpolation_knots(xs: &[f64], degree: usize) -> Vec<f64> {
    let n = xs.len();
    let (first, last) = (xs[0], xs[n - 1]);

    let interior: Vec<f64> = if degree % 2 == 1 {
        let skip = (degree - 1) / 2 + 1;
        xs[skip..n - skip].to_vec()
    } else {
        let midpoints: Vec<f64> = xs.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        let skip = degree / 2;
        midpoints[skip..midpoints.len() - skip].to_vec()
    };

    let mut knots = Vec::with_capacity(n + degree + 1);
    knots.extend(std::iter::repeat(first).take(degree + 1));
    knots.extend(interior);
    knots.extend(std::iter::repeat(last).take(degree + 1));
    knots
}

/// Index `m` in `[degree, n - 1]` of the polynomial piece used at `x`.
///
/// Points below the first knot use the first piece and points at or above the
/// last knot use the last piece, which is what makes extrapolation extend
/// the boundary polynomial.
fn find_span(knots: &[f64], degree: usize, n: usize, x: f64) -> usize {
    degree + knots[degree + 1..n].partition_point(|&t| t <= x)
}

/// Non-zero basis functions `B[span - degree ..= span]` of the piece `span`,
/// evaluated as a polynomial at `x` (Cox-de Boor triangle).
fn basis_functions(knots: &[f64], degree: usize, span: usize, x: f64) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;

    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }

    values
}

/// Gaussian elimination with partial pivoting.
fn solve_dense(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, FitError> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < SINGULAR_EPSILON {
            return Err(FitError::Singular { column: col });
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
            }
            b.swap(col, pivot);
        }

        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut solution = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|j| a[[row, j]] * solution[j]).sum();
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(solution)
}
