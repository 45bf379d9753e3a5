//! Least-squares fit of the linear recession curve with `argmin`.
//!
//! The curve `rate(h) = -a·h + b` is fitted in the centred form
//! `rate(h) = -a·(h - h̄) + c`, which decouples the two parameters, and
//! mapped back with `b = c + a·h̄`. The sum of squared residuals is minimised
//! with Nelder-Mead under a finite iteration budget; running out of budget is
//! reported as a divergence, never as a partial result.

use argmin::core::{
    ArgminError, CostFunction, Error, Executor, State, TerminationReason, TerminationStatus,
};
use argmin::solver::neldermead::NelderMead;
use ndarray::{Array1, array};

use crate::config::FitOptions;
use crate::model::RechargeError;

/// Parameter vector `[a, c]` in centred coordinates.
pub type Theta = Array1<f64>;

/// Sum of squared residuals between observed fall rates and the centred curve.
#[derive(Debug, Clone)]
pub struct CenteredRecession {
    elevations: Vec<f64>,
    rates: Vec<f64>,
    mean_elevation: f64,
}

impl CenteredRecession {
    pub fn new(elevations: &[f64], rates: &[f64]) -> Self {
        let mean_elevation = mean(elevations);
        Self {
            elevations: elevations.to_vec(),
            rates: rates.to_vec(),
            mean_elevation,
        }
    }

    pub fn ssr(&self, a: f64, c: f64) -> f64 {
        self.elevations
            .iter()
            .zip(&self.rates)
            .map(|(h, r)| {
                let residual = r - (-a * (h - self.mean_elevation) + c);
                residual * residual
            })
            .sum()
    }

    /// Starting simplex: a flat curve through the mean rate, plus one step
    /// along each parameter scaled to the spread of the data.
    fn initial_simplex(&self) -> Vec<Theta> {
        let mean_rate = mean(&self.rates);
        let rate_spread = max_abs_deviation(&self.rates, mean_rate);
        let elevation_spread = max_abs_deviation(&self.elevations, self.mean_elevation);

        let step_c = rate_spread.max(1e-6 * (1.0 + mean_rate.abs()));
        let step_a = step_c / elevation_spread.max(f64::EPSILON);

        vec![
            array![0.0, mean_rate],
            array![step_a, mean_rate],
            array![0.0, mean_rate + step_c],
        ]
    }
}

impl CostFunction for CenteredRecession {
    type Param = Theta;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let ssr = self.ssr(theta[0], theta[1]);
        if !ssr.is_finite() {
            return Err(ArgminError::InvalidParameter {
                text: format!("sum of squared residuals is not finite at {}", theta),
            }
            .into());
        }
        Ok(ssr)
    }
}

/// Optimal curve in the original `(a, b)` parametrisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresSolution {
    pub a: f64,
    pub b: f64,
    pub ssr: f64,
    pub iterations: u64,
}

/// Minimises the squared residuals of `rates` against `-a·h + b`.
///
/// Callers must ensure at least two distinct elevations.
pub fn least_squares(
    elevations: &[f64],
    rates: &[f64],
    opts: &FitOptions,
) -> Result<LeastSquaresSolution, RechargeError> {
    let problem = CenteredRecession::new(elevations, rates);
    let mean_elevation = problem.mean_elevation;

    let simplex = problem.initial_simplex();
    let ssr0 = problem.ssr(simplex[0][0], simplex[0][1]);
    let solver = NelderMead::new(simplex).with_sd_tolerance(opts.sd_tolerance * (1.0 + ssr0))?;

    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(opts.max_iters))
        .run()?;

    let state = result.state();
    let iterations = state.get_iter();
    match state.get_termination_status() {
        TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
        other => {
            return Err(RechargeError::FitDivergence {
                iterations,
                status: format!("{:?}", other),
            });
        }
    }

    let theta = state.get_best_param().ok_or_else(|| RechargeError::FitDivergence {
        iterations,
        status: "optimizer returned no parameters".to_string(),
    })?;

    let a = theta[0];
    let b = theta[1] + a * mean_elevation;
    if !(a.is_finite() && b.is_finite()) {
        return Err(RechargeError::FitDivergence {
            iterations,
            status: format!("non-finite parameters a = {}, b = {}", a, b),
        });
    }

    Ok(LeastSquaresSolution {
        a,
        b,
        ssr: state.get_best_cost(),
        iterations,
    })
}

/// Standard errors of `(a, b)` from the covariance estimate `s²·(JᵀJ)⁻¹`.
///
/// The Jacobian rows are `[-h, 1]`, so `(JᵀJ)⁻¹` has the closed form used
/// below. With two observations `s²` is undefined and both errors are `+∞`.
pub fn standard_errors(elevations: &[f64], ssr: f64) -> Result<(f64, f64), RechargeError> {
    let n = elevations.len();
    let h_mean = mean(elevations);
    let sxx: f64 = elevations.iter().map(|h| (h - h_mean).powi(2)).sum();
    if !(sxx > 0.0) {
        return Err(RechargeError::InsufficientData(
            "recession fit needs falls at two or more distinct elevations".to_string(),
        ));
    }

    if n <= 2 {
        return Ok((f64::INFINITY, f64::INFINITY));
    }

    let s2 = ssr / (n - 2) as f64;
    let sum_h2: f64 = elevations.iter().map(|h| h * h).sum();
    let var_a = s2 / sxx;
    let var_b = s2 * sum_h2 / (n as f64 * sxx);
    Ok((var_a.sqrt(), var_b.sqrt()))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn max_abs_deviation(values: &[f64], center: f64) -> f64 {
    values.iter().map(|v| (v - center).abs()).fold(0.0, f64::max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
