use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use nalgebra::DMatrix;
use qfolio_types::Result;
use serde::{Deserialize, Serialize};

use crate::{QpModel, QpSolution, QpStatus, SolverBackend};

/// Rows whose bounds are closer than this are treated as equalities
const EQUALITY_GAP: f64 = 1e-12;
/// Entries at or below this magnitude are left out of the sparse matrices
const DROP_TOLERANCE: f64 = 1e-14;

/// Interior-point settings passed through to Clarabel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClarabelSettings {
    pub max_iter: u32,
    /// Absolute and relative duality-gap tolerance
    pub tolerance: f64,
    pub verbose: bool,
}

impl Default for ClarabelSettings {
    fn default() -> Self {
        ClarabelSettings {
            max_iter: 10_000,
            tolerance: 1e-10,
            verbose: false,
        }
    }
}

/// Clarabel interior-point backend (pure Rust)
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {
    settings: ClarabelSettings,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ClarabelSettings) -> Self {
        ClarabelSolver { settings }
    }

    pub fn settings(&self) -> &ClarabelSettings {
        &self.settings
    }

    fn clarabel_settings(&self) -> DefaultSettings<f64> {
        let mut settings = DefaultSettings::default();
        settings.verbose = self.settings.verbose;
        settings.max_iter = self.settings.max_iter;
        settings.tol_gap_abs = self.settings.tolerance;
        settings.tol_gap_rel = self.settings.tolerance;
        settings
    }
}

/// One row of the conic form Ax + s = b: `sign` times row `source` of the
/// model's A. The slack is zero for equalities, nonnegative otherwise.
struct ConeRow {
    source: usize,
    sign: f64,
    rhs: f64,
    equality: bool,
}

impl ConeRow {
    fn cone(&self) -> SupportedConeT<f64> {
        if self.equality {
            SupportedConeT::ZeroConeT(1)
        } else {
            SupportedConeT::NonnegativeConeT(1)
        }
    }
}

/// Split l ≤ Ax ≤ u into zero-cone rows for equalities and one
/// nonnegative-cone row per finite side otherwise
fn cone_rows(model: &QpModel) -> Vec<ConeRow> {
    let mut rows = Vec::with_capacity(2 * model.num_constraints());
    for (i, (&lo, &hi)) in model.l.iter().zip(model.u.iter()).enumerate() {
        if lo.is_finite() && hi.is_finite() && (hi - lo).abs() <= EQUALITY_GAP {
            rows.push(ConeRow {
                source: i,
                sign: 1.0,
                rhs: lo,
                equality: true,
            });
            continue;
        }
        // -A_i x + s = -l_i
        if lo.is_finite() {
            rows.push(ConeRow {
                source: i,
                sign: -1.0,
                rhs: -lo,
                equality: false,
            });
        }
        // A_i x + s = u_i
        if hi.is_finite() {
            rows.push(ConeRow {
                source: i,
                sign: 1.0,
                rhs: hi,
                equality: false,
            });
        }
    }
    rows
}

/// Column-major sparse copy of the entries `entry(row, col)` returns
fn to_csc<F>(nrows: usize, ncols: usize, entry: F) -> CscMatrix<f64>
where
    F: Fn(usize, usize) -> Option<f64>,
{
    let mut colptr = Vec::with_capacity(ncols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);

    for col in 0..ncols {
        for row in 0..nrows {
            if let Some(v) = entry(row, col).filter(|v| v.abs() > DROP_TOLERANCE) {
                rowval.push(row);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }

    CscMatrix {
        m: nrows,
        n: ncols,
        colptr,
        rowval,
        nzval,
    }
}

fn upper_triangle(p: &DMatrix<f64>) -> CscMatrix<f64> {
    to_csc(p.nrows(), p.ncols(), |r, c| (r <= c).then(|| p[(r, c)]))
}

fn status_of(status: SolverStatus) -> QpStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => QpStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            QpStatus::PrimalInfeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            QpStatus::DualInfeasible
        }
        SolverStatus::MaxIterations => QpStatus::MaxIterations,
        _ => QpStatus::Unsolved,
    }
}

/// Interior-point iterates sit strictly inside their bounds. Rows that
/// touch a single variable are plain bounds on it, so project onto them to
/// make pinned and capped weights exact.
fn clamp_to_variable_bounds(model: &QpModel, x: &mut [f64]) {
    for (i, row) in model.a.row_iter().enumerate() {
        let mut touched = row
            .iter()
            .enumerate()
            .filter(|(_, v)| v.abs() > 1e-10);
        let (j, coeff) = match (touched.next(), touched.next()) {
            (Some((j, &coeff)), None) => (j, coeff),
            _ => continue,
        };

        let (a, b) = (model.l[i] / coeff, model.u[i] / coeff);
        let (lo, hi) = if coeff > 0.0 { (a, b) } else { (b, a) };
        if lo.is_finite() {
            x[j] = x[j].max(lo);
        }
        if hi.is_finite() {
            x[j] = x[j].min(hi);
        }
    }
}

impl SolverBackend for ClarabelSolver {
    fn solve_qp(&self, model: &QpModel) -> Result<QpSolution> {
        model.validate()?;
        let n = model.num_vars();

        if model
            .l
            .iter()
            .zip(model.u.iter())
            .any(|(lo, hi)| *lo > *hi + EQUALITY_GAP)
        {
            return Ok(QpSolution::infeasible(n));
        }

        let rows = cone_rows(model);
        let a = to_csc(rows.len(), n, |r, c| {
            let row = &rows[r];
            Some(row.sign * model.a[(row.source, c)])
        });
        let b: Vec<f64> = rows.iter().map(|r| r.rhs).collect();
        let cones: Vec<SupportedConeT<f64>> = rows.iter().map(ConeRow::cone).collect();

        let mut solver = DefaultSolver::new(
            &upper_triangle(&model.p),
            model.q.as_slice(),
            &a,
            &b,
            &cones,
            self.clarabel_settings(),
        );
        solver.solve();

        let mut x = solver.solution.x.clone();
        clamp_to_variable_bounds(model, &mut x);

        Ok(QpSolution {
            x,
            status: status_of(solver.solution.status),
            objective: solver.solution.obj_val,
            iterations: solver.info.iterations as usize,
        })
    }
}
