use nalgebra::{DMatrix, DVector};

/// Average a square matrix with its transpose
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}

/// Validate that a matrix is symmetric positive semi-definite.
/// Uses the symmetric eigendecomposition; eigenvalues down to
/// `-tolerance * max(1, |λ_max|)` are accepted as round-off.
pub fn validate_psd(matrix: &DMatrix<f64>, tolerance: f64) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return false;
    }

    let n = matrix.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > tolerance {
                return false;
            }
        }
    }

    let eigen = symmetrize(matrix).symmetric_eigenvalues();
    let max_abs = eigen.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    eigen.iter().all(|&v| v >= -tolerance * max_abs)
}

/// Largest eigenvalue of a symmetric matrix (0 for an empty matrix)
pub fn largest_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    symmetrize(matrix)
        .symmetric_eigenvalues()
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// xᵀ M x
pub fn quad_form(matrix: &DMatrix<f64>, x: &DVector<f64>) -> f64 {
    x.dot(&(matrix * x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psd_validation() {
        let positive_diag = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert!(validate_psd(&positive_diag, 1e-10));

        let zero_diag = DMatrix::from_diagonal(&DVector::from_vec(vec![0.0, 0.0, 0.0]));
        assert!(validate_psd(&zero_diag, 1e-10));

        // Eigenvalues 3 and -1
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(!validate_psd(&indefinite, 1e-10));

        let asymmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(!validate_psd(&asymmetric, 1e-10));
    }

    #[test]
    fn test_largest_eigenvalue() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        assert!((largest_eigenvalue(&m) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_quad_form() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        // 2 + 2*0.5*2 + 4 = 8
        assert!((quad_form(&m, &x) - 8.0).abs() < 1e-12);
    }
}
