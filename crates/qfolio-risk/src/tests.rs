// Statistics engine tests

#[cfg(test)]
mod tests {
    use crate::*;
    use chrono::NaiveDate;
    use nalgebra::{DMatrix, DVector};
    use qfolio_types::{AssetId, ErrorKind, ReturnKind, ReturnSeries};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn series(rows: Vec<Vec<f64>>) -> ReturnSeries {
        let n = rows[0].len();
        let assets = (0..n).map(|i| AssetId::new(format!("A{}", i))).collect();
        let dates = (0..rows.len()).map(|t| day(t as u32 + 1)).collect();
        ReturnSeries::new(assets, dates, rows, ReturnKind::Simple).unwrap()
    }

    #[test]
    fn test_mean_and_sample_covariance() {
        let returns = series(vec![
            vec![0.01, 0.02],
            vec![0.03, 0.00],
            vec![0.02, 0.04],
        ]);

        let moments = compute_moments(&returns).unwrap();

        assert!((moments.mu()[0] - 0.02).abs() < 1e-12);
        assert!((moments.mu()[1] - 0.02).abs() < 1e-12);

        // var(a) = ((-.01)^2 + .01^2 + 0) / 2 = 1e-4
        assert!((moments.sigma()[(0, 0)] - 1e-4).abs() < 1e-12);
        // var(b) = (0 + .02^2 + .02^2) / 2 = 4e-4
        assert!((moments.sigma()[(1, 1)] - 4e-4).abs() < 1e-12);
        // cov = ((-.01)(0) + (.01)(-.02) + 0(.02)) / 2 = -1e-4
        assert!((moments.sigma()[(0, 1)] + 1e-4).abs() < 1e-12);
        assert_eq!(moments.sigma()[(0, 1)], moments.sigma()[(1, 0)]);
        assert_eq!(moments.observations(), 3);
    }

    #[test]
    fn test_annualization_scales_both_moments() {
        let returns = series(vec![vec![0.01], vec![0.03], vec![0.02]]);
        let daily = compute_moments(&returns).unwrap();
        let annual = compute_moments_annualized(&returns, 252.0).unwrap();

        assert!((annual.mu()[0] - 252.0 * daily.mu()[0]).abs() < 1e-10);
        assert!((annual.sigma()[(0, 0)] - 252.0 * daily.sigma()[(0, 0)]).abs() < 1e-10);
        assert_eq!(annual.annualization(), 252.0);
    }

    #[test]
    fn test_single_observation_is_insufficient() {
        let returns = series(vec![vec![0.01, 0.02]]);
        let err = compute_moments(&returns).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_invalid_annualization_rejected() {
        let returns = series(vec![vec![0.01], vec![0.02]]);
        assert!(compute_moments_annualized(&returns, 0.0).is_err());
        assert!(compute_moments_annualized(&returns, f64::NAN).is_err());
    }

    #[test]
    fn test_covariance_is_psd() {
        let returns = series(vec![
            vec![0.01, -0.02, 0.005],
            vec![-0.01, 0.03, 0.002],
            vec![0.02, 0.01, -0.004],
            vec![0.00, -0.01, 0.001],
        ]);
        let moments = compute_moments(&returns).unwrap();
        assert!(validate_psd(moments.sigma(), 1e-9));
    }

    #[test]
    fn test_supplied_moments_validated() {
        let assets: Vec<AssetId> = vec!["X".into(), "Y".into()];
        let mu = DVector::from_vec(vec![0.1, 0.2]);

        let good = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
        assert!(MomentsModel::new(assets.clone(), mu.clone(), good).is_ok());

        let indefinite = DMatrix::from_row_slice(2, 2, &[0.01, 0.5, 0.5, 0.01]);
        let err = MomentsModel::new(assets.clone(), mu.clone(), indefinite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let wrong_shape = DMatrix::identity(3, 3);
        let err = MomentsModel::new(assets, mu, wrong_shape).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssetMismatch);
    }

    #[test]
    fn test_objective_matches_definition() {
        let assets: Vec<AssetId> = vec!["X".into(), "Y".into()];
        let mu = DVector::from_vec(vec![0.1, 0.2]);
        let sigma = DMatrix::from_row_slice(2, 2, &[0.04, 0.0, 0.0, 0.09]);
        let moments = MomentsModel::new(assets, mu, sigma).unwrap();

        let w = DVector::from_vec(vec![0.5, 0.5]);
        let expected = 0.15 - 0.5 * 2.0 * (0.25 * 0.04 + 0.25 * 0.09);
        assert!((moments.objective(&w, 2.0) - expected).abs() < 1e-12);
        assert!((moments.largest_eigenvalue() - 0.09).abs() < 1e-12);
    }
}
