// QUBO encoding and annealing tests

#[cfg(test)]
mod tests {
    use crate::*;
    use nalgebra::{DMatrix, DVector};
    use proptest::prelude::*;
    use qfolio_risk::MomentsModel;
    use qfolio_types::{
        AssetId, CancelToken, ConstraintConfig, Constraints, Diagnostics, RunBudget, SolveStatus,
    };

    fn assets(n: usize) -> Vec<AssetId> {
        (0..n).map(|i| AssetId::new(format!("A{}", i))).collect()
    }

    fn moments(mu: Vec<f64>, sigma: Vec<f64>) -> MomentsModel {
        let n = mu.len();
        MomentsModel::new(
            assets(n),
            DVector::from_vec(mu),
            DMatrix::from_row_slice(n, n, &sigma),
        )
        .unwrap()
    }

    fn constraints(n: usize, config: ConstraintConfig) -> Constraints {
        config.validate(n).unwrap()
    }

    fn quick_params(seed: u64) -> AnnealingParams {
        AnnealingParams {
            sweeps: 300,
            restarts: 8,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_encoding_levels_include_zero_and_cap() {
        let c = constraints(
            2,
            ConstraintConfig {
                max_weight_per_asset: 0.4,
                discretization_levels: 5,
                ..Default::default()
            },
        );
        let enc = BinaryEncoding::new(assets(2), &c);

        assert_eq!(enc.num_variables(), 10);
        assert_eq!(enc.levels().len(), 5);
        assert_eq!(enc.levels()[0], 0.0);
        assert!((enc.levels()[4] - 0.4).abs() < 1e-15);
        assert_eq!(enc.index(1, 2), 7);
        assert_eq!(enc.position(7), (1, 2));
        assert!((enc.weight_of(7) - 0.2).abs() < 1e-15);
    }

    #[test]
    fn test_valid_assignment_energy_is_negated_objective() {
        let m = moments(vec![0.1, 0.05], vec![0.04, 0.01, 0.01, 0.09]);
        let c = constraints(
            2,
            ConstraintConfig {
                risk_aversion: 2.0,
                discretization_levels: 3,
                ..Default::default()
            },
        );
        let model = QuboModel::build(&m, &c, &PenaltyConfig::default()).unwrap();

        // Both assets in the middle bucket: w = (0.5, 0.5)
        let x = vec![false, true, false, false, true, false];
        let w = DVector::from_vec(vec![0.5, 0.5]);

        assert!((model.energy(&x) + m.objective(&w, 2.0)).abs() < 1e-12);
        assert!((model.energy(&x) + 0.0375).abs() < 1e-12);
    }

    #[test]
    fn test_penalties_dominate_invalid_assignments() {
        let m = moments(vec![0.1, 0.05], vec![0.04, 0.01, 0.01, 0.09]);
        let c = constraints(2, ConstraintConfig::default());
        let model = QuboModel::build(&m, &c, &PenaltyConfig::default()).unwrap();
        let k = model.encoding().levels_per_asset();

        let mut valid = vec![false; model.num_variables()];
        valid[k - 1] = true; // asset 0 fully held
        valid[k] = true; // asset 1 not held

        let none = vec![false; model.num_variables()];
        let all = vec![true; model.num_variables()];

        assert!(model.energy(&valid) < model.energy(&none));
        assert!(model.energy(&valid) < model.energy(&all));
    }

    #[test]
    fn test_coupling_is_symmetric_with_zero_diagonal() {
        let m = moments(
            vec![0.1, 0.05, 0.07],
            vec![0.04, 0.01, 0.0, 0.01, 0.09, 0.02, 0.0, 0.02, 0.05],
        );
        let c = constraints(
            3,
            ConstraintConfig {
                max_assets: Some(2),
                discretization_levels: 4,
                ..Default::default()
            },
        );
        let model = QuboModel::build(&m, &c, &PenaltyConfig::default()).unwrap();
        let j = model.coupling();

        for a in 0..model.num_variables() {
            assert_eq!(j[(a, a)], 0.0);
            for b in 0..model.num_variables() {
                assert_eq!(j[(a, b)], j[(b, a)]);
            }
        }
    }

    #[test]
    fn test_cardinality_penalty_only_when_binding() {
        let m = moments(vec![0.1, 0.05], vec![0.04, 0.0, 0.0, 0.09]);

        let free = constraints(2, ConstraintConfig::default());
        let model = QuboModel::build(&m, &free, &PenaltyConfig::default()).unwrap();
        assert!(!model.penalties().to_map().contains_key("cardinality"));

        let bound = constraints(
            2,
            ConstraintConfig {
                max_assets: Some(1),
                ..Default::default()
            },
        );
        let model = QuboModel::build(&m, &bound, &PenaltyConfig::default()).unwrap();
        assert!(model.penalties().to_map().contains_key("cardinality"));
    }

    #[test]
    fn test_penalty_scales_with_risk_and_return() {
        let m = moments(vec![0.1, -0.3], vec![0.5, 0.0, 0.0, 0.2]);
        let p = PenaltyConfig::default().coefficient_for(&m, 2.0).unwrap();
        // 10 * (2 * 0.5 + 0.3) + 1
        assert!((p - 14.0).abs() < 1e-9);

        let fixed = PenaltyConfig {
            coefficient: Some(3.0),
            ..Default::default()
        };
        assert_eq!(fixed.coefficient_for(&m, 2.0).unwrap(), 3.0);

        let bad = PenaltyConfig {
            coefficient: Some(-1.0),
            ..Default::default()
        };
        assert!(bad.coefficient_for(&m, 2.0).is_err());
    }

    #[test]
    fn test_decode_takes_first_bucket_and_counts_violations() {
        let c = constraints(
            3,
            ConstraintConfig {
                discretization_levels: 3,
                ..Default::default()
            },
        );
        let enc = BinaryEncoding::new(assets(3), &c);
        let x = vec![
            false, true, true, // two buckets set
            false, false, false, // none set
            false, false, true, // valid
        ];

        let decoded = decode_assignment(&enc, &x);

        assert_eq!(decoded.values, vec![0.5, 0.0, 1.0]);
        assert_eq!(decoded.one_hot_violations, 2);
    }

    #[test]
    fn test_finalize_keeps_largest_and_normalizes() {
        let c = constraints(
            3,
            ConstraintConfig {
                max_assets: Some(2),
                ..Default::default()
            },
        );
        let out = finalize_weights(&[0.2, 0.6, 0.4], &c);

        assert!(out.feasible);
        assert_eq!(out.values[0], 0.0);
        assert!((out.values[1] - 0.6).abs() < 1e-12);
        assert!((out.values[2] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_finalize_water_fills_caps() {
        let c = constraints(
            3,
            ConstraintConfig {
                max_weight_per_asset: 0.5,
                ..Default::default()
            },
        );
        let out = finalize_weights(&[0.9, 0.3, 0.3], &c);

        assert!(out.feasible);
        assert!((out.values[0] - 0.5).abs() < 1e-12);
        assert!((out.values[1] - 0.25).abs() < 1e-12);
        assert!((out.values[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_finalize_flags_unrepairable_weights() {
        let c = constraints(
            2,
            ConstraintConfig {
                max_weight_per_asset: 0.5,
                ..Default::default()
            },
        );
        assert!(!finalize_weights(&[0.0, 0.0], &c).feasible);
        assert!(!finalize_weights(&[0.5, 0.0], &c).feasible);
    }

    #[test]
    fn test_atomic_best_keeps_minimum() {
        let best = AtomicBest::new();
        assert!(best.get().is_infinite());
        assert!(best.offer(3.0));
        assert!(!best.offer(4.0));
        assert!(best.offer(-1.0));
        assert_eq!(best.get(), -1.0);
    }

    #[test]
    fn test_atomic_best_under_contention() {
        use rayon::prelude::*;
        let best = AtomicBest::new();
        (0..1000).into_par_iter().for_each(|i| {
            best.offer(1000.0 - i as f64);
        });
        assert_eq!(best.get(), 1.0);
    }

    #[test]
    fn test_single_asset_limit_picks_best_asset() {
        let m = moments(
            vec![0.05, 0.20, 0.08],
            vec![0.04, 0.0, 0.0, 0.0, 0.04, 0.0, 0.0, 0.0, 0.04],
        );
        let c = constraints(
            3,
            ConstraintConfig {
                max_assets: Some(1),
                discretization_levels: 5,
                ..Default::default()
            },
        );

        let result = SimulatedAnnealer::new(quick_params(7))
            .solve(&m, &c, &RunBudget::unlimited())
            .unwrap();

        assert_eq!(result.status, SolveStatus::Feasible);
        assert!(!result.infeasible);
        assert_eq!(result.weights.active_count(1e-9), 1);
        assert!((result.weights.get(&AssetId::new("A1")).unwrap() - 1.0).abs() < 1e-12);
        assert!(result.constraint_satisfaction.all_satisfied());
    }

    #[test]
    fn test_negligible_penalty_yields_flagged_result() {
        // Strong returns and a vanishing penalty make stacking buckets pay off
        let m = moments(
            vec![0.50, 0.60, 0.40],
            vec![0.04, 0.0, 0.0, 0.0, 0.04, 0.0, 0.0, 0.0, 0.04],
        );
        let c = constraints(
            3,
            ConstraintConfig {
                discretization_levels: 5,
                ..Default::default()
            },
        );
        let params = AnnealingParams {
            penalty: PenaltyConfig {
                coefficient: Some(1e-9),
                ..Default::default()
            },
            ..quick_params(5)
        };

        let result = SimulatedAnnealer::new(params)
            .solve(&m, &c, &RunBudget::unlimited())
            .unwrap();

        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.infeasible);
        assert!(result.is_infeasible());
        match &result.diagnostics {
            Diagnostics::Qubo {
                one_hot_violations, ..
            } => assert!(*one_hot_violations > 0),
            other => panic!("unexpected diagnostics {:?}", other),
        }
        assert!(result.warning().is_some());
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let m = moments(
            vec![0.10, 0.12, 0.07, 0.09],
            vec![
                0.04, 0.01, 0.00, 0.01, //
                0.01, 0.09, 0.02, 0.00, //
                0.00, 0.02, 0.03, 0.01, //
                0.01, 0.00, 0.01, 0.05,
            ],
        );
        let c = constraints(
            4,
            ConstraintConfig {
                max_assets: Some(3),
                max_weight_per_asset: 0.6,
                discretization_levels: 6,
                ..Default::default()
            },
        );
        let annealer = SimulatedAnnealer::new(quick_params(11));

        let a = annealer.solve(&m, &c, &RunBudget::unlimited()).unwrap();
        let b = annealer.solve(&m, &c, &RunBudget::unlimited()).unwrap();

        assert_eq!(a.weights, b.weights);
        assert_eq!(a.objective_value, b.objective_value);
        assert_eq!(a.status, b.status);
        assert_eq!(a.diagnostics, b.diagnostics);
    }

    #[test]
    fn test_diagnostics_report_every_restart() {
        let m = moments(vec![0.1, 0.1], vec![0.04, 0.0, 0.0, 0.04]);
        let c = constraints(2, ConstraintConfig::default());

        let result = SimulatedAnnealer::new(quick_params(3))
            .solve(&m, &c, &RunBudget::unlimited())
            .unwrap();

        match &result.diagnostics {
            Diagnostics::Qubo {
                num_variables,
                restarts,
                restart_energies,
                best_energy,
                ..
            } => {
                assert_eq!(*num_variables, 20);
                assert_eq!(*restarts, 8);
                assert_eq!(restart_energies.len(), 8);
                assert!(restart_energies.iter().all(|e| *e >= *best_energy - 1e-12));
            }
            other => panic!("unexpected diagnostics {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_run_returns_best_effort() {
        let m = moments(vec![0.1, 0.1], vec![0.04, 0.0, 0.0, 0.04]);
        let c = constraints(2, ConstraintConfig::default());
        let token = CancelToken::new();
        token.cancel();

        let result = SimulatedAnnealer::new(quick_params(1))
            .solve(&m, &c, &RunBudget::new(token, None))
            .unwrap();

        assert_eq!(result.status, SolveStatus::Cancelled);
        assert_eq!(result.weights.len(), 2);
    }

    #[test]
    fn test_invalid_temperature_is_rejected() {
        let m = moments(vec![0.1], vec![0.04]);
        let c = constraints(1, ConstraintConfig::default());
        let params = AnnealingParams {
            initial_temperature: Some(0.0),
            ..quick_params(1)
        };

        assert!(SimulatedAnnealer::new(params)
            .solve(&m, &c, &RunBudget::unlimited())
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_flip_delta_matches_energy_change(
            bits in prop::collection::vec(any::<bool>(), 12),
            flip in 0usize..12,
            lambda in 0.0f64..5.0,
        ) {
            let m = moments(
                vec![0.1, 0.05, 0.07],
                vec![0.04, 0.01, 0.0, 0.01, 0.09, 0.02, 0.0, 0.02, 0.05],
            );
            let c = constraints(3, ConstraintConfig {
                max_assets: Some(2),
                risk_aversion: lambda,
                discretization_levels: 4,
                ..Default::default()
            });
            let model = QuboModel::build(&m, &c, &PenaltyConfig::default()).unwrap();

            let mut x = bits.clone();
            let mut fields = model.local_fields(&x);
            let before = model.energy(&x);
            let delta = model.flip_delta(&fields, &x, flip);
            model.apply_flip(&mut fields, &mut x, flip);

            prop_assert!((model.energy(&x) - before - delta).abs() < 1e-9);
            let fresh = model.local_fields(&x);
            for (a, b) in fields.iter().zip(fresh.iter()) {
                prop_assert!((a - b).abs() < 1e-9);
            }
        }

        #[test]
        fn prop_finalized_weights_respect_constraints(
            raw in prop::collection::vec(0.0f64..1.0, 4),
            max_assets in 1usize..=4,
        ) {
            let c = constraints(4, ConstraintConfig {
                max_assets: Some(max_assets),
                max_weight_per_asset: 0.8,
                ..Default::default()
            });
            let out = finalize_weights(&raw, &c);
            if out.feasible {
                let sum: f64 = out.values.iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
                prop_assert!(out.values.iter().all(|w| *w <= 0.8 + 1e-12));
                prop_assert!(out.values.iter().filter(|w| **w > 1e-9).count() <= max_assets);
            }
        }
    }
}
