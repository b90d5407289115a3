use bayes_binning::diagnostics::prombs_self_test;
use bayes_binning::{
    Algorithm, BinData, BinScore, Binning, BinningOptions, Context, DirichletModel, UtilityKind,
};

/// Two event types with a switch after position 3 and a forbidden long bin.
fn data() -> BinData {
    let len = 7;
    let observations = [
        vec![4.0, 5.0, 3.0, 4.0, 1.0, 0.0, 1.0],
        vec![1.0, 0.0, 1.0, 1.0, 4.0, 5.0, 3.0],
    ];
    let cumulate = |x: &[f64]| -> Vec<Vec<f64>> {
        (0..len)
            .map(|i| {
                (0..len)
                    .map(|j| if j >= i { x[i..=j].iter().sum() } else { 0.0 })
                    .collect()
            })
            .collect()
    };
    let counts = observations.iter().map(|x| cumulate(x)).collect();
    let alpha = (0..2).map(|_| cumulate(&[1.0; 7])).collect();
    let mut gamma: Vec<Vec<f64>> = (0..len)
        .map(|i| (0..len).map(|j| if j >= i { 1.0 } else { 0.0 }).collect())
        .collect();
    gamma[0][6] = 0.0;
    let mut beta = vec![1.0; len];
    beta[6] = 0.0;
    BinData::new(counts, alpha, beta, gamma).unwrap()
}

#[test]
fn switch_point_dominates_break_probabilities() {
    let d = data();
    let opts = BinningOptions::builder()
        .with_break_probabilities()
        .with_model_posterior()
        .build()
        .unwrap();
    let r = Binning::new(&d, opts).unwrap().run().unwrap();
    let bp = r.break_probabilities.unwrap();
    let best = (1..7).max_by(|&a, &b| bp[a].total_cmp(&bp[b])).unwrap();
    assert_eq!(best, 4);
    let post = r.model_posterior.unwrap();
    // The single bin is forbidden and seven bins have no prior mass.
    assert_eq!(post[0], 0.0);
    assert_eq!(post[6], 0.0);
    assert!((post.iter().sum::<f64>() - 1.0).abs() < 1e-10);
}

#[test]
fn every_query_runs_on_every_exact_backend() {
    let d = data();
    for algorithm in [Algorithm::Exact, Algorithm::Tree] {
        let opts = BinningOptions::builder()
            .with_algorithm(algorithm)
            .with_threads(2)
            .with_break_probabilities()
            .with_model_posterior()
            .with_moments(3)
            .with_density(0.1)
            .with_entropy()
            .with_utility(UtilityKind::Entropy)
            .build()
            .unwrap();
        let r = Binning::new(&d, opts).unwrap().run().unwrap();
        assert!(r.evidence.unwrap().is_finite());
        assert_eq!(r.moments.len(), 3);
        for pos in 0..7 {
            // E[p] >= E[p^2] >= E[p^3] for p in [0, 1].
            assert!(r.moments[0][pos] >= r.moments[1][pos]);
            assert!(r.moments[1][pos] >= r.moments[2][pos]);
        }
        let density = r.density.unwrap();
        assert_eq!(density.len(), 7);
        assert_eq!(density[0].len(), 11);
        assert!(r.entropy.unwrap() > 0.0);
        let u = r.utility.unwrap();
        assert_eq!(u.utility.len(), 7);
        assert_eq!(u.expectation.len(), 2);
    }
}

#[test]
fn effective_counts_exceed_own_observations() {
    let d = data();
    let run = |kind| {
        let opts = BinningOptions::builder().with_utility(kind).build().unwrap();
        Binning::new(&d, opts).unwrap().run().unwrap().utility.unwrap()
    };
    let counts = run(UtilityKind::EffectiveCounts);
    let posterior = run(UtilityKind::EffectivePosteriorCounts);
    for pos in 0..7 {
        let own = d.count(0, pos, pos) + d.count(1, pos, pos);
        assert!(-counts.utility[pos] >= own - 1e-9);
        // Pseudo-counts add at least one per event type.
        assert!(-posterior.utility[pos] >= -counts.utility[pos] + 2.0 - 1e-9);
    }
}

#[test]
fn density_range_limits_the_grid() {
    let d = data();
    let opts = BinningOptions::builder()
        .with_density(0.1)
        .with_density_range(0.3, 0.6)
        .with_which(1)
        .build()
        .unwrap();
    let density = Binning::new(&d, opts).unwrap().run().unwrap().density.unwrap();
    for row in &density {
        for (s, v) in row.iter().enumerate() {
            let p = s as f64 * 0.1;
            if p < 0.3 - 1e-9 || p > 0.6 + 1e-9 {
                assert_eq!(*v, 0.0);
            }
        }
    }
}

#[test]
fn self_test_on_the_bin_score() {
    let d = data();
    let ctx = Context::new();
    let model = DirichletModel::new(&d, &ctx);
    // Log marginal likelihoods of counts are negative, so -f is a valid value.
    assert!(model.score(0, 3) < 0.0);
    let t = prombs_self_test(&model, d.len(), 1e-6).unwrap();
    assert!(t.evidence.is_finite());
    assert!(t.mean() > 0.0);
    assert_eq!(t.plain.get(0), Some(f64::NEG_INFINITY));
}
