use bayes_binning::{Algorithm, BinData, BinningError, BinningOptions, Binning};

fn upper(len: usize, v: f64) -> Vec<Vec<f64>> {
    (0..len)
        .map(|i| (0..len).map(|j| if j >= i { v } else { 0.0 }).collect())
        .collect()
}

#[test]
fn accepts_well_formed_matrices() {
    let d = BinData::new(vec![upper(3, 1.0)], vec![upper(3, 1.0)], vec![1.0; 3], upper(3, 1.0)).unwrap();
    assert_eq!(d.len(), 3);
    assert_eq!(d.events(), 1);
}

#[test]
fn rejects_non_square_matrices() {
    let mut counts = upper(3, 1.0);
    counts[1].pop();
    let err = BinData::new(vec![counts], vec![upper(3, 1.0)], vec![1.0; 3], upper(3, 1.0)).unwrap_err();
    assert!(matches!(err, BinningError::Dimension { .. }), "{err}");
}

#[test]
fn rejects_mismatched_event_counts() {
    let err = BinData::new(
        vec![upper(3, 1.0), upper(3, 1.0)],
        vec![upper(3, 1.0)],
        vec![1.0; 3],
        upper(3, 1.0),
    )
    .unwrap_err();
    assert!(matches!(err, BinningError::Dimension { .. }), "{err}");
}

#[test]
fn rejects_entries_below_the_diagonal() {
    let mut gamma = upper(3, 1.0);
    gamma[2][0] = 1.0;
    let err = BinData::new(vec![upper(3, 1.0)], vec![upper(3, 1.0)], vec![1.0; 3], gamma).unwrap_err();
    assert!(
        matches!(err, BinningError::NotUpperTriangular { row: 2, col: 0, .. }),
        "{err}"
    );
}

#[test]
fn rejects_negative_or_missing_values() {
    let mut counts = upper(3, 1.0);
    counts[0][2] = -1.0;
    let err = BinData::new(vec![counts], vec![upper(3, 1.0)], vec![1.0; 3], upper(3, 1.0)).unwrap_err();
    assert!(matches!(err, BinningError::InvalidValue { .. }), "{err}");

    let mut beta = vec![1.0; 3];
    beta[1] = f64::NAN;
    let err = BinData::new(vec![upper(3, 1.0)], vec![upper(3, 1.0)], beta, upper(3, 1.0)).unwrap_err();
    assert!(matches!(err, BinningError::InvalidValue { .. }), "{err}");
}

#[test]
fn rejects_zero_pseudo_counts_on_allowed_bins() {
    let mut alpha = upper(3, 1.0);
    alpha[1][2] = 0.0;
    let err = BinData::new(vec![upper(3, 1.0)], vec![alpha.clone()], vec![1.0; 3], upper(3, 1.0)).unwrap_err();
    assert!(matches!(err, BinningError::InvalidValue { row: 1, col: 2, .. }), "{err}");
    // Forbidding the bin makes the pseudo-count irrelevant.
    let mut gamma = upper(3, 1.0);
    gamma[1][2] = 0.0;
    assert!(BinData::new(vec![upper(3, 1.0)], vec![alpha], vec![1.0; 3], gamma).is_ok());
}

#[test]
fn raw_algorithm_selectors() {
    assert_eq!(Algorithm::try_from(0i64).unwrap(), Algorithm::Exact);
    assert_eq!(Algorithm::try_from(1i64).unwrap(), Algorithm::Tree);
    assert_eq!(Algorithm::try_from(2i64).unwrap(), Algorithm::Sampler);
    assert_eq!(Algorithm::try_from(3i64), Err(BinningError::InvalidAlgorithm(3)));
    assert_eq!(Algorithm::try_from(-1i64), Err(BinningError::InvalidAlgorithm(-1)));
}

#[test]
fn invalid_event_index_fails_before_computing() {
    let d = BinData::from_observations(&[vec![1.0, 2.0]], &[vec![1.0, 1.0]], vec![1.0, 1.0]).unwrap();
    let opts = BinningOptions::builder().with_which(1).with_moments(1).build().unwrap();
    assert!(matches!(
        Binning::new(&d, opts),
        Err(BinningError::InvalidEvent { which: 1, events: 1 })
    ));
}

#[test]
fn invalid_options_are_reported_by_name() {
    let cases = [
        (BinningOptions::builder().with_threads(0), "threads"),
        (BinningOptions::builder().with_epsilon(0.0), "epsilon"),
        (BinningOptions::builder().with_samples(10, 0), "samples"),
        (BinningOptions::builder().with_density(1.5), "density_step"),
        (BinningOptions::builder().with_hmm(0.0), "rho"),
    ];
    for (builder, name) in cases {
        match builder.build() {
            Err(BinningError::InvalidOption { option, .. }) => assert_eq!(option, name),
            other => panic!("expected invalid {name}, got {other:?}"),
        }
    }
}

#[test]
fn errors_have_readable_messages() {
    let err = BinningError::InvalidEvent { which: 4, events: 2 };
    assert_eq!(err.to_string(), "invalid event index 4: data has 2 event type(s)");
}

#[test]
fn fully_gated_data_has_no_nan_on_any_backend() {
    let d = BinData::new(vec![upper(3, 1.0)], vec![upper(3, 1.0)], vec![1.0; 3], upper(3, 0.0)).unwrap();
    let exact = BinningOptions::builder()
        .with_break_probabilities()
        .with_model_posterior()
        .with_moments(1)
        .build()
        .unwrap();
    let r = Binning::new(&d, exact).unwrap().run().unwrap();
    assert_eq!(r.break_probabilities, Some(vec![1.0, 0.0, 0.0]));
    assert_eq!(r.model_posterior, Some(vec![0.0; 3]));

    let hmm = BinningOptions::builder()
        .with_hmm(0.5)
        .with_break_probabilities()
        .with_moments(1)
        .build()
        .unwrap();
    let r = Binning::new(&d, hmm).unwrap().run().unwrap();
    assert_eq!(r.break_probabilities, Some(vec![1.0, 0.0, 0.0]));
    assert!(r.moments.iter().flatten().all(|v| !v.is_nan()));

    let sampler = BinningOptions::builder()
        .with_algorithm(Algorithm::Sampler)
        .with_samples(5, 50)
        .with_break_probabilities()
        .with_model_posterior()
        .build()
        .unwrap();
    let r = Binning::new(&d, sampler).unwrap().run().unwrap();
    assert_eq!(r.break_probabilities, Some(vec![1.0, 0.0, 0.0]));
    assert_eq!(r.model_posterior, Some(vec![0.0; 3]));
    assert_eq!(r.sampler_counts, Some(vec![0; 3]));
}
