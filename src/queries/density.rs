//! Marginal posterior density of the event probability at each position.

use crate::error::{BinningError, Result};
use crate::model::{DirichletModel, FixProb};
use crate::options::DensityGrid;
use crate::queries::{ratio_to_linear, Evaluator};
use crate::traits::BinScore;

/// `density[pos][s]`: posterior density of `p_which` at grid point `s` for
/// the bin covering `pos`, averaged over partitions.
pub fn density(
    eval: &Evaluator<'_>,
    threads: usize,
    model: &DirichletModel<'_>,
    grid: &DensityGrid,
    which: usize,
) -> Result<Vec<Vec<f64>>> {
    let data = model.data();
    data.check_event(which)?;
    if data.events() < 2 {
        return Err(BinningError::option(
            "density",
            "marginal densities need at least two event types",
        ));
    }
    let n = grid.len();
    let mut out = vec![vec![0.0; n]; eval.len()];
    for s in 0..n {
        let p = grid.point(s);
        if !grid.admits(p) {
            continue;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(point = s, total = n, "computing density");
        let q = |i: usize, j: usize| {
            model
                .with_fixed(FixProb {
                    pos: i,
                    value: p,
                    which,
                })
                .score(i, j)
        };
        let logs = eval.per_position(threads, model, &q)?;
        for (row, v) in out.iter_mut().zip(logs) {
            row[s] = ratio_to_linear(v);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BinData;
    use crate::model::Context;
    use crate::prombs::prombs;

    #[test]
    fn density_integrates_to_one() {
        let data = BinData::from_observations(
            &[vec![3.0, 0.0, 1.0], vec![1.0, 2.0, 2.0]],
            &[vec![1.0; 3], vec![1.0; 3]],
            vec![1.0; 3],
        )
        .unwrap();
        let ctx = Context::new();
        let model = DirichletModel::new(&data, &ctx);
        let prior = data.prior().as_slice().to_vec();
        let evidence = prombs(&model, &prior, 2).unwrap().log_sum();
        let eval = Evaluator::Exact {
            prior: &prior,
            cutoff: 2,
            evidence,
        };
        let grid = DensityGrid {
            step: 0.001,
            from: 0.0,
            to: 1.0,
        };
        let d = density(&eval, 1, &model, &grid, 1).unwrap();
        for row in &d {
            assert_eq!(row[0], 0.0);
            assert_eq!(row[grid.len() - 1], 0.0);
            let mass: f64 = row.iter().sum::<f64>() * grid.step;
            assert!((mass - 1.0).abs() < 5e-3, "mass {mass}");
        }
    }

    #[test]
    fn single_event_type_is_rejected() {
        let data = BinData::from_observations(&[vec![1.0, 2.0]], &[vec![1.0, 1.0]], vec![1.0; 2]).unwrap();
        let ctx = Context::new();
        let model = DirichletModel::new(&data, &ctx);
        let prior = data.prior().as_slice().to_vec();
        let eval = Evaluator::Exact {
            prior: &prior,
            cutoff: 1,
            evidence: 0.0,
        };
        assert!(matches!(
            density(&eval, 1, &model, &DensityGrid::default(), 0),
            Err(BinningError::InvalidOption { .. })
        ));
    }
}
