mod dummy;
mod mallet;
mod mf;
mod ppr;
mod scikit;

pub use dummy::TestBackend;
pub use mallet::{mallet_text, MalletBackend};
pub use mf::{mf_ratings, MfBackend};
pub use ppr::{ppr_edges, PprBackend};
pub use scikit::ScikitBackend;

use anyhow::{bail, Context, Result};
use continuum_data_store::FeatureVector;

/// `value` as a non-negative integer, if it is exactly one.
fn whole_number(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64)
        .then_some(value as u64)
}

// stored values are doubles, but these tools read integer ids.
fn id_pairs(batch: &[FeatureVector]) -> Result<Vec<(u64, u64)>> {
    batch
        .iter()
        .enumerate()
        .map(|(i, vector)| {
            let [first, second] = vector[..] else {
                bail!("vector {i} has {} values, expected an id pair", vector.len());
            };
            let id = |value: f64| {
                whole_number(value).with_context(|| {
                    format!("vector {i} holds {value}, expected a non-negative integer id")
                })
            };
            Ok((id(first)?, id(second)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn whole_numbers_only() {
        assert_eq!(whole_number(0.0), Some(0));
        assert_eq!(whole_number(42.0), Some(42));
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -1.0, 1.5] {
            assert_eq!(whole_number(value), None, "{value}");
        }
    }

    #[test]
    fn id_pairs_reject_values_that_are_not_ids() {
        assert_eq!(id_pairs(&[vec![3.0, 7.0]]).unwrap(), vec![(3, 7)]);
        for bad in [f64::NAN, f64::INFINITY, -1.0, 2.5] {
            let err = id_pairs(&[vec![1.0, 2.0], vec![1.0, bad]]).unwrap_err();
            assert!(err.to_string().starts_with("vector 1 holds"), "{err}");
        }
    }
}
