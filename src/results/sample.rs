use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::results::store::HitsStore;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SampleSize {
    /// Share of the hits, 0.0 to 1.0
    Fraction(f64),
    Number(i64),
}

/// How many hits to pick at random, and the seed to pick them with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleParameters {
    pub size: SampleSize,
    pub seed: u64,
}

impl SampleParameters {
    pub fn fraction(fraction: f64, seed: u64) -> Self {
        SampleParameters { size: SampleSize::Fraction(fraction), seed }
    }

    pub fn number(number: i64, seed: u64) -> Self {
        SampleParameters { size: SampleSize::Number(number), seed }
    }

    /// Sample size for a source of `total` hits, clamped to `total`
    pub fn number_of_hits(&self, total: i64) -> Result<i64> {
        let n = match self.size {
            SampleSize::Fraction(f) => {
                if !(0.0..=1.0).contains(&f) {
                    return Err(Error::invalid_argument(format!("sample fraction {} not between 0 and 1", f)));
                }
                (f * total as f64).round() as i64
            }
            SampleSize::Number(n) => {
                if n < 0 {
                    return Err(Error::invalid_argument(format!("negative sample size {}", n)));
                }
                n
            }
        };
        Ok(n.min(total))
    }
}

impl HitsStore {
    /// Random subset of the hits, in their original order
    pub fn sample(&self, parameters: &SampleParameters) -> Result<HitsStore> {
        if self.len() > i32::MAX as usize {
            return Err(Error::unsupported(format!("cannot sample from {} hits", self.len())));
        }
        let amount = parameters.number_of_hits(self.len() as i64)? as usize;
        let mut rng = StdRng::seed_from_u64(parameters.seed);
        let mut chosen = rand::seq::index::sample(&mut rng, self.len(), amount).into_vec();
        chosen.sort_unstable();
        Ok(self.select(chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::results::hit::Hit;

    fn store() -> HitsStore {
        let hits: Vec<Hit> = (0..100).map(|i| Hit::new(i / 10, i % 10, i % 10 + 1)).collect();
        HitsStore::from_hits(&hits).unwrap()
    }

    #[test]
    fn sample_keeps_original_order() {
        let sample = store().sample(&SampleParameters::number(20, 7)).unwrap();
        assert_eq!(sample.len(), 20);
        let keys: Vec<_> = sample.iter().map(|h| (h.doc, h.start)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn sizes_are_clamped() {
        assert_eq!(store().sample(&SampleParameters::number(500, 1)).unwrap().len(), 100);
        assert_eq!(store().sample(&SampleParameters::fraction(0.25, 1)).unwrap().len(), 25);
        let err = store().sample(&SampleParameters::fraction(1.5, 1)).unwrap_err();
        assert!(err.is(ErrorKind::InvalidArgument));
    }
}
