use rayon::prelude::*;
use tracing::debug;
use crate::core::error::Result;
use crate::results::property::{HitProperty, PropertyContext, PropertyValue};
use crate::results::store::HitsStore;

/// Index permutation that sorts `values` by `property`. Equal values keep
/// their original order.
pub fn sort_order(property: &HitProperty, values: &[PropertyValue]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.par_sort_by(|&a, &b| property.compare(&values[a], &values[b]).then(a.cmp(&b)));
    order
}

impl HitsStore {
    /// Copy of these hits sorted by a property. Values are computed once per
    /// hit up front; only the permutation is sorted.
    pub fn sorted_by(&self, property: &HitProperty, context: &PropertyContext<'_>) -> Result<HitsStore> {
        let values = property.values(self, context)?;
        let order = sort_order(property, &values);
        debug!(hits = self.len(), ?property, "hits sorted");
        Ok(self.select(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abort::AbortFlag;
    use crate::index::segment::SegmentSet;
    use crate::results::hit::Hit;

    #[test]
    fn stable_reverse_sort() {
        let hits = [(2, 5, 6), (1, 3, 4), (2, 1, 2), (1, 0, 1)].map(|(d, s, e)| Hit::new(d, s, e));
        let store = HitsStore::from_hits(&hits).unwrap();
        let segments = SegmentSet::default();
        let abort = AbortFlag::new();
        let context = PropertyContext { segments: &segments, defs: None, abort: &abort };

        let by_doc = store.sorted_by(&HitProperty::DocId, &context).unwrap();
        let starts: Vec<_> = by_doc.iter().map(|h| h.start).collect();
        assert_eq!(starts, vec![3, 0, 5, 1]);

        let reversed = store.sorted_by(&HitProperty::DocId.reverse(), &context).unwrap();
        let starts: Vec<_> = reversed.iter().map(|h| h.start).collect();
        assert_eq!(starts, vec![5, 1, 3, 0]);

        let both = HitProperty::Multiple(vec![HitProperty::DocId, HitProperty::HitPosition.reverse()]);
        let sorted = store.sorted_by(&both, &context).unwrap();
        let hits: Vec<_> = sorted.iter().map(|h| (h.doc, h.start)).collect();
        assert_eq!(hits, vec![(1, 3), (1, 0), (2, 5), (2, 1)]);
    }
}
