use std::collections::HashMap;
use tracing::debug;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};
use crate::results::property::{HitProperty, PropertyContext, PropertyValue};
use crate::results::store::HitsStore;

/// Hits sharing one property value
#[derive(Debug, Clone)]
pub struct HitGroup {
    identity: PropertyValue,
    stored: HitsStore,
    total_size: i64,
}

impl HitGroup {
    pub fn identity(&self) -> &PropertyValue {
        &self.identity
    }

    /// Stored hits; at most the configured per-group maximum
    pub fn hits(&self) -> &HitsStore {
        &self.stored
    }

    /// Number of hits in the group, stored or not
    pub fn size(&self) -> i64 {
        self.total_size
    }
}

/// Hits grouped by a property, groups in the order their first hit appeared
#[derive(Debug, Clone)]
pub struct HitGroups {
    property: HitProperty,
    groups: Vec<HitGroup>,
    by_identity: HashMap<PropertyValue, usize>,
    largest_group_size: i64,
    total_hits: i64,
}

impl HitGroups {
    pub fn property(&self) -> &HitProperty {
        &self.property
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HitGroup> {
        self.groups.get(index)
    }

    pub fn group(&self, identity: &PropertyValue) -> Option<&HitGroup> {
        self.by_identity.get(identity).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &HitGroup> {
        self.groups.iter()
    }

    pub fn largest_group_size(&self) -> i64 {
        self.largest_group_size
    }

    pub fn total_hits(&self) -> i64 {
        self.total_hits
    }

    /// Largest groups first; equal sizes keep their order
    pub fn sort_by_size(&mut self) {
        self.groups.sort_by(|a, b| b.total_size.cmp(&a.total_size));
        self.reindex();
    }

    pub fn sort_by_identity(&mut self) {
        let property = self.property.clone();
        self.groups.sort_by(|a, b| property.compare(&a.identity, &b.identity));
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_identity = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.identity.clone(), i))
            .collect();
    }
}

impl HitsStore {
    /// Group hits by a property. Every hit is counted in its group, but only
    /// the first `max_hits_per_group` are stored (all if negative). More than
    /// `max_number_of_groups` distinct values is an error, not a truncation.
    pub fn group_by(
        &self,
        property: &HitProperty,
        context: &PropertyContext<'_>,
        config: &SearchConfig,
    ) -> Result<HitGroups> {
        let values = property.values(self, context)?;
        let max_per_group = config.max_hits_per_group;

        let mut order: Vec<PropertyValue> = Vec::new();
        let mut members: HashMap<PropertyValue, (Vec<usize>, i64)> = HashMap::new();
        let mut last_doc = None;
        for (i, value) in values.into_iter().enumerate() {
            if last_doc != Some(self.doc(i)) {
                context.abort.check()?;
                last_doc = Some(self.doc(i));
            }
            if !members.contains_key(&value) {
                if order.len() >= config.max_number_of_groups {
                    return Err(Error::unsupported(format!(
                        "too many groups (more than {})",
                        config.max_number_of_groups
                    )));
                }
                order.push(value.clone());
            }
            let entry = members.entry(value).or_insert_with(|| (Vec::new(), 0));
            if max_per_group < 0 || (entry.0.len() as i64) < max_per_group {
                entry.0.push(i);
            }
            entry.1 += 1;
        }

        let mut groups = Vec::with_capacity(order.len());
        let mut largest_group_size = 0;
        for identity in order {
            let Some((indexes, total_size)) = members.remove(&identity) else {
                continue;
            };
            largest_group_size = largest_group_size.max(total_size);
            groups.push(HitGroup { stored: self.select(indexes), identity, total_size });
        }
        debug!(hits = self.len(), groups = groups.len(), "hits grouped");
        let mut result = HitGroups {
            property: property.clone(),
            groups,
            by_identity: HashMap::new(),
            largest_group_size,
            total_hits: self.len() as i64,
        };
        result.reindex();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abort::AbortFlag;
    use crate::core::error::ErrorKind;
    use crate::index::segment::SegmentSet;
    use crate::results::hit::Hit;

    fn store() -> HitsStore {
        let hits = [(1, 1, 2), (1, 2, 3), (2, 3, 4), (3, 4, 5), (3, 5, 6)].map(|(d, s, e)| Hit::new(d, s, e));
        HitsStore::from_hits(&hits).unwrap()
    }

    #[test]
    fn caps_stored_hits_but_not_sizes() {
        let segments = SegmentSet::default();
        let abort = AbortFlag::new();
        let context = PropertyContext { segments: &segments, defs: None, abort: &abort };
        let config = SearchConfig { max_hits_per_group: 1, ..SearchConfig::default() };
        let mut groups = store().group_by(&HitProperty::DocId, &context, &config).unwrap();
        assert_eq!(groups.len(), 3);
        let first = groups.group(&PropertyValue::Int(1)).unwrap();
        assert_eq!(first.size(), 2);
        assert_eq!(first.hits().len(), 1);
        assert_eq!(groups.largest_group_size(), 2);

        groups.sort_by_size();
        let sizes: Vec<_> = groups.iter().map(|g| g.size()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(groups.get(1).unwrap().identity(), &PropertyValue::Int(3));
    }

    #[test]
    fn too_many_groups_fails() {
        let segments = SegmentSet::default();
        let abort = AbortFlag::new();
        let context = PropertyContext { segments: &segments, defs: None, abort: &abort };
        let config = SearchConfig { max_number_of_groups: 2, ..SearchConfig::default() };
        let err = store().group_by(&HitProperty::DocId, &context, &config).unwrap_err();
        assert!(err.is(ErrorKind::UnsupportedOperation));
    }

    #[test]
    fn aborted_grouping_is_interrupted() {
        let segments = SegmentSet::default();
        let abort = AbortFlag::new();
        abort.abort();
        let context = PropertyContext { segments: &segments, defs: None, abort: &abort };
        let err = store().group_by(&HitProperty::DocId, &context, &SearchConfig::default()).unwrap_err();
        assert!(err.is(ErrorKind::SearchInterrupted));
    }
}
