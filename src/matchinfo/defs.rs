use std::sync::Arc;
use parking_lot::Mutex;
use tracing::trace;
use crate::matchinfo::MatchInfoType;

/// Suffix of capture names that hold the hit in a target field (parallel corpora)
pub const TARGET_HIT_SUFFIX: &str = "__@hit";

/// Definition of one capture slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfoDef {
    pub index: usize,
    pub name: String,
    pub match_type: Option<MatchInfoType>,
    pub field: Arc<str>,
    /// None when it equals `field`
    pub target_field: Option<Arc<str>>,
}

impl MatchInfoDef {
    /// A known type is never replaced by "don't know"
    fn update_type(&mut self, match_type: Option<MatchInfoType>) {
        let Some(new_type) = match_type else {
            return;
        };
        debug_assert!(
            self.match_type.is_none() || self.match_type == Some(new_type),
            "capture {} re-registered as {:?}, was {:?}",
            self.name,
            new_type,
            self.match_type
        );
        self.match_type = Some(new_type);
    }

    pub fn is_foreign_hit(&self) -> bool {
        self.name.ends_with(TARGET_HIT_SUFFIX)
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.match_type, Some(MatchInfoType::Relation) | Some(MatchInfoType::InlineTag))
    }
}

/// Query-wide registry of capture names. Append-only: an index, once
/// assigned, is never reused. Segment workers register concurrently, so
/// the set of definitions can grow while hits are being produced.
#[derive(Debug, Default)]
pub struct MatchInfoDefs {
    defs: Mutex<Vec<MatchInfoDef>>,
}

impl MatchInfoDefs {
    pub fn new() -> Arc<Self> {
        Arc::new(MatchInfoDefs::default())
    }

    /// Index for a capture, registering it if it's new
    pub fn register(
        &self,
        name: &str,
        match_type: Option<MatchInfoType>,
        field: &Arc<str>,
        target_field: Option<&Arc<str>>,
    ) -> usize {
        let mut defs = self.defs.lock();
        if let Some(def) = defs.iter_mut().find(|d| d.name == name) {
            def.update_type(match_type);
            return def.index;
        }
        let index = defs.len();
        let target_field = target_field.filter(|t| *t != field).cloned();
        trace!(name, index, ?match_type, "registered capture");
        defs.push(MatchInfoDef {
            index,
            name: name.to_string(),
            match_type,
            field: field.clone(),
            target_field,
        });
        index
    }

    pub fn get(&self, index: usize) -> Option<MatchInfoDef> {
        self.defs.lock().get(index).cloned()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.defs.lock().iter().find(|d| d.name == name).map(|d| d.index)
    }

    pub fn current_size(&self) -> usize {
        self.defs.lock().len()
    }

    /// Snapshot; later registrations are not reflected
    pub fn current_list(&self) -> Vec<MatchInfoDef> {
        self.defs.lock().clone()
    }

    pub fn current_list_filtered(&self, filter: impl Fn(&MatchInfoDef) -> bool) -> Vec<MatchInfoDef> {
        self.defs.lock().iter().filter(|d| filter(d)).cloned().collect()
    }

    pub fn currently_has_relation_captures(&self) -> bool {
        self.defs.lock().iter().any(|d| d.is_relation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_stable() {
        let defs = MatchInfoDefs::new();
        let f: Arc<str> = Arc::from("contents");
        let a = defs.register("A", None, &f, None);
        let b = defs.register("B", Some(MatchInfoType::Span), &f, Some(&f));
        assert_eq!((a, b), (0, 1));
        assert_eq!(defs.register("A", Some(MatchInfoType::Relation), &f, None), 0);
        assert_eq!(defs.get(0).unwrap().match_type, Some(MatchInfoType::Relation));
        // Unknown type doesn't erase a known one
        defs.register("A", None, &f, None);
        assert_eq!(defs.get(0).unwrap().match_type, Some(MatchInfoType::Relation));
        assert!(defs.get(1).unwrap().target_field.is_none());
        assert!(defs.currently_has_relation_captures());
        assert_eq!(defs.index_of("B"), Some(1));
        assert_eq!(defs.index_of("C"), None);
    }
}
