use std::sync::Arc;
use crate::matchinfo::defs::MatchInfoDefs;
use crate::matchinfo::MatchInfoType;

/// What a spans tree needs to know about the query it belongs to: the
/// shared capture registry and the field it is currently matching in.
#[derive(Debug, Clone)]
pub struct HitQueryContext {
    defs: Arc<MatchInfoDefs>,
    default_field: Arc<str>,
    field: Arc<str>,
}

impl HitQueryContext {
    pub fn new(default_field: &str, defs: Arc<MatchInfoDefs>) -> Self {
        let field: Arc<str> = Arc::from(default_field);
        HitQueryContext { defs, default_field: field.clone(), field }
    }

    /// Same query, matching in another field (e.g. the target of an alignment)
    pub fn with_field(&self, field: Option<&str>) -> Self {
        match field {
            Some(f) => HitQueryContext {
                defs: self.defs.clone(),
                default_field: self.default_field.clone(),
                field: Arc::from(f),
            },
            None => self.clone(),
        }
    }

    pub fn register_match_info(&self, name: &str, match_type: Option<MatchInfoType>) -> usize {
        self.defs.register(name, match_type, &self.field, None)
    }

    pub fn register_match_info_in(
        &self,
        name: &str,
        match_type: Option<MatchInfoType>,
        field: &Arc<str>,
        target_field: Option<&Arc<str>>,
    ) -> usize {
        self.defs.register(name, match_type, field, target_field)
    }

    pub fn number_of_match_infos(&self) -> usize {
        self.defs.current_size()
    }

    pub fn defs(&self) -> &Arc<MatchInfoDefs> {
        &self.defs
    }

    pub fn field(&self) -> &Arc<str> {
        &self.field
    }

    pub fn default_field(&self) -> &Arc<str> {
        &self.default_field
    }

    pub fn has_relation_captures(&self) -> bool {
        self.defs.currently_has_relation_captures()
    }
}
