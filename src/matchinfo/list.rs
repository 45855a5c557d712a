use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use crate::matchinfo::relation::RelationInfo;

/// Several relations captured as one slot, e.g. all relations in a sentence
#[derive(Debug, Clone)]
pub struct RelationListInfo {
    relations: Vec<RelationInfo>,
    span_start: i32,
    span_end: i32,
    field: Arc<str>,
}

impl RelationListInfo {
    pub fn new(relations: Vec<RelationInfo>, field: Arc<str>) -> Self {
        let span_start = relations.iter().map(|r| r.span_start()).min().unwrap_or(-1);
        let span_end = relations.iter().map(|r| r.span_end()).max().unwrap_or(-1);
        RelationListInfo { relations, span_start, span_end, field }
    }

    pub fn relations(&self) -> &[RelationInfo] {
        &self.relations
    }

    pub fn span_start(&self) -> i32 {
        self.span_start
    }

    pub fn span_end(&self) -> i32 {
        self.span_end
    }

    pub fn is_root(&self) -> bool {
        self.relations.iter().all(|r| r.is_root())
    }

    pub fn source_start(&self) -> i32 {
        self.relations.iter().filter(|r| !r.is_root()).map(|r| r.source_start()).min().unwrap_or(0)
    }

    pub fn source_end(&self) -> i32 {
        self.relations.iter().filter(|r| !r.is_root()).map(|r| r.source_end()).max().unwrap_or(0)
    }

    pub fn target_start(&self) -> i32 {
        self.relations.iter().map(|r| r.target_start()).min().unwrap_or(0)
    }

    pub fn target_end(&self) -> i32 {
        self.relations.iter().map(|r| r.target_end()).max().unwrap_or(0)
    }

    pub fn field(&self) -> &Arc<str> {
        self.relations.first().map(|r| r.field()).unwrap_or(&self.field)
    }

    pub fn target_field(&self) -> Option<&Arc<str>> {
        self.relations.first().map(|r| r.target_field())
    }

    pub fn is_cross_field(&self) -> bool {
        self.target_field().is_some_and(|t| t != self.field())
    }
}

impl PartialEq for RelationListInfo {
    fn eq(&self, other: &Self) -> bool {
        self.relations == other.relations
    }
}

impl Eq for RelationListInfo {}

impl PartialOrd for RelationListInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RelationListInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relations
            .len()
            .cmp(&other.relations.len())
            .then_with(|| self.relations.iter().cmp(other.relations.iter()))
    }
}

impl fmt::Display for RelationListInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listrel(")?;
        for (i, r) in self.relations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, ")")
    }
}
