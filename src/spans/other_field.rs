use std::sync::Arc;
use crate::core::error::Result;
use crate::matchinfo::defs::TARGET_HIT_SUFFIX;
use crate::matchinfo::{HitQueryContext, MatchInfo, MatchInfoType};
use crate::spans::filter::{Accept, FilterSpans, HitFilter};
use crate::spans::{SpanGuarantees, Spans};

/// Turns hits in one field into hits in another: each hit becomes the span
/// covered by its target-hit captures in the target field. Hits without
/// such a capture are dropped, and only captures in the target field are
/// passed on.
pub type SpansOtherFieldHits = FilterSpans<OtherFieldHits>;

pub struct OtherFieldHits {
    target_field: Arc<str>,
    clause_field: String,
    context: Option<HitQueryContext>,
    match_info: Vec<Option<MatchInfo>>,
    start: i32,
    end: i32,
}

impl SpansOtherFieldHits {
    /// `clause` matches in `clause_field`; hits are reported in `target_field`
    pub fn for_field(clause: Box<dyn Spans>, target_field: &str, clause_field: &str) -> Self {
        FilterSpans::new(
            clause,
            OtherFieldHits {
                target_field: Arc::from(target_field),
                clause_field: clause_field.to_string(),
                context: None,
                match_info: Vec::new(),
                start: -1,
                end: -1,
            },
        )
    }
}

impl HitFilter for OtherFieldHits {
    fn accept(&mut self, candidate: &mut dyn Spans) -> Result<Accept> {
        let Some(context) = self.context.as_ref() else {
            return Ok(Accept::No);
        };
        self.match_info.clear();
        self.match_info.resize(context.number_of_match_infos(), None);
        candidate.get_match_info(&mut self.match_info);

        let defs = context.defs().current_list();
        let mut bounds: Option<(i32, i32)> = None;
        for (info, def) in self.match_info.iter().zip(&defs) {
            let Some(info) = info else { continue };
            if info.match_type() == MatchInfoType::Span
                && *info.field() == self.target_field
                && def.name.ends_with(TARGET_HIT_SUFFIX)
            {
                bounds = Some(match bounds {
                    None => (info.span_start(), info.span_end()),
                    Some((start, end)) => (start.min(info.span_start()), end.max(info.span_end())),
                });
            }
        }
        match bounds {
            Some((start, end)) => {
                self.start = start;
                self.end = end;
                Ok(Accept::Yes)
            }
            None => Ok(Accept::No),
        }
    }

    fn start(&self, _clause: &dyn Spans) -> i32 {
        self.start
    }

    fn end(&self, _clause: &dyn Spans) -> i32 {
        self.end
    }

    fn get_match_info(&self, _clause: &dyn Spans, match_info: &mut [Option<MatchInfo>]) {
        for (target, source) in match_info.iter_mut().zip(&self.match_info) {
            if let Some(source) = source.as_ref().filter(|s| *s.field() == self.target_field) {
                *target = Some(source.clone());
            }
        }
    }

    fn has_match_info(&self, _clause: &dyn Spans) -> bool {
        true
    }

    fn guarantees(&self, _clause: &dyn Spans) -> SpanGuarantees {
        SpanGuarantees::NONE
    }

    fn set_hit_query_context(&mut self, clause: &mut dyn Spans, context: &HitQueryContext) {
        clause.set_hit_query_context(&context.with_field(Some(&self.clause_field)));
        self.context = Some(context.clone());
    }

    fn clause_target(&self, _target: i32) -> Option<i32> {
        None
    }
}
