pub mod core;
pub mod storage;
pub mod compression;
pub mod forward_index;
pub mod index;
pub mod writer;
pub mod reader;
pub mod matchinfo;
pub mod spans;
pub mod results;
pub mod parallel;

pub use crate::core::config::{ContextSize, SearchConfig};
pub use crate::core::error::{Error, ErrorKind, Result};

/*
┌──────────────────────────────────── CORPUSX LAYERS ─────────────────────────────────────┐
│                                                                                          │
│  results      HitFetcher ──► SharedHits ──freeze──► HitsStore                           │
│               sort / group / window / sample / contexts (forward index lookups)         │
│                     ▲                                                                   │
│  parallel     SegmentPool: one SegmentFetch per segment, round-robin over threads       │
│                     ▲                                                                   │
│  spans        SpanQuery ──per segment──► Box<dyn Spans> tree                            │
│               TermSpans, SpansRelations, SpansAndFiltered, SpansAdjustHits,             │
│               capture operators, SpansBuffered, SpansInBuckets, SpansSortedUnique       │
│                     ▲                                                                   │
│  matchinfo    MatchInfoDefs (query-wide registry) + HitQueryContext                     │
│                     ▲                                                                   │
│  index        IndexSegment: postings + payloads, doc lengths, live docs                 │
│                     │                                                                   │
│  writer       PostingsWriter ──plugins──► forward index files, relation info files      │
│  reader       RelationInfoReader           forward_index: ForwardIndexSegmentReader     │
│                     │                                                                   │
│  storage      versioned headers, CRC footers, DataInput/DataOutput                      │
│  compression  vint/zint, tokens codecs                                                  │
│                                                                                          │
└──────────────────────────────────────────────────────────────────────────────────────────┘
*/
