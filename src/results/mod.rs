//! Materialized hits: collecting them from the segments, and sorting,
//! grouping, windowing, sampling and building contexts on top.

pub mod contexts;
pub mod fetch;
pub mod group;
pub mod hit;
pub mod property;
pub mod sample;
pub mod sort;
pub mod stats;
pub mod store;
pub mod window;

pub use contexts::{collocations, Contexts, Kwic, TermFrequencyList};
pub use fetch::HitFetcher;
pub use group::{HitGroup, HitGroups};
pub use hit::{EphemeralHit, Hit, MatchInfos};
pub use property::{HitProperty, PropertyContext, PropertyValue};
pub use sample::{SampleParameters, SampleSize};
pub use stats::{MaxStats, ResultsStats};
pub use store::{HitsBuilder, HitsStore, SharedHits};
pub use window::{HitsWindow, Window};
