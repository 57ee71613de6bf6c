//! URL pattern classification and sampling
//!
//! Applications expose endless structurally identical URLs (`/users/1`,
//! `/users/2`, ...). This module classifies path segments, groups URLs by
//! structure, and caps how many representatives of each group get crawled.

mod classify;
mod normalizer;

pub use classify::{classify_segment, SegmentType};
pub use normalizer::{
    PatternGroup, PatternNormalizationResult, PatternNormalizer, PatternSegment, StructuralKey,
    UrlPattern,
};
