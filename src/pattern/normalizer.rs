use crate::pattern::classify::{classify_segment, SegmentType};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use url::Url;

/// One position of a URL path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Literal(String),
    Dynamic(SegmentType),
}

/// Grouping key: two URLs group together iff they have the same scheme,
/// network location, segment count, and literal segments in the same places.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralKey {
    scheme: String,
    netloc: String,
    segments: Vec<Option<String>>,
}

/// Structural template of a URL, e.g. `/users/<int>/posts/<slug>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    pub scheme: String,
    /// Host plus explicit port
    pub netloc: String,
    pub segments: Vec<PatternSegment>,
}

impl UrlPattern {
    /// Classifies every path segment of a URL; the query is not part of the pattern
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        let netloc = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let segments = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| match classify_segment(s) {
                        SegmentType::Literal => PatternSegment::Literal(s.to_string()),
                        dynamic => PatternSegment::Dynamic(dynamic),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            scheme: url.scheme().to_string(),
            netloc,
            segments,
        }
    }

    pub fn key(&self) -> StructuralKey {
        StructuralKey {
            scheme: self.scheme.clone(),
            netloc: self.netloc.clone(),
            segments: self
                .segments
                .iter()
                .map(|s| match s {
                    PatternSegment::Literal(value) => Some(value.clone()),
                    PatternSegment::Dynamic(_) => None,
                })
                .collect(),
        }
    }

    /// Path template with type markers, `/` for the root
    pub fn pattern_path(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }

        self.segments
            .iter()
            .map(|s| match s {
                PatternSegment::Literal(value) => format!("/{}", value),
                PatternSegment::Dynamic(t) => format!("/{}", t.marker()),
            })
            .collect()
    }

    /// Types of the parameterized positions, in path order
    pub fn segment_types(&self) -> Vec<SegmentType> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PatternSegment::Dynamic(t) => Some(*t),
                PatternSegment::Literal(_) => None,
            })
            .collect()
    }

    /// Widens positions whose type disagrees with `other` to the generic type
    ///
    /// Both patterns must share a structural key. Promotion never narrows: a
    /// generic position stays generic whatever arrives later.
    ///
    /// # Returns
    ///
    /// `true` if any position was promoted
    pub fn promote(&mut self, other: &UrlPattern) -> bool {
        let mut promoted = false;

        for (mine, theirs) in self.segments.iter_mut().zip(&other.segments) {
            if let (PatternSegment::Dynamic(current), PatternSegment::Dynamic(incoming)) =
                (mine, theirs)
            {
                if *current != SegmentType::Generic && *current != *incoming {
                    *current = SegmentType::Generic;
                    promoted = true;
                }
            }
        }

        promoted
    }
}

impl Serialize for UrlPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("UrlPattern", 4)?;
        state.serialize_field("scheme", &self.scheme)?;
        state.serialize_field("netloc", &self.netloc)?;
        state.serialize_field("pattern_path", &self.pattern_path())?;
        state.serialize_field("segment_types", &self.segment_types())?;
        state.end()
    }
}

/// URLs sharing one structural key
#[derive(Debug, Clone, Serialize)]
pub struct PatternGroup {
    pub pattern: UrlPattern,
    /// Representative URLs that were (or are being) crawled
    pub samples: Vec<String>,
    /// Every URL seen for this key, sampled or skipped
    pub total_count: usize,
    pub skip_count: usize,
    pub max_samples: usize,
}

impl PatternGroup {
    fn new(pattern: UrlPattern, max_samples: usize) -> Self {
        Self {
            pattern,
            samples: Vec::new(),
            total_count: 0,
            skip_count: 0,
            max_samples,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Aggregate view of all pattern groups at the end of a crawl
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatternNormalizationResult {
    pub patterns: Vec<PatternGroup>,
    pub total_urls_processed: usize,
    pub total_patterns_found: usize,
    pub total_urls_skipped: usize,
}

/// Groups structurally identical URLs and caps how many of each are crawled
///
/// The crawler asks [`should_skip`](Self::should_skip) before fetching,
/// [`reserve`](Self::reserve)s a sample slot for URLs it dispatches, and calls
/// [`add`](Self::add) once per URL afterwards. Reservations keep concurrent
/// dispatches from overshooting a group's budget while fetches are in flight.
#[derive(Debug)]
pub struct PatternNormalizer {
    max_samples: usize,
    groups: HashMap<StructuralKey, PatternGroup>,
    order: Vec<StructuralKey>,
    reserved: HashMap<StructuralKey, HashSet<String>>,
}

impl PatternNormalizer {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            groups: HashMap::new(),
            order: Vec::new(),
            reserved: HashMap::new(),
        }
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    fn reserved_count(&self, key: &StructuralKey) -> usize {
        self.reserved.get(key).map_or(0, HashSet::len)
    }

    fn used_slots(&self, key: &StructuralKey) -> usize {
        self.groups.get(key).map_or(0, PatternGroup::sample_count) + self.reserved_count(key)
    }

    /// Dry run of [`add`](Self::add): true if this URL's group has no sample slot left
    pub fn should_skip(&self, url: &Url) -> bool {
        let key = UrlPattern::from_url(url).key();
        self.used_slots(&key) >= self.max_samples
    }

    /// Holds a sample slot for a URL that is about to be fetched
    pub fn reserve(&mut self, url: &Url) {
        let key = UrlPattern::from_url(url).key();
        self.reserved
            .entry(key)
            .or_default()
            .insert(url.as_str().to_string());
    }

    /// Gives a reserved slot back without recording the URL
    pub fn release(&mut self, url: &Url) {
        let key = UrlPattern::from_url(url).key();
        if let Some(urls) = self.reserved.get_mut(&key) {
            urls.remove(url.as_str());
        }
    }

    /// Records a URL against its group
    ///
    /// Consumes the URL's reservation if it holds one, promotes mismatched
    /// positions, then samples the URL if the group still has room.
    ///
    /// # Returns
    ///
    /// * `true` - URL recorded as a sample
    /// * `false` - Group budget exhausted; counted as a skip
    pub fn add(&mut self, url: &Url) -> bool {
        let pattern = UrlPattern::from_url(url);
        let key = pattern.key();
        let max_samples = self.max_samples;

        if let Some(urls) = self.reserved.get_mut(&key) {
            urls.remove(url.as_str());
        }
        let reserved = self.reserved_count(&key);

        let group = match self.groups.get_mut(&key) {
            Some(group) => {
                if group.pattern.promote(&pattern) {
                    tracing::debug!(
                        "Promoted pattern to {}{}",
                        group.pattern.netloc,
                        group.pattern.pattern_path()
                    );
                }
                group
            }
            None => {
                self.order.push(key.clone());
                self.groups
                    .entry(key)
                    .or_insert_with(|| PatternGroup::new(pattern, max_samples))
            }
        };

        group.total_count += 1;
        if group.samples.len() + reserved < group.max_samples {
            group.samples.push(url.as_str().to_string());
            true
        } else {
            group.skip_count += 1;
            false
        }
    }

    /// Returns the group a URL belongs to, if one exists
    pub fn group_for(&self, url: &Url) -> Option<&PatternGroup> {
        self.groups.get(&UrlPattern::from_url(url).key())
    }

    /// Snapshot of all groups, in first-seen order
    pub fn results(&self) -> PatternNormalizationResult {
        let patterns: Vec<PatternGroup> = self
            .order
            .iter()
            .filter_map(|key| self.groups.get(key).cloned())
            .collect();

        PatternNormalizationResult {
            total_urls_processed: patterns
                .iter()
                .map(|g| g.sample_count() + g.skip_count)
                .sum(),
            total_patterns_found: patterns.len(),
            total_urls_skipped: patterns.iter().map(|g| g.skip_count).sum(),
            patterns,
        }
    }
}
