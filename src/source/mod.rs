//! Source identities, crawl targets, and stable item identities
//!
//! A source is one of the supported listing portals. Targets pair a source
//! with a canonical locator; identities are the source-qualified keys used
//! for deduplication and persistence.

mod normalize;

pub use normalize::normalize_locator;

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// The external data sources flathunt knows how to crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Rightmove,
    Zoopla,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rightmove => "rightmove",
            Self::Zoopla => "zoopla",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "rightmove" => Some(Self::Rightmove),
            "zoopla" => Some(Self::Zoopla),
            _ => None,
        }
    }

    /// Path prefix under which this source serves individual listings
    fn listing_path_prefix(&self) -> &'static str {
        match self {
            Self::Rightmove => "/properties/",
            Self::Zoopla => "/to-rent/details/",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seed for discovery: one search-results URL belonging to one source
#[derive(Debug, Clone)]
pub struct SearchSeed {
    pub source: SourceId,
    pub url: Url,
    pub max_pages: u32,
}

/// One fetchable listing resource
///
/// Created during discovery with an already-normalized locator; immutable
/// afterwards and consumed once by the coordinator.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    pub source: SourceId,
    pub locator: Url,
    pub discovered_via: String,
}

impl CrawlTarget {
    pub fn new(source: SourceId, locator: Url, discovered_via: impl Into<String>) -> Self {
        Self {
            source,
            locator,
            discovered_via: discovered_via.into(),
        }
    }
}

/// A stable, source-qualified listing key (`source:external_id`)
///
/// Derived deterministically from a target's normalized locator, so two
/// locator spellings of the same listing collapse to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemIdentity {
    pub source: SourceId,
    pub external_id: String,
}

impl ItemIdentity {
    /// Derives the identity for a target, or None if the locator does not
    /// look like a listing page for its source.
    pub fn from_target(target: &CrawlTarget) -> Option<Self> {
        let external_id = listing_id(target.source, &target.locator)?;
        Some(Self {
            source: target.source,
            external_id,
        })
    }

    /// The persistence key, e.g. `rightmove:164209706`
    pub fn uid(&self) -> String {
        format!("{}:{}", self.source, self.external_id)
    }

    pub fn from_uid(uid: &str) -> Option<Self> {
        let (source, external_id) = uid.split_once(':')?;
        Some(Self {
            source: SourceId::from_db_string(source)?,
            external_id: external_id.to_string(),
        })
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.external_id)
    }
}

/// Extracts the numeric listing id from a locator's path, if present
///
/// Rightmove listings live under `/properties/<id>`, Zoopla rentals under
/// `/to-rent/details/<id>`. Anything after the digits (slugs, trailing
/// slashes) is ignored.
pub fn listing_id(source: SourceId, locator: &Url) -> Option<String> {
    let rest = locator.path().strip_prefix(source.listing_path_prefix())?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits)
}

/// Expands a seed into the paginated search URLs the portal expects
///
/// Rightmove paginates with an `index` offset in steps of 24; Zoopla with a
/// `pn` page number starting at 1. The seed URL itself is always page one.
pub fn pagination_urls(seed: &SearchSeed) -> Vec<Url> {
    let mut urls = vec![seed.url.clone()];

    for page in 1..seed.max_pages {
        let mut url = seed.url.clone();
        match seed.source {
            SourceId::Rightmove => {
                set_query_param(&mut url, "index", &(page * 24).to_string());
            }
            SourceId::Zoopla => {
                set_query_param(&mut url, "pn", &(page + 1).to_string());
            }
        }
        urls.push(url);
    }

    urls
}

/// Replaces or appends a single query parameter, keeping the others
fn set_query_param(url: &mut Url, name: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(name, value);
    drop(pairs);
}

/// Validation helper used by the config layer: does this locator belong to
/// the host the source is served from?
pub fn host_matches_source(source: SourceId, url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let expected = match source {
        SourceId::Rightmove => "rightmove.co.uk",
        SourceId::Zoopla => "zoopla.co.uk",
    };
    host == expected || host.ends_with(&format!(".{expected}"))
}
