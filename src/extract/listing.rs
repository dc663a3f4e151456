//! Detail-link collection and card discovery on list pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::classify::{classify_card, CardSeed};
use super::links::{canonicalize, try_resolve};
use super::record::ListingSeed;

/// How far up from a detail link a card may extend.
const MAX_CARD_DEPTH: usize = 6;

static ANCHOR_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a[href]").ok());

/// Site-specific knowledge needed to read a list page.
#[derive(Debug, Clone)]
pub struct ListingRules {
    detail_link: Regex,
    card_selectors: Vec<Selector>,
}

impl ListingRules {
    /// `detail_pattern` is matched against the path of resolved links.
    pub fn new(detail_pattern: &str, card_selectors: &[String]) -> Result<Self, regex::Error> {
        let detail_link = Regex::new(detail_pattern)?;

        let card_selectors = card_selectors
            .iter()
            .filter_map(|selector| match Selector::parse(selector) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("Invalid card selector '{}': {:?}", selector, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            detail_link,
            card_selectors,
        })
    }

    pub fn is_detail_link(&self, url: &Url) -> bool {
        self.detail_link.is_match(url.path())
    }

    /// Resolved detail links under `scope`, in document order.
    pub fn detail_links<'a>(&self, scope: ElementRef<'a>, base: &Url) -> Vec<(Url, ElementRef<'a>)> {
        let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
            return Vec::new();
        };

        scope
            .select(selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                match try_resolve(href, base) {
                    Ok(url) if self.is_detail_link(&url) => Some((url, anchor)),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Dropping link: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Distinct detail URLs on the page, canonicalized, in document order.
    pub fn collect_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        self.detail_links(document.root_element(), base)
            .into_iter()
            .map(|(url, _)| canonicalize(&url))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Card elements of a list page.
    ///
    /// Configured selectors are tried first; otherwise each detail link's
    /// card is its highest ancestor that still holds only that one job.
    pub fn find_cards<'a>(&self, document: &'a Html, base: &Url) -> Vec<ElementRef<'a>> {
        for selector in &self.card_selectors {
            let cards: Vec<ElementRef<'a>> = document
                .select(selector)
                .filter(|card| !self.detail_links(*card, base).is_empty())
                .collect();
            if !cards.is_empty() {
                return cards;
            }
        }

        let mut cards: Vec<ElementRef<'a>> = Vec::new();
        let mut seen = HashSet::new();

        for (url, anchor) in self.detail_links(document.root_element(), base) {
            let key = canonicalize(&url);
            if !seen.insert(key.clone()) {
                continue;
            }

            let card = self.widest_single_job_ancestor(anchor, &key, base);
            if !cards.contains(&card) {
                cards.push(card);
            }
        }

        cards
    }

    fn widest_single_job_ancestor<'a>(&self, anchor: ElementRef<'a>, key: &str, base: &Url) -> ElementRef<'a> {
        let mut card = anchor;

        for _ in 0..MAX_CARD_DEPTH {
            let Some(parent) = card.parent().and_then(ElementRef::wrap) else {
                break;
            };
            if matches!(parent.value().name(), "html" | "body") {
                break;
            }

            let other_job = self
                .detail_links(parent, base)
                .iter()
                .any(|(url, _)| canonicalize(url) != key);
            if other_job {
                break;
            }
            card = parent;
        }

        card
    }

    /// Links plus seeds for a list page.
    pub fn harvest(&self, document: &Html, base: &Url) -> ListingHarvest {
        let links = self.collect_links(document, base);

        let mut seeds = Vec::new();
        let mut seeded = HashSet::new();
        for card in self.find_cards(document, base) {
            if let Some(CardSeed { url, seed }) = classify_card(card, base, self) {
                let key = canonicalize(&url);
                if seeded.insert(key.clone()) {
                    seeds.push((key, seed));
                }
            }
        }

        ListingHarvest { links, seeds }
    }
}

/// Everything a list page yields before quota decisions.
#[derive(Debug, Clone, Default)]
pub struct ListingHarvest {
    /// Canonical detail URLs in document order
    pub links: Vec<String>,
    /// Seeds keyed by canonical detail URL, in card order
    pub seeds: Vec<(String, ListingSeed)>,
}

impl ListingHarvest {
    pub fn seed_for(&self, url: &str) -> Option<&ListingSeed> {
        self.seeds.iter().find(|(key, _)| key == url).map(|(_, seed)| seed)
    }
}
