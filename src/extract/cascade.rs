//! Ordered structural queries per detail-page field.
//!
//! Each field's list runs from tight structural anchors to broad class-name
//! patterns; the first query that produces a usable value wins.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use super::record::PartialRecord;
use super::salary::SalaryRange;
use super::sanitize::sanitize;
use super::text::{non_empty, prefer_rich_text, restore_ellipsis};

/// One extraction attempt.
#[derive(Debug)]
pub enum Query {
    /// A CSS selector; the first matching element is taken.
    Css(Selector),
    /// Any element whose class attribute contains the needle, ignoring case.
    ClassContains(&'static str),
}

impl Query {
    fn css(selector: &str) -> Option<Self> {
        match Selector::parse(selector) {
            Ok(parsed) => Some(Query::Css(parsed)),
            Err(e) => {
                warn!("Invalid selector '{}': {:?}", selector, e);
                None
            }
        }
    }

    /// First element this query matches.
    pub fn first<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        match self {
            Query::Css(selector) => document.select(selector).next(),
            Query::ClassContains(needle) => document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|element| {
                    element
                        .value()
                        .attr("class")
                        .map(|class| class.to_ascii_lowercase().contains(*needle))
                        .unwrap_or(false)
                }),
        }
    }
}

enum Spec {
    Css(&'static str),
    Class(&'static str),
}

fn build(specs: &[Spec]) -> Vec<Query> {
    specs
        .iter()
        .filter_map(|spec| match spec {
            Spec::Css(selector) => Query::css(selector),
            Spec::Class(needle) => Some(Query::ClassContains(*needle)),
        })
        .collect()
}

/// Query lists for every detail-page field.
#[derive(Debug)]
pub struct SelectorCascade {
    pub title: Vec<Query>,
    pub company: Vec<Query>,
    pub job_type: Vec<Query>,
    pub location: Vec<Query>,
    pub salary: Vec<Query>,
    pub category: Vec<Query>,
    pub description: Vec<Query>,
    pub date_posted: Vec<Query>,
}

impl Default for SelectorCascade {
    fn default() -> Self {
        use Spec::{Class, Css};

        Self {
            title: build(&[
                Css("article header h1"),
                Css("article h1"),
                Css("main h1"),
                Css("h1[class*='title']"),
                Css("h1"),
                Class("job-title"),
            ]),
            company: build(&[
                Css("article header h2 a"),
                Css("article header h2"),
                Css("[data-cy='company-name']"),
                Css("a[href*='/company/']"),
                Class("company"),
                Class("employer"),
            ]),
            job_type: build(&[
                Css("article header a[href*='job-type']"),
                Css("[data-cy='job-type']"),
                Class("job-type"),
                Class("employment-type"),
                Class("jobtype"),
            ]),
            location: build(&[
                Css("article header a[href*='location']"),
                Css("[data-cy='location']"),
                Css("[itemprop='jobLocation']"),
                Class("location"),
            ]),
            salary: build(&[
                Css("article header [class*='salary'] span"),
                Css("[data-cy='salary']"),
                Css("[itemprop='baseSalary']"),
                Class("salary"),
            ]),
            category: build(&[
                Css("article header a[href*='job-function']"),
                Css("[data-cy='category']"),
                Class("job-function"),
                Class("category"),
            ]),
            description: build(&[
                Css("article .job__details"),
                Css("article [class*='description']"),
                Css("[data-cy='job-description']"),
                Css("#job-description"),
                Css("[itemprop='description']"),
                Class("description"),
                Css("article"),
            ]),
            date_posted: build(&[
                Css("article time[datetime]"),
                Css("time[datetime]"),
                Css("[itemprop='datePosted']"),
                Class("date-posted"),
                Class("posted"),
                Css("time"),
            ]),
        }
    }
}

static DEFAULT_CASCADE: LazyLock<SelectorCascade> = LazyLock::new(SelectorCascade::default);

/// Element from the first query that matches anything at all.
pub fn resolve_field<'a>(document: &'a Html, queries: &[Query]) -> Option<ElementRef<'a>> {
    queries.iter().find_map(|query| query.first(document))
}

/// Walk the queries in order and return the first value `extract` accepts.
///
/// A query whose first element yields nothing falls through to the next
/// query, so an empty placeholder node does not mask a populated one.
pub fn first_match<'a, T>(
    document: &'a Html,
    queries: &[Query],
    mut extract: impl FnMut(ElementRef<'a>) -> Option<T>,
) -> Option<T> {
    queries
        .iter()
        .filter_map(|query| resolve_field(document, std::slice::from_ref(query)))
        .find_map(|element| extract(element))
}

fn rich_text(element: ElementRef<'_>) -> Option<String> {
    non_empty(&restore_ellipsis(&prefer_rich_text(&element)))
}

fn salary_text(element: ElementRef<'_>) -> Option<String> {
    let raw = rich_text(element)?;
    Some(
        SalaryRange::parse(&raw)
            .map(|salary| salary.to_string())
            .unwrap_or(raw),
    )
}

fn date_text(element: ElementRef<'_>) -> Option<String> {
    element
        .value()
        .attr("datetime")
        .and_then(non_empty)
        .or_else(|| rich_text(element))
}

/// Detail-page fields from the DOM alone, using the built-in query lists.
pub fn cascade_fields(document: &Html, base: &Url) -> PartialRecord {
    cascade_fields_with(&DEFAULT_CASCADE, document, base)
}

/// Detail-page fields from the DOM using an explicit cascade.
pub fn cascade_fields_with(cascade: &SelectorCascade, document: &Html, base: &Url) -> PartialRecord {
    PartialRecord {
        title: first_match(document, &cascade.title, rich_text),
        company: first_match(document, &cascade.company, rich_text),
        job_type: first_match(document, &cascade.job_type, rich_text),
        location: first_match(document, &cascade.location, rich_text),
        salary_range: first_match(document, &cascade.salary, salary_text),
        category: first_match(document, &cascade.category, rich_text),
        description: first_match(document, &cascade.description, |element| {
            Some(sanitize(element, base)).filter(|d| !d.is_empty())
        }),
        date_posted: first_match(document, &cascade.date_posted, date_text),
    }
}
