//! Line-level classification of list-page cards.
//!
//! Cards rarely carry clean structure, so their visible text is split into
//! lines and each line is labelled by ordered exclusion rules. Every field
//! takes the first qualifying line in document order.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};
use url::Url;

use super::listing::ListingRules;
use super::record::ListingSeed;
use super::salary::SalaryRange;
use super::text::{normalize, prefer_rich_text, restore_ellipsis};

static BADGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:new|today|yesterday|just now|easy apply|featured|promoted|\d+\s*(?:minute|hour|day|week|month)s?\s+ago)[\s•·|,]*)+$",
    )
    .expect("badge pattern is valid")
});

static EMPLOYMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:full[\s-]*time|part[\s-]*time|contract|temporary|internship|remote|hybrid|freelance|volunteer)\b",
    )
    .expect("employment pattern is valid")
});

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n\s*|[\s\u{a0}]{2,}").expect("line break pattern is valid"));

/// Elements whose boundaries start a new visual line.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "ol", "p", "section", "table", "td", "th", "tr", "ul",
];

/// Employment type and the location written in front of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLine {
    pub job_type: String,
    pub location: Option<String>,
}

/// What a single card line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRole {
    Title,
    Company,
    Badge,
    /// A pay figure; the same line may also carry the employment type.
    Salary {
        salary: SalaryRange,
        meta: Option<MetaLine>,
    },
    Meta(MetaLine),
    Category,
    Unknown,
}

/// Label a line on its own. Positional roles (company, category) come back
/// as `Unknown` and are assigned by [`assign_roles`].
pub fn classify_line(line: &str, title: &str) -> LineRole {
    if is_title_line(line, title) {
        return LineRole::Title;
    }
    if BADGE_RE.is_match(line) {
        return LineRole::Badge;
    }

    let salary = SalaryRange::find(line);
    let meta = meta_line(line, salary.as_ref().map(|(_, span)| span.clone()));

    match (salary, meta) {
        (Some((salary, _)), meta) => LineRole::Salary { salary, meta },
        (None, Some(meta)) => LineRole::Meta(meta),
        (None, None) => LineRole::Unknown,
    }
}

/// The first employment keyword on the line. The location is the text in
/// front of it, minus any salary figure that also sits there.
fn meta_line(line: &str, salary_span: Option<Range<usize>>) -> Option<MetaLine> {
    let found = EMPLOYMENT_RE.find(line)?;

    let start = salary_span
        .filter(|span| span.end <= found.start())
        .map_or(0, |span| span.end);
    let location = line[start..found.start()]
        .trim_matches(|c: char| c.is_whitespace() || ",|•·-–/".contains(c));

    Some(MetaLine {
        job_type: normalize(found.as_str()),
        location: if location.is_empty() {
            None
        } else {
            Some(normalize(location))
        },
    })
}

/// Classify every line and hand out the positional roles: the first free
/// line is the company, the next one the category.
pub fn assign_roles(lines: &[String], title: &str) -> Vec<LineRole> {
    let mut company_taken = false;
    let mut category_taken = false;

    lines
        .iter()
        .map(|line| match classify_line(line, title) {
            LineRole::Unknown if !company_taken => {
                company_taken = true;
                LineRole::Company
            }
            LineRole::Unknown if !category_taken => {
                category_taken = true;
                LineRole::Category
            }
            role => role,
        })
        .collect()
}

/// Visible lines of a card, trimmed, empties dropped.
pub fn card_lines(card: ElementRef<'_>) -> Vec<String> {
    let mut raw = String::new();
    collect_lines(card, &mut raw);

    LINE_BREAK_RE
        .split(&raw)
        .map(normalize)
        .filter(|line| !line.is_empty())
        .collect()
}

enum Step<N> {
    Enter(N),
    LeaveBlock,
}

/// Card text with a newline at every block boundary. Walks with an explicit
/// stack so nesting depth does not matter.
fn collect_lines(element: ElementRef<'_>, out: &mut String) {
    let mut stack: Vec<Step<_>> = element.children().rev().map(Step::Enter).collect();

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Enter(node) => node,
            Step::LeaveBlock => {
                out.push('\n');
                continue;
            }
        };

        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                if BLOCK_TAGS.contains(&el.name()) {
                    out.push('\n');
                    stack.push(Step::LeaveBlock);
                }
                if !matches!(el.name(), "script" | "style" | "noscript" | "template") {
                    stack.extend(node.children().rev().map(Step::Enter));
                }
            }
            _ => {}
        }
    }
}

fn is_title_line(line: &str, title: &str) -> bool {
    if title.is_empty() {
        return false;
    }
    let line = restore_ellipsis(line);
    if line.eq_ignore_ascii_case(title) {
        return true;
    }
    // A visibly clipped copy of the full title
    match line.strip_suffix("...") {
        Some(prefix) if !prefix.trim().is_empty() => title
            .to_lowercase()
            .starts_with(&prefix.trim_end().to_lowercase()),
        _ => false,
    }
}

/// A card reduced to its detail URL and seed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSeed {
    pub url: Url,
    pub seed: ListingSeed,
}

/// Build a seed from one card. `None` when the card holds no detail link.
pub fn classify_card(card: ElementRef<'_>, base: &Url, rules: &ListingRules) -> Option<CardSeed> {
    let detail_links = rules.detail_links(card, base);
    let (url, _) = detail_links.first()?.clone();
    let url_key = super::links::canonicalize(&url);

    let title = detail_links
        .iter()
        .filter(|(link_url, _)| super::links::canonicalize(link_url) == url_key)
        .map(|(_, anchor)| restore_ellipsis(&prefer_rich_text(anchor)))
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    let lines = card_lines(card);
    let roles = assign_roles(&lines, &title);

    let mut seed = ListingSeed {
        title: if title.is_empty() { None } else { Some(title) },
        ..Default::default()
    };

    for (line, role) in lines.iter().zip(roles) {
        match role {
            LineRole::Company if seed.company.is_none() => seed.company = Some(line.clone()),
            LineRole::Category if seed.category.is_none() => seed.category = Some(line.clone()),
            LineRole::Salary { salary, meta } => {
                if seed.salary_range.is_none() {
                    seed.salary_range = Some(salary.to_string());
                }
                if let Some(meta) = meta {
                    fill_meta(&mut seed, meta);
                }
            }
            LineRole::Meta(meta) => fill_meta(&mut seed, meta),
            _ => {}
        }
    }

    Some(CardSeed { url, seed })
}

fn fill_meta(seed: &mut ListingSeed, meta: MetaLine) {
    if seed.job_type.is_none() {
        seed.job_type = Some(meta.job_type);
        seed.location = meta.location;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn rules() -> ListingRules {
        ListingRules::new(r"^/listings/[^/]+/?$", &[]).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.example.com/jobs").unwrap()
    }

    fn first_card(html: &str) -> CardSeed {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse("div.card").unwrap();
        let card = document.select(&selector).next().unwrap();
        classify_card(card, &base(), &rules()).unwrap()
    }

    #[test]
    fn test_classify_line_rules() {
        let title = "Backend Engineer";
        assert_eq!(classify_line("Backend Engineer", title), LineRole::Title);
        assert_eq!(classify_line("Backend Eng…", title), LineRole::Title);
        assert_eq!(classify_line("New", title), LineRole::Badge);
        assert_eq!(classify_line("Easy Apply", title), LineRole::Badge);
        assert_eq!(classify_line("Featured • 3 days ago", title), LineRole::Badge);
        assert_eq!(
            classify_line("NGN 80,000", title),
            LineRole::Salary {
                salary: SalaryRange::new("NGN", 80_000, None),
                meta: None,
            }
        );
        assert_eq!(
            classify_line("Lagos, Nigeria • Full  Time", title),
            LineRole::Meta(MetaLine {
                job_type: "Full Time".to_string(),
                location: Some("Lagos, Nigeria".to_string()),
            })
        );
        assert_eq!(
            classify_line("Remote", title),
            LineRole::Meta(MetaLine { job_type: "Remote".to_string(), location: None })
        );
        assert_eq!(classify_line("ICT 3", title), LineRole::Unknown);
        assert_eq!(classify_line("Acme Ltd", title), LineRole::Unknown);
        assert_eq!(classify_line("Contractors Union", title), LineRole::Unknown);
    }

    #[test]
    fn test_assign_roles_first_wins() {
        let lines: Vec<String> = ["Backend Engineer", "New", "Acme Ltd", "Lagos Full Time", "Engineering", "Extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let roles = assign_roles(&lines, "Backend Engineer");
        assert_eq!(roles[0], LineRole::Title);
        assert_eq!(roles[1], LineRole::Badge);
        assert_eq!(roles[2], LineRole::Company);
        assert!(matches!(roles[3], LineRole::Meta(_)));
        assert_eq!(roles[4], LineRole::Category);
        assert_eq!(roles[5], LineRole::Unknown);
    }

    #[test]
    fn test_classify_card() {
        let seed = first_card(
            r#"<div class="card">
                 <a href="/listings/backend-engineer-x1?ref=list" title="Backend Engineer, Payments">Backend Engineer, Pay…</a>
                 <span class="badge">New</span>
                 <p>Acme Ltd</p>
                 <p>Lagos <span>Full Time</span></p>
                 <p>NGN 150,000 - 250,000</p>
                 <p>Software &amp; Data</p>
                 <p>Easy Apply</p>
               </div>"#,
        );

        assert_eq!(seed.url.as_str(), "https://www.example.com/listings/backend-engineer-x1?ref=list");
        assert_eq!(seed.seed.title.as_deref(), Some("Backend Engineer, Payments"));
        assert_eq!(seed.seed.company.as_deref(), Some("Acme Ltd"));
        assert_eq!(seed.seed.job_type.as_deref(), Some("Full Time"));
        assert_eq!(seed.seed.location.as_deref(), Some("Lagos"));
        assert_eq!(seed.seed.salary_range.as_deref(), Some("NGN 150,000 - NGN 250,000"));
        assert_eq!(seed.seed.category.as_deref(), Some("Software & Data"));
    }

    #[test]
    fn test_salary_and_meta_on_one_line() {
        let salary = SalaryRange::new("NGN", 80_000, None);
        assert_eq!(
            classify_line("Lagos Full Time NGN 80,000", "Driver"),
            LineRole::Salary {
                salary: salary.clone(),
                meta: Some(MetaLine {
                    job_type: "Full Time".to_string(),
                    location: Some("Lagos".to_string()),
                }),
            }
        );
        assert_eq!(
            classify_line("NGN 80,000 • Abuja Contract", "Driver"),
            LineRole::Salary {
                salary,
                meta: Some(MetaLine {
                    job_type: "Contract".to_string(),
                    location: Some("Abuja".to_string()),
                }),
            }
        );

        let seed = first_card(
            r#"<div class="card">
                 <a href="/listings/driver">Driver</a>
                 <p>Initech</p>
                 <p>Lagos Full Time NGN 80,000</p>
                 <p>Logistics</p>
               </div>"#,
        );
        assert_eq!(seed.seed.company.as_deref(), Some("Initech"));
        assert_eq!(seed.seed.job_type.as_deref(), Some("Full Time"));
        assert_eq!(seed.seed.location.as_deref(), Some("Lagos"));
        assert_eq!(seed.seed.salary_range.as_deref(), Some("NGN 80,000"));
        assert_eq!(seed.seed.category.as_deref(), Some("Logistics"));
    }

    #[test]
    fn test_card_lines_on_deep_nesting() {
        let depth = 20_000;
        let markup = format!(
            "<div class=\"card\">{}Acme{}</div>",
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        );

        let lines = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let document = Html::parse_fragment(&markup);
                let selector = Selector::parse("div.card").unwrap();
                let card = document.select(&selector).next().unwrap();
                card_lines(card)
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(lines, vec!["Acme"]);
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let seed = first_card(
            r#"<div class="card"><a href="/listings/driver">Driver</a><div>Featured</div></div>"#,
        );
        assert_eq!(seed.seed.title.as_deref(), Some("Driver"));
        assert_eq!(seed.seed.company, None);
        assert_eq!(seed.seed.job_type, None);
        assert_eq!(seed.seed.location, None);
        assert_eq!(seed.seed.salary_range, None);
        assert_eq!(seed.seed.category, None);
    }

    #[test]
    fn test_card_without_detail_link() {
        let document = Html::parse_fragment(r#"<div class="card"><a href="/about">About</a></div>"#);
        let selector = Selector::parse("div.card").unwrap();
        let card = document.select(&selector).next().unwrap();
        assert!(classify_card(card, &base(), &rules()).is_none());
    }

    #[test]
    fn test_card_lines_split_on_blocks_and_wide_gaps() {
        let document = Html::parse_fragment(
            "<div class=\"card\"><h3>Title</h3>Acme    Lagos<br>Remote<script>x=1</script></div>",
        );
        let selector = Selector::parse("div.card").unwrap();
        let card = document.select(&selector).next().unwrap();
        assert_eq!(card_lines(card), vec!["Title", "Acme", "Lagos", "Remote"]);
    }
}
