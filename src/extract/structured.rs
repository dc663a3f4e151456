//! Embedded JSON-LD discovery and mapping of `JobPosting` nodes.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::record::PartialRecord;
use super::salary::{parse_amount, SalaryRange};
use super::sanitize::sanitize_html;
use super::text::{non_empty, normalize};

const JOB_POSTING_TYPE: &str = "JobPosting";

static SCRIPT_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("script[type]").ok());

/// First embedded `JobPosting` node in document order, if any.
///
/// Blocks that fail to parse are skipped. Arrays and `@graph` containers
/// are flattened one level before matching.
pub fn find_job_posting(document: &Html) -> Option<Value> {
    let selector = SCRIPT_SELECTOR.as_ref()?;

    for (index, script) in document.select(selector).enumerate() {
        let is_json_ld = script
            .value()
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
            .unwrap_or(false);
        if !is_json_ld {
            continue;
        }

        let raw: String = script.text().collect();
        let parsed: Value = match serde_json::from_str(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping malformed structured data block {}: {}", index, e);
                continue;
            }
        };

        if let Some(node) = flatten(parsed).into_iter().find(is_job_posting) {
            return Some(node);
        }
    }

    None
}

fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let graph = match map.remove("@graph") {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            };
            let mut nodes = vec![Value::Object(map)];
            nodes.extend(graph);
            nodes
        }
        other => vec![other],
    }
}

fn is_job_posting(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => type_matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(type_matches),
        _ => false,
    }
}

fn type_matches(declared: &str) -> bool {
    let declared = declared.trim();
    declared == JOB_POSTING_TYPE
        || declared
            .rsplit(|c: char| c == '/' || c == ':')
            .next()
            .map(|tail| tail == JOB_POSTING_TYPE)
            .unwrap_or(false)
}

/// Map a `JobPosting` node onto record fields.
pub fn structured_fields(node: &Value, base: &Url, default_currency: &str) -> PartialRecord {
    PartialRecord {
        title: node.get("title").and_then(string_field),
        company: node.get("hiringOrganization").and_then(organization_name),
        job_type: node.get("employmentType").and_then(employment_type),
        location: node.get("jobLocation").and_then(location),
        salary_range: node
            .get("baseSalary")
            .and_then(|salary| base_salary(salary, default_currency)),
        category: node
            .get("occupationalCategory")
            .and_then(joined_strings)
            .or_else(|| node.get("industry").and_then(joined_strings)),
        description: node
            .get("description")
            .and_then(Value::as_str)
            .map(|markup| sanitize_html(&unescape_markup(markup), base))
            .filter(|d| !d.is_empty()),
        date_posted: node.get("datePosted").and_then(string_field),
    }
}

/// Plain string with entities decoded and stray tags dropped.
fn string_field(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    non_empty(&decode_entities(&raw))
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') && !raw.contains('<') {
        return raw.to_string();
    }
    let fragment = Html::parse_fragment(raw);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Descriptions are sometimes entity-escaped markup; decode once so the
/// sanitizer sees real tags.
fn unescape_markup(raw: &str) -> String {
    if !raw.contains('<') && raw.contains("&lt;") {
        decode_entities(raw)
    } else {
        raw.to_string()
    }
}

fn organization_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => value.get("name").and_then(string_field),
        Value::Array(items) => items.iter().find_map(organization_name),
        other => string_field(other),
    }
}

fn joined_strings(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(string_field).collect();
            non_empty(&parts.join(", "))
        }
        other => string_field(other),
    }
}

/// `FULL_TIME` -> `Full Time`
fn employment_type(value: &Value) -> Option<String> {
    let joined = joined_strings(value)?;
    let pretty = joined
        .split(", ")
        .map(|part| {
            part.replace(['_', '-'], " ")
                .split_whitespace()
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(", ");
    non_empty(&pretty)
}

fn title_case(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn location(value: &Value) -> Option<String> {
    match value {
        Value::Array(places) => {
            let parts: Vec<String> = places.iter().filter_map(location).collect();
            non_empty(&parts.join("; "))
        }
        Value::Object(_) => {
            let address = value.get("address");
            let from_address = match address {
                Some(Value::Object(_)) => address_parts(address),
                Some(other) => string_field(other),
                None => None,
            };
            from_address.or_else(|| value.get("name").and_then(string_field))
        }
        other => string_field(other),
    }
}

fn address_parts(address: Option<&Value>) -> Option<String> {
    let address = address?;
    let mut parts: Vec<String> = Vec::new();

    for key in ["addressLocality", "addressRegion", "addressCountry"] {
        let part = match address.get(key) {
            Some(Value::Object(_)) => address.get(key).and_then(|c| c.get("name")).and_then(string_field),
            Some(other) => string_field(other),
            None => None,
        };
        if let Some(part) = part {
            if !parts.iter().any(|p| p.eq_ignore_ascii_case(&part)) {
                parts.push(part);
            }
        }
    }

    non_empty(&parts.join(", "))
}

fn base_salary(value: &Value, default_currency: &str) -> Option<String> {
    match value {
        Value::Object(_) => {
            let currency = value
                .get("currency")
                .and_then(Value::as_str)
                .map(normalize)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| default_currency.to_string());

            let (min, max) = match value.get("value") {
                Some(quantity @ Value::Object(_)) => {
                    let min = quantity
                        .get("minValue")
                        .and_then(amount)
                        .or_else(|| quantity.get("value").and_then(amount));
                    let max = quantity.get("maxValue").and_then(amount);
                    (min, max)
                }
                Some(other) => (amount(other), None),
                None => (None, None),
            };

            // A range given only as a maximum still has a floor worth showing
            let (min, max) = match (min, max) {
                (Some(min), max) => (min, max),
                (None, Some(max)) => (max, None),
                (None, None) => return None,
            };
            Some(SalaryRange::new(currency, min, max).to_string())
        }
        Value::String(s) => SalaryRange::parse(s)
            .or_else(|| parse_amount(s).map(|min| SalaryRange::new(default_currency, min, None)))
            .map(|salary| salary.to_string()),
        Value::Number(_) => amount(value).map(|min| SalaryRange::new(default_currency, min, None).to_string()),
        _ => None,
    }
}

fn amount(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}
