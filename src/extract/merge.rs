//! Per-field precedence between the three source tiers.
//!
//! Structured data beats the selector cascade, which beats the list-page
//! seed. A tier only wins with a value that is non-empty once normalized.

use super::record::{JobRecord, ListingSeed, PartialRecord};
use super::text::non_empty;
use super::ExtractError;

/// Highest-precedence non-empty value, normalized.
fn pick(tiers: [Option<&String>; 3]) -> Option<String> {
    tiers.into_iter().flatten().find_map(|value| non_empty(value))
}

/// Combine the tiers into a record for `url`.
///
/// The description halves always come from one tier together. A record
/// whose merged title is empty is rejected.
pub fn merge(
    seed: &ListingSeed,
    cascade: &PartialRecord,
    structured: &PartialRecord,
    url: String,
) -> Result<JobRecord, ExtractError> {
    let seed = PartialRecord::from(seed);

    macro_rules! field {
        ($name:ident) => {
            pick([
                structured.$name.as_ref(),
                cascade.$name.as_ref(),
                seed.$name.as_ref(),
            ])
        };
    }

    let Some(title) = field!(title) else {
        return Err(ExtractError::MissingTitle { url });
    };

    let description = structured
        .description
        .as_ref()
        .filter(|d| !d.is_empty())
        .or_else(|| cascade.description.as_ref().filter(|d| !d.is_empty()));

    Ok(JobRecord {
        url,
        title,
        company: field!(company),
        job_type: field!(job_type),
        location: field!(location),
        salary_range: field!(salary_range),
        category: field!(category),
        description_html: description.and_then(|d| non_empty(&d.html).map(|_| d.html.clone())),
        description_text: description.and_then(|d| non_empty(&d.text)),
        date_posted: field!(date_posted),
    })
}
