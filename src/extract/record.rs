use serde::{Deserialize, Serialize};

/// A fully resolved job posting, the unit handed to the output sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Canonical absolute URL of the detail page (unique key)
    pub url: String,
    pub title: String,
    pub company: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub category: Option<String>,
    pub description_html: Option<String>,
    pub description_text: Option<String>,
    pub date_posted: Option<String>,
}

/// Lightweight fields harvested from a list-page card.
///
/// Travels with the detail request and is merged at the lowest precedence
/// once the detail page has been parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSeed {
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub category: Option<String>,
}

/// Both halves of a description, always produced from the same fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub html: String,
    pub text: String,
}

impl Description {
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty() && self.text.trim().is_empty()
    }
}

/// The fields one source tier managed to extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub category: Option<String>,
    pub description: Option<Description>,
    pub date_posted: Option<String>,
}

impl From<&ListingSeed> for PartialRecord {
    fn from(seed: &ListingSeed) -> Self {
        Self {
            title: seed.title.clone(),
            company: seed.company.clone(),
            job_type: seed.job_type.clone(),
            location: seed.location.clone(),
            salary_range: seed.salary_range.clone(),
            category: seed.category.clone(),
            description: None,
            date_posted: None,
        }
    }
}

impl ListingSeed {
    /// Turn a seed straight into a record when detail pages are skipped.
    pub fn into_record(self, url: String) -> Option<JobRecord> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(JobRecord {
            url,
            title,
            company: self.company,
            job_type: self.job_type,
            location: self.location,
            salary_range: self.salary_range,
            category: self.category,
            ..Default::default()
        })
    }
}
