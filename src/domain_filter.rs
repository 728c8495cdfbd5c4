use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Decides which zones the adapter manages.
///
/// Either literal include/exclude lists or a regex pair; the regex pair
/// takes precedence when set.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    regex: Option<Regex>,
    regex_exclusion: Option<Regex>,
}

impl DomainFilter {
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            include: normalize_all(include),
            exclude: normalize_all(exclude),
            regex: None,
            regex_exclusion: None,
        }
    }

    pub fn with_regex(include: &str, exclude: &str) -> Result<Self, FilterError> {
        Ok(Self {
            regex: compile(include)?,
            regex_exclusion: compile(exclude)?,
            ..Default::default()
        })
    }

    pub fn is_configured(&self) -> bool {
        self.uses_regex() || !self.include.is_empty() || !self.exclude.is_empty()
    }

    pub fn matches(&self, domain: &str) -> bool {
        if self.uses_regex() {
            let included = self.regex.as_ref().map_or(true, |r| r.is_match(domain));
            let excluded = self
                .regex_exclusion
                .as_ref()
                .map_or(false, |r| r.is_match(domain));
            return included && !excluded;
        }

        match_list(&self.include, domain, true) && !match_list(&self.exclude, domain, false)
    }

    fn uses_regex(&self) -> bool {
        self.regex.is_some() || self.regex_exclusion.is_some()
    }
}

fn compile(pattern: &str) -> Result<Option<Regex>, FilterError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| FilterError::BadRegex {
            pattern: pattern.to_owned(),
            source,
        })
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

fn normalize_all<I>(domains: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    domains
        .into_iter()
        .map(|d| normalize(d.as_ref()))
        .filter(|d| !d.is_empty())
        .collect()
}

// A leading dot restricts a filter to subdomains.
fn match_list(filters: &[String], domain: &str, when_empty: bool) -> bool {
    if filters.is_empty() {
        return when_empty;
    }

    let domain = normalize(domain);
    filters.iter().any(|filter| {
        if filter.starts_with('.') {
            domain.ends_with(filter.as_str())
        } else {
            domain == *filter || domain.ends_with(&format!(".{filter}"))
        }
    })
}

#[derive(Serialize)]
#[serde(untagged)]
enum FilterRepr<'a> {
    #[serde(rename_all = "camelCase")]
    Regex {
        #[serde(skip_serializing_if = "Option::is_none")]
        regex_include: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        regex_exclude: Option<&'a str>,
    },
    Literal {
        #[serde(skip_serializing_if = "is_empty")]
        include: &'a [String],
        #[serde(skip_serializing_if = "is_empty")]
        exclude: &'a [String],
    },
}

fn is_empty(list: &&[String]) -> bool {
    list.is_empty()
}

impl Serialize for DomainFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = if self.uses_regex() {
            FilterRepr::Regex {
                regex_include: self.regex.as_ref().map(Regex::as_str),
                regex_exclude: self.regex_exclusion.as_ref().map(Regex::as_str),
            }
        } else {
            FilterRepr::Literal {
                include: &self.include,
                exclude: &self.exclude,
            }
        };
        repr.serialize(serializer)
    }
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid domain filter regex {pattern:?}: {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
