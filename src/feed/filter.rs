use crate::listing::ListingEntry;

/// Per-request entry filters, applied before any content is fetched.
///
/// Each predicate is independent; an unset field disables it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Drop adult entries (over-18 flag or an "nsfw" flair).
    pub safe: bool,
    /// Drop entries scoring below this value.
    pub min_score: Option<i64>,
    /// Keep only entries whose flair matches exactly.
    pub flair: Option<String>,
}

impl Filters {
    /// Parses filters from a raw query string.
    ///
    /// - `limit=<int>` sets the score floor; a value that is not an integer
    ///   leaves it unset
    /// - `safe=<bool>` is on only when the value is `true` in any case
    /// - `flair=<text>` is ignored when empty
    ///
    /// When a key repeats, its first occurrence wins.
    pub fn from_query(query: &str) -> Self {
        let mut filters = Filters::default();
        let (mut seen_limit, mut seen_safe, mut seen_flair) = (false, false, false);

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "limit" if !seen_limit => {
                    seen_limit = true;
                    filters.min_score = value.trim().parse().ok();
                }
                "safe" if !seen_safe => {
                    seen_safe = true;
                    filters.safe = value.to_lowercase() == "true";
                }
                "flair" if !seen_flair => {
                    seen_flair = true;
                    filters.flair = Some(value.into_owned()).filter(|f| !f.is_empty());
                }
                _ => {}
            }
        }
        filters
    }

    pub fn allows(&self, entry: &ListingEntry) -> bool {
        if self.safe && is_adult(entry) {
            return false;
        }
        if self.min_score.is_some_and(|floor| entry.score < floor) {
            return false;
        }
        if let Some(flair) = &self.flair {
            if entry.flair() != flair {
                return false;
            }
        }
        true
    }
}

fn is_adult(entry: &ListingEntry) -> bool {
    entry.over_18 || entry.flair().eq_ignore_ascii_case("nsfw")
}
