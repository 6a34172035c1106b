use regex::Regex;

const DOMAIN_PATTERN: &str =
    r"(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,6}";

/// Best-effort site domain from a browser window title.
///
/// Browsers title their windows `<page> - <site or browser>`, so only
/// titles with at least one ` - ` separator are considered. A miss simply
/// leaves the session without a domain.
pub struct SiteDomainExtractor {
    pattern: Regex,
}

impl SiteDomainExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(DOMAIN_PATTERN)? })
    }

    pub fn extract(&self, title: &str) -> Option<String> {
        if !title.contains(" - ") {
            return None;
        }

        title
            .split(" - ")
            .filter_map(|part| self.pattern.find(part.trim()))
            .map(|found| found.as_str().to_lowercase())
            .next()
    }
}
