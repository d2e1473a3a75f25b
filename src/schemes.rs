use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

/// Identifier schemes accepted as citation targets
pub const CITATION_SCHEMES: [&str; 4] = ["doi", "pmid", "pmcid", "wikidata"];

/// Identifier schemes accepted for containers (venues)
pub const CONTAINER_SCHEMES: [&str; 2] = ["issn", "isbn"];

/// Identifier schemes accepted for responsible agents
pub const AGENT_SCHEMES: [&str; 3] = ["orcid", "viaf", "ror"];

/// Per-scheme normalization and validity rules.
///
/// `normalise` canonicalizes a raw value (stripping scheme prefixes and URL
/// forms) and returns `None` when the value cannot belong to the scheme.
/// `is_valid` is the authoritative check for a normalized identifier; here it
/// is an offline syntax/checksum decision, but implementations are free to
/// consult an external authority instead.
pub trait IdManager: Send + Sync {
    fn scheme(&self) -> &'static str;

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String>;

    fn is_valid(&self, normalized: &str) -> bool;

    /// Strips this scheme's `<scheme>:` prefix, if present (case-insensitive).
    fn strip_scheme_prefix<'a>(&self, value: &'a str) -> &'a str {
        let trimmed = value.trim();
        let scheme = self.scheme();
        let bytes = trimmed.as_bytes();
        if bytes.len() > scheme.len()
            && bytes[scheme.len()] == b':'
            && bytes[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
        {
            trimmed[scheme.len() + 1..].trim()
        } else {
            trimmed
        }
    }

    fn with_prefix(&self, canonical: String, include_prefix: bool) -> String {
        if include_prefix {
            format!("{}:{}", self.scheme(), canonical)
        } else {
            canonical
        }
    }
}

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap());
static PMID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]{0,7}$").unwrap());
static PMCID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PMC[1-9][0-9]*$").unwrap());
static WIKIDATA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q[1-9][0-9]*$").unwrap());
static ISSN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{3}[0-9X]$").unwrap());
static ORCID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$").unwrap());
static VIAF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9][0-9]*$").unwrap());
static ROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0[0-9abcdefghjkmnpqrstvwxyz]{8}$").unwrap());

pub struct DoiManager;

impl IdManager for DoiManager {
    fn scheme(&self) -> &'static str {
        "doi"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let lowered = value.trim().to_lowercase();
        let stripped = self.strip_scheme_prefix(&lowered);
        let stripped = stripped
            .strip_prefix("https://doi.org/")
            .or_else(|| stripped.strip_prefix("http://doi.org/"))
            .or_else(|| stripped.strip_prefix("https://dx.doi.org/"))
            .or_else(|| stripped.strip_prefix("http://dx.doi.org/"))
            .unwrap_or(stripped);
        // a DOI starts at its "10." directory indicator wherever the raw
        // string buries it
        let start = stripped.find("10.")?;
        let canonical = stripped[start..].trim().to_string();
        if canonical.len() < 7 {
            return None;
        }
        Some(self.with_prefix(canonical, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        DOI_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

pub struct PmidManager;

impl IdManager for PmidManager {
    fn scheme(&self) -> &'static str {
        "pmid"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();
        let canonical = digits.trim_start_matches('0');
        if canonical.is_empty() {
            return None;
        }
        Some(self.with_prefix(canonical.to_string(), include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        PMID_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

pub struct PmcidManager;

impl IdManager for PmcidManager {
    fn scheme(&self) -> &'static str {
        "pmcid"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value).to_uppercase();
        let canonical = if stripped.starts_with("PMC") {
            stripped
        } else if stripped.chars().all(|c| c.is_ascii_digit()) && !stripped.is_empty() {
            format!("PMC{}", stripped)
        } else {
            return None;
        };
        Some(self.with_prefix(canonical, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        PMCID_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

pub struct WikidataManager;

impl IdManager for WikidataManager {
    fn scheme(&self) -> &'static str {
        "wikidata"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let stripped = stripped
            .strip_prefix("https://www.wikidata.org/wiki/")
            .or_else(|| stripped.strip_prefix("https://www.wikidata.org/entity/"))
            .or_else(|| stripped.strip_prefix("http://www.wikidata.org/entity/"))
            .unwrap_or(stripped);
        let canonical = stripped.to_uppercase();
        if canonical.is_empty() {
            return None;
        }
        Some(self.with_prefix(canonical, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        WIKIDATA_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

pub struct IssnManager;

impl IdManager for IssnManager {
    fn scheme(&self) -> &'static str {
        "issn"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let compact: String = stripped
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if compact.len() != 8 {
            return None;
        }
        let canonical = format!("{}-{}", &compact[..4], &compact[4..]);
        if !ISSN_RE.is_match(&canonical) {
            return None;
        }
        Some(self.with_prefix(canonical, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        let body = self.strip_scheme_prefix(normalized);
        if !ISSN_RE.is_match(body) {
            return false;
        }
        let mut sum = 0u32;
        for (i, c) in body.chars().filter(|c| *c != '-').enumerate() {
            let value = if c == 'X' { 10 } else { c as u32 - '0' as u32 };
            sum += value * (8 - i as u32);
        }
        sum % 11 == 0
    }
}

pub struct IsbnManager;

impl IdManager for IsbnManager {
    fn scheme(&self) -> &'static str {
        "isbn"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let compact: String = stripped
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let well_formed = match compact.len() {
            10 => {
                compact[..9].chars().all(|c| c.is_ascii_digit())
                    && matches!(compact.as_bytes()[9], b'0'..=b'9' | b'X')
            }
            13 => compact.chars().all(|c| c.is_ascii_digit()),
            _ => false,
        };
        if !well_formed {
            return None;
        }
        Some(self.with_prefix(compact, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        let body = self.strip_scheme_prefix(normalized);
        match body.len() {
            10 => {
                let mut sum = 0u32;
                for (i, c) in body.chars().enumerate() {
                    let value = match c {
                        'X' if i == 9 => 10,
                        '0'..='9' => c as u32 - '0' as u32,
                        _ => return false,
                    };
                    sum += value * (10 - i as u32);
                }
                sum % 11 == 0
            }
            13 => {
                let mut sum = 0u32;
                for (i, c) in body.chars().enumerate() {
                    let value = match c {
                        '0'..='9' => c as u32 - '0' as u32,
                        _ => return false,
                    };
                    sum += value * if i % 2 == 0 { 1 } else { 3 };
                }
                sum % 10 == 0
            }
            _ => false,
        }
    }
}

pub struct OrcidManager;

impl IdManager for OrcidManager {
    fn scheme(&self) -> &'static str {
        "orcid"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let stripped = stripped
            .strip_prefix("https://orcid.org/")
            .or_else(|| stripped.strip_prefix("http://orcid.org/"))
            .unwrap_or(stripped);
        let compact: String = stripped
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if compact.len() != 16 {
            return None;
        }
        let canonical = format!(
            "{}-{}-{}-{}",
            &compact[..4],
            &compact[4..8],
            &compact[8..12],
            &compact[12..]
        );
        if !ORCID_RE.is_match(&canonical) {
            return None;
        }
        Some(self.with_prefix(canonical, include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        let body = self.strip_scheme_prefix(normalized);
        if !ORCID_RE.is_match(body) {
            return false;
        }
        // ISO 7064 11,2 over the first 15 digits
        let digits: Vec<char> = body.chars().filter(|c| *c != '-').collect();
        let mut total = 0u32;
        for c in &digits[..15] {
            total = (total + (*c as u32 - '0' as u32)) * 2;
        }
        let expected = (12 - total % 11) % 11;
        let check = match digits[15] {
            'X' => 10,
            c => c as u32 - '0' as u32,
        };
        check == expected
    }
}

pub struct ViafManager;

impl IdManager for ViafManager {
    fn scheme(&self) -> &'static str {
        "viaf"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let stripped = self.strip_scheme_prefix(value);
        let stripped = stripped
            .strip_prefix("https://viaf.org/viaf/")
            .or_else(|| stripped.strip_prefix("http://viaf.org/viaf/"))
            .unwrap_or(stripped);
        let canonical = stripped.trim_end_matches('/').trim();
        if canonical.is_empty() || !canonical.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(self.with_prefix(canonical.trim_start_matches('0').to_string(), include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        VIAF_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

pub struct RorManager;

impl IdManager for RorManager {
    fn scheme(&self) -> &'static str {
        "ror"
    }

    fn normalise(&self, value: &str, include_prefix: bool) -> Option<String> {
        let lowered = value.trim().to_lowercase();
        let stripped = self.strip_scheme_prefix(&lowered);
        let stripped = stripped
            .strip_prefix("https://ror.org/")
            .or_else(|| stripped.strip_prefix("http://ror.org/"))
            .or_else(|| stripped.strip_prefix("ror.org/"))
            .unwrap_or(stripped);
        let canonical = stripped.trim();
        if canonical.is_empty() {
            return None;
        }
        Some(self.with_prefix(canonical.to_string(), include_prefix))
    }

    fn is_valid(&self, normalized: &str) -> bool {
        ROR_RE.is_match(self.strip_scheme_prefix(normalized))
    }
}

/// Maps a scheme name to the manager that knows how to normalize and
/// validate identifiers of that scheme. Lookup is case-insensitive and
/// whitespace-trimmed; unrecognized schemes yield `None` and the caller is
/// expected to skip the identifier, not fail.
pub struct Registry {
    managers: FxHashMap<&'static str, Box<dyn IdManager>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut managers: FxHashMap<&'static str, Box<dyn IdManager>> = FxHashMap::default();
        let all: Vec<Box<dyn IdManager>> = vec![
            Box::new(DoiManager),
            Box::new(PmidManager),
            Box::new(PmcidManager),
            Box::new(WikidataManager),
            Box::new(IssnManager),
            Box::new(IsbnManager),
            Box::new(OrcidManager),
            Box::new(ViafManager),
            Box::new(RorManager),
        ];
        for manager in all {
            managers.insert(manager.scheme(), manager);
        }
        Self { managers }
    }

    pub fn get(&self, scheme: &str) -> Option<&dyn IdManager> {
        let key = scheme.trim().to_lowercase();
        self.managers.get(key.as_str()).map(|m| m.as_ref())
    }

    pub fn is_container_scheme(scheme: &str) -> bool {
        let key = scheme.trim().to_lowercase();
        CONTAINER_SCHEMES.contains(&key.as_str())
    }

    pub fn is_citation_scheme(scheme: &str) -> bool {
        let key = scheme.trim().to_lowercase();
        CITATION_SCHEMES.contains(&key.as_str())
    }

    pub fn is_agent_scheme(scheme: &str) -> bool {
        let key = scheme.trim().to_lowercase();
        AGENT_SCHEMES.contains(&key.as_str())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
