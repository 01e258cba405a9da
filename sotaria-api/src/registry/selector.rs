//! Label and field selectors
//!
//! Label selectors accept the usual equality and set-based forms:
//! `key`, `!key`, `key=value`, `key==value`, `key!=value`,
//! `key in (a,b)` and `key notin (a,b)`, joined by commas.
//! Field selectors only support `metadata.name`.

use super::error::{RegistryError, RegistryResult};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

fn label_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").expect("valid label regex")
    })
}

fn dns_subdomain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .expect("valid subdomain regex")
    })
}

/// Validate a label key: optional DNS subdomain prefix, then a name
pub fn validate_label_key(key: &str) -> RegistryResult<()> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty()
            || prefix.len() > MAX_PREFIX_LENGTH
            || !dns_subdomain_regex().is_match(prefix)
        {
            return Err(RegistryError::InvalidSelector(format!(
                "invalid label key \"{}\": prefix must be a DNS subdomain",
                key
            )));
        }
    }

    if name.is_empty() || name.len() > MAX_NAME_LENGTH || !label_name_regex().is_match(name) {
        return Err(RegistryError::InvalidSelector(format!(
            "invalid label key \"{}\": name must be 63 characters or less, start and end with an alphanumeric character",
            key
        )));
    }

    Ok(())
}

/// Validate a label value (may be empty)
pub fn validate_label_value(value: &str) -> RegistryResult<()> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LENGTH || !label_name_regex().is_match(value) {
        return Err(RegistryError::InvalidSelector(format!(
            "invalid label value \"{}\"",
            value
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single label requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    fn new(key: &str, operator: Operator, values: BTreeSet<String>) -> RegistryResult<Self> {
        validate_label_key(key)?;
        for value in &values {
            validate_label_value(value)?;
        }
        match operator {
            Operator::Equals | Operator::NotEquals if values.len() != 1 => {
                return Err(RegistryError::InvalidSelector(format!(
                    "exactly one value required for key \"{}\"",
                    key
                )));
            }
            Operator::In | Operator::NotIn if values.is_empty() => {
                return Err(RegistryError::InvalidSelector(format!(
                    "at least one value required for key \"{}\"",
                    key
                )));
            }
            _ => {}
        }
        Ok(Self {
            key: key.to_string(),
            operator,
            values,
        })
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => {
                value.map_or(false, |v| self.values.contains(v))
            }
            Operator::NotEquals | Operator::NotIn => {
                value.map_or(true, |v| !self.values.contains(v))
            }
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::NotEquals => write!(f, "{}!={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Conjunction of label requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector that matches every object
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> RegistryResult<Self> {
        let mut requirements = Vec::new();
        for term in split_terms(input)? {
            requirements.push(parse_requirement(&term)?);
        }
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        write!(f, "{}", terms.join(","))
    }
}

/// Split on commas that are not inside a parenthesised value set
fn split_terms(input: &str) -> RegistryResult<Vec<String>> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                if depth == 0 {
                    return Err(RegistryError::InvalidSelector(format!(
                        "unbalanced parenthesis in \"{}\"",
                        input
                    )));
                }
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                terms.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(RegistryError::InvalidSelector(format!(
            "unbalanced parenthesis in \"{}\"",
            input
        )));
    }
    terms.push(current);

    let trimmed: Vec<String> = terms.into_iter().map(|t| t.trim().to_string()).collect();
    if trimmed.len() == 1 && trimmed[0].is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.iter().any(String::is_empty) {
        return Err(RegistryError::InvalidSelector(format!(
            "empty requirement in \"{}\"",
            input
        )));
    }
    Ok(trimmed)
}

fn parse_requirement(term: &str) -> RegistryResult<Requirement> {
    if let Some(key) = term.strip_prefix('!') {
        return Requirement::new(key.trim(), Operator::DoesNotExist, BTreeSet::new());
    }

    if let Some((key, value)) = term.split_once("!=") {
        return Requirement::new(key.trim(), Operator::NotEquals, single(value));
    }
    if let Some((key, value)) = term.split_once("==") {
        return Requirement::new(key.trim(), Operator::Equals, single(value));
    }
    if let Some((key, value)) = term.split_once('=') {
        return Requirement::new(key.trim(), Operator::Equals, single(value));
    }

    if let Some(open) = term.find('(') {
        let head = term[..open].trim();
        let set = term[open..].trim();
        let inner = set
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| {
                RegistryError::InvalidSelector(format!("malformed value set in \"{}\"", term))
            })?;
        let values: BTreeSet<String> = inner
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        let mut words = head.split_whitespace();
        let (key, op) = match (words.next(), words.next(), words.next()) {
            (Some(key), Some("in"), None) => (key, Operator::In),
            (Some(key), Some("notin"), None) => (key, Operator::NotIn),
            _ => {
                return Err(RegistryError::InvalidSelector(format!(
                    "expected \"in\" or \"notin\" in \"{}\"",
                    term
                )))
            }
        };
        return Requirement::new(key, op, values);
    }

    if term.contains(char::is_whitespace) {
        return Err(RegistryError::InvalidSelector(format!(
            "unexpected whitespace in \"{}\"",
            term
        )));
    }
    Requirement::new(term, Operator::Exists, BTreeSet::new())
}

fn single(value: &str) -> BTreeSet<String> {
    std::iter::once(value.trim().to_string()).collect()
}

/// Field selector over selectable project fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    name_equals: Vec<String>,
    name_not_equals: Vec<String>,
}

impl FieldSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> RegistryResult<Self> {
        let mut selector = Self::default();
        for term in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (field, value, negate) = if let Some((f, v)) = term.split_once("!=") {
                (f, v, true)
            } else if let Some((f, v)) = term.split_once("==") {
                (f, v, false)
            } else if let Some((f, v)) = term.split_once('=') {
                (f, v, false)
            } else {
                return Err(RegistryError::InvalidSelector(format!(
                    "invalid field selector term \"{}\"",
                    term
                )));
            };

            match field.trim() {
                "metadata.name" => {
                    let value = value.trim().to_string();
                    if negate {
                        selector.name_not_equals.push(value);
                    } else {
                        selector.name_equals.push(value);
                    }
                }
                other => {
                    return Err(RegistryError::InvalidSelector(format!(
                        "field label not supported: {}",
                        other
                    )))
                }
            }
        }
        Ok(selector)
    }

    pub fn is_empty(&self) -> bool {
        self.name_equals.is_empty() && self.name_not_equals.is_empty()
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name_equals.iter().all(|n| n == name)
            && self.name_not_equals.iter().all(|n| n != name)
    }
}

/// Parse optional selector strings from list options
pub fn parse_selectors(
    label_selector: Option<&str>,
    field_selector: Option<&str>,
) -> RegistryResult<(LabelSelector, FieldSelector)> {
    let labels = match label_selector {
        Some(s) => LabelSelector::parse(s)?,
        None => LabelSelector::everything(),
    };
    let fields = match field_selector {
        Some(s) => FieldSelector::parse(s)?,
        None => FieldSelector::everything(),
    };
    Ok((labels, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality_selector() {
        let sel = LabelSelector::parse("security.sotaria.io/type=project").unwrap();
        assert!(sel.matches(&labels(&[("security.sotaria.io/type", "project")])));
        assert!(!sel.matches(&labels(&[("security.sotaria.io/type", "system")])));
        assert!(!sel.matches(&labels(&[])));

        let double = LabelSelector::parse("env==prod").unwrap();
        assert!(double.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_not_equals_matches_missing_key() {
        let sel = LabelSelector::parse("env!=prod").unwrap();
        assert!(sel.matches(&labels(&[])));
        assert!(sel.matches(&labels(&[("env", "dev")])));
        assert!(!sel.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_set_based_selector() {
        let sel = LabelSelector::parse("env in (prod, staging),tier notin (cache)").unwrap();
        assert!(sel.matches(&labels(&[("env", "prod")])));
        assert!(sel.matches(&labels(&[("env", "staging"), ("tier", "web")])));
        assert!(!sel.matches(&labels(&[("env", "prod"), ("tier", "cache")])));
        assert!(!sel.matches(&labels(&[("tier", "web")])));
    }

    #[test]
    fn test_existence_selectors() {
        let sel = LabelSelector::parse("owner,!frozen").unwrap();
        assert!(sel.matches(&labels(&[("owner", "alice")])));
        assert!(!sel.matches(&labels(&[("owner", "alice"), ("frozen", "")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let sel = LabelSelector::parse("").unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches(&labels(&[("anything", "goes")])));
        assert!(LabelSelector::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in [
            "env=prod,",
            "=prod",
            "env in prod",
            "env in (prod",
            "env)",
            "env foo (a)",
            "bad key=1",
            "env=has space",
            "Bad_Prefix/key=1",
            "env in ()",
        ] {
            let err = LabelSelector::parse(bad).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidSelector(_)),
                "expected selector error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_selector_display_round_trips() {
        let sel = LabelSelector::parse("a=1,b!=2,!c,d in (x,y)").unwrap();
        assert_eq!(sel.to_string(), "a=1,b!=2,!c,d in (x,y)");
        assert_eq!(LabelSelector::parse(&sel.to_string()).unwrap(), sel);
    }

    #[test]
    fn test_field_selector() {
        let sel = FieldSelector::parse("metadata.name=proj-a").unwrap();
        assert!(sel.matches_name("proj-a"));
        assert!(!sel.matches_name("proj-b"));

        let neg = FieldSelector::parse("metadata.name!=proj-a").unwrap();
        assert!(!neg.matches_name("proj-a"));
        assert!(neg.matches_name("proj-b"));

        assert!(FieldSelector::parse("").unwrap().is_empty());
        assert!(matches!(
            FieldSelector::parse("status.phase=Active"),
            Err(RegistryError::InvalidSelector(_))
        ));
        assert!(FieldSelector::parse("metadata.name").is_err());
    }
}
