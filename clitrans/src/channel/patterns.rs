//! Prompt and device error patterns.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Characters that end a CLI prompt.
const PROMPT_MARKERS: &[char] = &['#', '>', '$', '%'];

/// Matches any line ending in a prompt marker. Used until the real prompt
/// has been resolved.
pub static GENERIC_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[^\r\n]*[#>$%]\s*$").expect("generic prompt pattern"));

/// Build a matcher for a resolved prompt line.
///
/// The matcher accepts the same hostname in any mode, so `R1#` also matches
/// `R1(config)#` and `R1(config-if)#`, and `R1>` matches `R1#`. The line
/// must end with the prompt, so an echoed `R1#show version` does not match.
pub fn prompt_pattern_for(prompt: &str) -> Result<Regex, regex::Error> {
    let without_marker = prompt.trim().trim_end_matches(PROMPT_MARKERS).trim_end();
    let base = strip_mode(without_marker);

    if base.is_empty() {
        return Ok(Regex::clone(&GENERIC_PROMPT));
    }

    Regex::new(&format!(
        r"(?m)^{}(?:\([^)\r\n]*\))?\s?[#>$%]\s*$",
        regex::escape(base)
    ))
}

/// `R1(config-if)` -> `R1`
fn strip_mode(prompt: &str) -> &str {
    if prompt.ends_with(')') {
        if let Some(open) = prompt.rfind('(') {
            return &prompt[..open];
        }
    }
    prompt
}

/// A device error pattern that matched some output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMatch {
    /// The pattern source.
    pub pattern: String,

    /// The matched text.
    pub text: String,
}

/// Regexes recognizing device error output ("% Invalid input", "syntax
/// error", ...). Checked in insertion order; first hit wins.
#[derive(Debug, Clone, Default)]
pub struct ErrorPatternSet {
    patterns: Vec<regex::Regex>,
}

impl ErrorPatternSet {
    /// An empty set; nothing is ever treated as an error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a set of patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| regex::Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Add a compiled pattern.
    pub fn with(mut self, pattern: regex::Regex) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Append all patterns of `other`.
    pub fn extend(&mut self, other: &ErrorPatternSet) {
        self.patterns.extend(other.patterns.iter().cloned());
    }

    /// First pattern matching `output`.
    pub fn find(&self, output: &str) -> Option<ErrorMatch> {
        self.patterns.iter().find_map(|pattern| {
            pattern.find(output).map(|m| ErrorMatch {
                pattern: pattern.as_str().to_string(),
                text: m.as_str().to_string(),
            })
        })
    }

    /// Number of patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_pattern_accepts_modes() {
        let pattern = prompt_pattern_for("R1#").unwrap();
        assert!(pattern.is_match(b"R1#"));
        assert!(pattern.is_match(b"output\r\nR1(config)#"));
        assert!(pattern.is_match(b"R1(config-if)# "));
        assert!(pattern.is_match(b"R1>"));
        assert!(!pattern.is_match(b"R1#show version\r\n"));
        assert!(!pattern.is_match(b"R10#"));
    }

    #[test]
    fn test_prompt_pattern_escapes_hostname() {
        let pattern = prompt_pattern_for("RP/0/RSP0/CPU0:pe1.lab#").unwrap();
        assert!(pattern.is_match(b"RP/0/RSP0/CPU0:pe1.lab(config)#"));
        assert!(!pattern.is_match(b"RP/0/RSP0/CPU0:pe1xlab#"));

        let pattern = prompt_pattern_for("admin@vsrx>").unwrap();
        assert!(pattern.is_match(b"[edit]\r\nadmin@vsrx# "));
    }

    #[test]
    fn test_error_patterns_first_match() {
        let set = ErrorPatternSet::from_patterns([r"(?m)^\s+\^.*", r"(?i)% invalid input"]).unwrap();

        let hit = set
            .find("mtu 99999\r\n     ^\r\n% Invalid input detected at '^' marker.")
            .unwrap();
        assert_eq!(hit.pattern, r"(?m)^\s+\^.*");

        assert!(set.find("R1(config-if)#").is_none());
        assert!(ErrorPatternSet::new().find("% Invalid input").is_none());
    }
}
