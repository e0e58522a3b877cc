//! Keyword heuristic deciding when tool use is mandatory.

/// Forces tool use on the first selection of a turn when the message
/// contains at least `min_matches` of the keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUsePolicy {
    keywords: Vec<String>,
    min_matches: usize,
}

const DEFAULT_KEYWORDS: &[&str] = &[
    "analyze",
    "analyse",
    "pseudocode",
    "assembly",
    "disassembl",
    "decompil",
    "xref",
    "cross-ref",
    "caller",
    "callee",
    "string",
    "variable",
    "search",
    "find",
    "jump",
    "look at",
    "what does",
];

impl ToolUsePolicy {
    pub fn new<I, S>(keywords: I, min_matches: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            min_matches: min_matches.max(1),
        }
    }

    /// A policy that never forces tools.
    pub fn never() -> Self {
        Self::new(std::iter::empty::<&str>(), 1)
    }

    pub fn requires_tools(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        let hits = self
            .keywords
            .iter()
            .filter(|k| message.contains(k.as_str()))
            .count();
        hits >= self.min_matches
    }
}

impl Default for ToolUsePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_analysis_requests() {
        let policy = ToolUsePolicy::default();
        assert!(policy.requires_tools("Can you Analyze this function?"));
        assert!(policy.requires_tools("what does it return"));
        assert!(!policy.requires_tools("thanks, that helps"));
    }

    #[test]
    fn min_matches_is_respected() {
        let policy = ToolUsePolicy::new(["xref", "string"], 2);
        assert!(!policy.requires_tools("show xrefs"));
        assert!(policy.requires_tools("show xrefs and strings"));
    }

    #[test]
    fn never_policy() {
        assert!(!ToolUsePolicy::never().requires_tools("analyze everything"));
    }
}
