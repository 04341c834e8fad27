//! Glob matching for state paths.
//!
//! Used by pattern subscriptions such as `elements.*.status`. Semantics follow
//! shell `fnmatch`:
//! - `*`: zero or more characters, dots included
//! - `?`: exactly one character
//! - `[abc]` `[a-z]` `[!abc]` `[^abc]`: bracket classes
//!
//! Matching is **case-sensitive**, operates on Unicode scalar values and
//! always covers the whole path.

/// A compiled glob pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobPattern {
    source: String,
    tokens: Vec<Token>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyRun,
    Class { negate: bool, items: Vec<ClassItem> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ClassItem {
    Single(char),
    Range(char, char),
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyOne => true,
            Token::AnyRun => true,
            Token::Class { negate, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Single(s) => *s == c,
                    ClassItem::Range(lo, hi) => *lo <= c && c <= *hi,
                });
                hit != *negate
            }
        }
    }
}

impl GlobPattern {
    /// Compiles a pattern. An unclosed `[` is treated as a literal bracket.
    pub fn new(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Collapse runs of stars.
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyOne);
                    i += 1;
                }
                '[' => match parse_bracket_class(&chars, i) {
                    Some((len, token)) => {
                        tokens.push(token);
                        i += len;
                    }
                    None => {
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }
        Self {
            source: pattern.to_string(),
            tokens,
        }
    }

    /// Returns the pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern contains no wildcard or class.
    pub fn is_literal(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }

    /// Matches the whole of `value` against the pattern.
    ///
    /// Greedy two-pointer matching with single-star backtracking, linear in
    /// practice for path-sized inputs.
    pub fn matches(&self, value: &str) -> bool {
        let v: Vec<char> = value.chars().collect();
        let p = &self.tokens;
        let (mut vi, mut pi) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while vi < v.len() {
            if pi < p.len() && p[pi] == Token::AnyRun {
                star = Some((pi, vi));
                pi += 1;
            } else if pi < p.len() && p[pi].matches(v[vi]) {
                vi += 1;
                pi += 1;
            } else if let Some((star_pi, star_vi)) = star {
                // Let the last star absorb one more character.
                pi = star_pi + 1;
                vi = star_vi + 1;
                star = Some((star_pi, star_vi + 1));
            } else {
                return false;
            }
        }
        while pi < p.len() && p[pi] == Token::AnyRun {
            pi += 1;
        }
        pi == p.len()
    }
}

/// Convenience wrapper compiling `pattern` for a single match.
///
/// ```
/// use tessera_core::pattern_match::glob;
/// assert!(glob("elements.5.status", "elements.*.status"));
/// assert!(!glob("document.title", "elements.*.status"));
/// ```
pub fn glob(value: &str, pattern: &str) -> bool {
    GlobPattern::new(pattern).matches(value)
}

/// Parse a bracket character class: `[abc]`, `[a-z]`, `[!abc]`, `[^abc]`.
///
/// Returns `(token_length, token)`; `None` when the bracket is unclosed.
fn parse_bracket_class(pat: &[char], pi: usize) -> Option<(usize, Token)> {
    let negate = pi + 1 < pat.len() && (pat[pi + 1] == '!' || pat[pi + 1] == '^');
    let start = if negate { pi + 2 } else { pi + 1 };
    // A `]` directly after the opening bracket is a literal member.
    let mut end = if start < pat.len() && pat[start] == ']' {
        start + 1
    } else {
        start
    };
    while end < pat.len() && pat[end] != ']' {
        end += 1;
    }
    if end >= pat.len() {
        return None;
    }
    let class_chars = &pat[start..end];
    let mut items = Vec::new();
    let mut i = 0;
    while i < class_chars.len() {
        if i + 2 < class_chars.len() && class_chars[i + 1] == '-' {
            items.push(ClassItem::Range(class_chars[i], class_chars[i + 2]));
            i += 3;
        } else {
            items.push(ClassItem::Single(class_chars[i]));
            i += 1;
        }
    }
    Some((end - pi + 1, Token::Class { negate, items }))
}
