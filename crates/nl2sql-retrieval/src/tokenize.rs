//! Question and description tokenization

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"[^a-z0-9_]+").unwrap_or_else(|_| unreachable!("static regex")))
}

/// Lower-case word tokens, split on anything outside `[a-z0-9_]`
///
/// No stemming: `order` and `orders` are different tokens.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let folded = text.to_lowercase();
    separator()
        .split(&folded)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_folds() {
        let tokens: Vec<_> = tokenize("Orders by STATUS, in the last-7 days!").into_iter().collect();
        assert_eq!(tokens, vec!["7", "by", "days", "in", "last", "orders", "status", "the"]);
    }

    #[test]
    fn underscores_stay_inside_tokens() {
        assert!(tokenize("group by customer_id").contains("customer_id"));
    }

    #[test]
    fn blank_text_has_no_tokens() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("?!").is_empty());
    }

    #[test]
    fn non_ascii_letters_separate_tokens() {
        let tokens: Vec<_> = tokenize("café orders").into_iter().collect();
        assert_eq!(tokens, vec!["caf", "orders"]);
    }
}
