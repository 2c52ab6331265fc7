//! Prompt templates and rendering

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Code characters that feed the explain-region retrieval query
pub const MAX_QUERY_CODE_CHARS: usize = 1200;

const EMPTY_EXTRA_CONTEXT: &str = "(none)";

const ASK_TEMPLATE: &str = "You are an Emacs learning assistant for non-technical users.

Rules:
- Start with a plain-language explanation first.
- Avoid jargon unless needed, and define it when used.
- Give practical steps the user can try in Emacs.
- If the question is advanced, still explain what problem the feature solves.
- If the answer is uncertain, say what is missing.

User skill level: {skill_level}

Context:
{context}

Question:
{question}

Helpful answer:";

const EXPLAIN_REGION_TEMPLATE: &str = "You are an Emacs Lisp explainer for non-technical users.

Rules:
- Explain what the code does in plain language first.
- Break down behavior line-by-line or block-by-block when helpful.
- Define any Emacs or Lisp jargon.
- Mention practical impact: what changes for the user.
- If relevant, include safe ways to test the code in Emacs.

User skill level: {skill_level}
Language: {language}
Extra context from user: {extra_context}

Reference docs:
{docs_context}

Code to explain:
{code}

Helpful explanation:";

static SLOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Fill `{name}` slots in one pass; substituted text is never rescanned.
fn render(template: &str, slots: &HashMap<&str, &str>) -> String {
    SLOT_PATTERN
        .replace_all(template, |caps: &Captures| match slots.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub fn render_ask_prompt(question: &str, skill_level: &str, context: &str) -> String {
    let slots = HashMap::from([
        ("skill_level", skill_level),
        ("context", context),
        ("question", question),
    ]);
    render(ASK_TEMPLATE, &slots)
}

/// Render the code explanation prompt; an empty `extra_context` shows as `(none)`.
pub fn render_explain_prompt(
    code: &str,
    language: &str,
    extra_context: &str,
    skill_level: &str,
    docs_context: &str,
) -> String {
    let extra_context = if extra_context.is_empty() {
        EMPTY_EXTRA_CONTEXT
    } else {
        extra_context
    };
    let slots = HashMap::from([
        ("skill_level", skill_level),
        ("language", language),
        ("extra_context", extra_context),
        ("docs_context", docs_context),
        ("code", code),
    ]);
    render(EXPLAIN_REGION_TEMPLATE, &slots)
}

/// Retrieval query for a code region: language, user context, then the
/// first [`MAX_QUERY_CODE_CHARS`] characters of the code.
pub fn retrieval_query(language: &str, context: &str, code: &str) -> String {
    let head: String = code.chars().take(MAX_QUERY_CODE_CHARS).collect();
    format!("{} {} {}", language, context, head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_values_are_not_reexpanded() {
        let prompt = render_ask_prompt("What is {context}?", "{skill_level}", "ctx");
        assert!(prompt.contains("User skill level: {skill_level}\n"));
        assert!(prompt.contains("Question:\nWhat is {context}?\n"));
        assert!(prompt.contains("Context:\nctx\n"));
    }

    #[test]
    fn test_empty_extra_context_renders_none() {
        let prompt = render_explain_prompt("(setq x 1)", "elisp", "", "beginner", "docs");
        assert!(prompt.contains("Extra context from user: (none)\n"));
        assert!(prompt.ends_with("Code to explain:\n(setq x 1)\n\nHelpful explanation:"));
    }

    #[test]
    fn test_retrieval_query_truncates_by_characters() {
        for (len, kept) in [(0, 0), (1199, 1199), (1200, 1200), (1201, 1200)] {
            let code = "λ".repeat(len);
            let query = retrieval_query("elisp", "init", &code);
            let head = query.strip_prefix("elisp init ").unwrap();
            assert_eq!(head.chars().count(), kept, "code length {len}");
        }
    }
}
