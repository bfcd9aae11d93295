//! Instruction prompts sent ahead of the user's query.
//!
//! Callers can override the default via
//! [`crate::config::ExtractorConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default instruction prompt for invoice question answering.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert in understanding invoices. We will upload an image as invoice
and you will have to answer any questions based on the uploaded invoice image.

- The invoice may be written in any language; answer in the language of the question.
- If the document has several pages, treat them as one invoice in page order.
- Quote amounts, dates and identifiers exactly as printed, including currency.
- If the answer is not present on the invoice, say so instead of guessing."#;

/// Resolve the prompt to use: the override when set, else the default.
pub fn system_prompt(override_prompt: Option<&str>) -> &str {
    override_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_mentions_invoices() {
        assert!(system_prompt(None).contains("invoice"));
    }

    #[test]
    fn override_wins() {
        assert_eq!(system_prompt(Some("custom")), "custom");
    }
}
