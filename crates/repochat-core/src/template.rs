//! Question-answering prompt with `{context_str}` and `{query_str}` slots.

pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";
pub const QUERY_PLACEHOLDER: &str = "{query_str}";

pub const DEFAULT_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
You are an experienced software engineer who knows this repository inside out \
and answers questions about its code and documentation. Given the context \
information above I want you to think step by step to answer the query in a \
crisp manner, in case you don't know the answer say 'I don't know!'.\n\
Query: {query_str}\n\
Answer: ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("prompt template is missing the {0} placeholder")]
pub struct TemplateError(pub &'static str);

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_owned(),
        }
    }
}

impl PromptTemplate {
    /// # Errors
    ///
    /// Returns `TemplateError` if either placeholder is absent.
    pub fn new(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        validate(&template)?;
        Ok(Self { template })
    }

    /// Substitute both placeholders in a single pass, so braces inside the
    /// retrieved code or the question are never re-expanded.
    #[must_use]
    pub fn render(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + query.len());
        let mut rest = self.template.as_str();
        loop {
            let next_ctx = rest.find(CONTEXT_PLACEHOLDER);
            let next_query = rest.find(QUERY_PLACEHOLDER);
            let (pos, placeholder, value) = match (next_ctx, next_query) {
                (Some(c), Some(q)) if c < q => (c, CONTEXT_PLACEHOLDER, context),
                (Some(c), None) => (c, CONTEXT_PLACEHOLDER, context),
                (_, Some(q)) => (q, QUERY_PLACEHOLDER, query),
                (None, None) => break,
            };
            out.push_str(&rest[..pos]);
            out.push_str(value);
            rest = &rest[pos + placeholder.len()..];
        }
        out.push_str(rest);
        out
    }
}

/// # Errors
///
/// Returns `TemplateError` naming the first missing placeholder.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    for placeholder in [CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(TemplateError(placeholder));
        }
    }
    Ok(())
}
