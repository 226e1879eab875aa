//! Fixed extraction instruction template and its builder.

use docfields_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Template identifier inside the Handlebars registry.
const TEMPLATE_NAME: &str = "extraction";

/// The fixed instruction template sent to the completion service once per
/// chunk. The running field spec from the previous chunk is injected so the
/// service keeps field names consistent across the whole document.
const EXTRACTION_TEMPLATE: &str = r#"You are an analyst responsible for reviewing a `{{doc_type}}` document. Your task is to extract and accurately map relevant details based on the provided guidelines while ensuring consistency with previously extracted fields.

**Context:**
{{context}}

---

**Fields to Extract:**
Identify and map the extraction fields, considering previously extracted details to ensure consistency.
{{extraction_fields}}

---

**Guidelines for Extraction:**
{{guidelines}}

---

**Output Requirements:**
Return the extracted information in JSON format as key-value pairs. Each key must correspond to a specific field, and the value should be directly derived from the context. If any fields are missing or cannot be mapped, return the value as "NA". Ensure the output is concise and adheres to the specified format, with no additional comments or extraneous text.

---

**Extraction Process:**
1. **Identify Relevant Fields:** Analyze the provided context and identify the fields to be extracted.
2. **Leverage Previous Mappings:** Map any relevant or similar extraction fields from prior iterations to maintain consistency.
3. **Context-Only Extraction:** Extract values solely based on the provided context without making assumptions or using external information.
4. **Use Guidelines for Accuracy:** Apply the extraction guidelines to map fields with precision.
5. **Output in JSON:** Ensure the output adheres to the specified JSON format with no additional text, comments, or formatting.
6. **Missing Fields:** Return "NA" as the value for any fields not found in the context.
"#;

/// Per-call template variables.
#[derive(Debug, Clone, Serialize)]
pub struct PromptVars {
    /// Document type (e.g., "invoice", "policy schedule")
    pub doc_type: String,

    /// The current document chunk
    pub context: String,

    /// Running field spec as JSON, carried from the previous chunk
    pub extraction_fields: String,

    /// Free-text extraction guidelines; may be empty
    pub guidelines: String,
}

/// Renders the fixed extraction template.
///
/// The template is registered once at construction. Strict mode makes any
/// placeholder without a matching variable a render error, so a broken
/// template surfaces as a configuration error instead of a silently
/// incomplete prompt.
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    /// Compile the extraction template. Fatal at startup on failure.
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        registry
            .register_template_string(TEMPLATE_NAME, EXTRACTION_TEMPLATE)
            .map_err(|e| AppError::Config(format!("Failed to register template: {}", e)))?;

        Ok(Self { registry })
    }

    /// Render the extraction prompt for one chunk.
    pub fn render(&self, vars: &PromptVars) -> AppResult<String> {
        tracing::debug!(
            "Rendering extraction prompt (doc_type: {}, chunk: {} chars)",
            vars.doc_type,
            vars.context.len()
        );
        self.render_data(vars)
    }

    fn render_data<T: Serialize>(&self, data: &T) -> AppResult<String> {
        self.registry
            .render(TEMPLATE_NAME, data)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
    }
}
