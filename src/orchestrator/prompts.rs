//! Prompt templates for change generation
//!
//! Every request has the same shape: conventions, feature identity, the
//! feature spec, output instructions for the wire format, and an optional
//! section carrying the previous attempt's failure verbatim.

use crate::models::{ChangeFormat, FeatureDescriptor};

/// Fixed system instruction for chat-style backends
pub const SYSTEM_PROMPT: &str = "You are a code generator working inside a git repository. \
Reply with the requested change only, with no commentary before or after it.";

/// Everything a generator needs to propose one change
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub feature_id: String,
    pub title: Option<String>,
    pub spec: String,
    pub conventions: String,
    pub format: ChangeFormat,
    /// Failure artifact from the previous attempt, if this is a retry
    pub prior_failure: Option<String>,
    /// 1-based attempt number
    pub attempt: u32,
}

impl GenerationRequest {
    pub fn new(feature: &FeatureDescriptor, conventions: &str, format: ChangeFormat) -> Self {
        Self {
            feature_id: feature.id.clone(),
            title: feature.title.clone(),
            spec: feature.spec.clone(),
            conventions: conventions.to_string(),
            format,
            prior_failure: None,
            attempt: 1,
        }
    }

    /// Same request, one attempt later, carrying the failure artifact
    pub fn retry(&self, failure: impl Into<String>) -> Self {
        Self {
            prior_failure: Some(failure.into()),
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    pub fn prompt(&self) -> String {
        implement_prompt(self)
    }
}

/// Output instructions for a wire format
pub fn format_instructions(format: ChangeFormat) -> &'static str {
    match format {
        ChangeFormat::Diff => {
            r#"Reply with a single unified diff in `git diff` format that applies cleanly
with `git apply` at the repository root.
- The reply MUST start with `diff --git`.
- Do not wrap the diff in markdown fences.
- Reply with nothing at all if the feature is already implemented."#
        }
        ChangeFormat::FileMap => {
            r#"Reply with a single JSON object of the form
{"files": {"<relative/path>": "<complete file content>"}}
- Paths are relative to the repository root and must not contain `..`.
- Each value replaces the whole file.
- Do not wrap the JSON in markdown fences.
- Reply with {"files": {}} if the feature is already implemented."#
        }
    }
}

/// Generate the implementation request for one feature
pub fn implement_prompt(request: &GenerationRequest) -> String {
    let heading = match &request.title {
        Some(title) => format!("{} {}", request.feature_id, title),
        None => request.feature_id.clone(),
    };

    let mut prompt = format!(
        r#"## Conventions
{conventions}

## Feature
{heading}

## Feature Spec
{spec}

## Output Format
{instructions}
"#,
        conventions = request.conventions.trim(),
        heading = heading,
        spec = request.spec.trim(),
        instructions = format_instructions(request.format),
    );

    if let Some(failure) = &request.prior_failure {
        prompt.push_str(&format!(
            r#"
## PREVIOUS ATTEMPT FAILED
Attempt {previous} was rejected. Produce a corrected change.

```
{failure}
```
"#,
            previous = request.attempt.saturating_sub(1),
            failure = failure,
        ));
    }

    prompt
}
