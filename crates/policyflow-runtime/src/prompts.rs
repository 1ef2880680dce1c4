//! System prompts for criterion evaluation.
//!
//! Prompts are split so the stable part comes first:
//! 1. Base instructions (shared by every evaluation)
//! 2. Criterion-specific section
//!
//! The input text always travels in the user message, never in the system
//! prompt, so one criterion's system prompt is identical across inputs.

use policyflow_core::{Criterion, PolicyContext};

/// Instructions shared by every criterion and sub-criterion evaluation.
pub const BASE_SYSTEM_PROMPT: &str = r#"
You are a policy evaluator. You decide whether a text satisfies ONE criterion
of a policy.

## Rules
1. Evaluate only the criterion you are given - do not invent requirements
2. Base your verdict on what the text actually says
3. If the text is ambiguous, lower your confidence instead of guessing

## Output Format (JSON)
{
  "met": true | false,
  "reasoning": "brief explanation citing the text",
  "confidence": 0.0-1.0
}

## Confidence Guidelines
- 0.8-1.0: Clear evidence, unambiguous
- 0.5-0.8: Some interpretation required
- < 0.5: Weak or missing evidence; the verdict will be flagged for review

Respond with the JSON object only.
"#;

/// User message carrying the text under evaluation.
pub fn evaluation_request(input_text: &str) -> String {
    format!("Evaluate this text:\n\n{}", input_text)
}

/// System prompt for a top-level criterion.
pub fn criterion_prompt(criterion: &Criterion, policy: &PolicyContext) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);
    push_policy(&mut prompt, policy);

    prompt.push_str(&format!(
        "\n## Criterion: {} ({})\n{}\n",
        criterion.name, criterion.id, criterion.description
    ));

    if criterion.has_sub_criteria() {
        prompt.push_str(&format!(
            "\nThis criterion is met when {} of the following hold:\n",
            criterion.effective_sub_logic().as_str().to_uppercase()
        ));
        for sub in &criterion.sub_criteria {
            prompt.push_str(&format!("- {}: {}\n", sub.name, sub.description));
        }
    }

    prompt
}

/// System prompt for one sub-criterion of `parent`.
pub fn sub_criterion_prompt(
    parent: &Criterion,
    sub_criterion: &Criterion,
    policy: &PolicyContext,
) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);
    push_policy(&mut prompt, policy);

    prompt.push_str(&format!(
        "\n## Parent criterion: {} ({})\n{}\n",
        parent.name, parent.id, parent.description
    ));
    prompt.push_str(&format!(
        "\n## Evaluate only this sub-criterion: {} ({})\n{}\n",
        sub_criterion.name, sub_criterion.id, sub_criterion.description
    ));

    prompt
}

fn push_policy(prompt: &mut String, policy: &PolicyContext) {
    if policy.title.is_empty() && policy.description.is_empty() {
        return;
    }
    prompt.push_str(&format!("\n## Policy: {}\n{}\n", policy.title, policy.description));
}
