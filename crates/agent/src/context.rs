//! Prompt and seed assembly.
//!
//! Everything here is plain string building over its inputs. The loop calls
//! it once per run, and the final-summary prompt is derived from the same
//! base prompt, so every request in a run sees the same policy text.

use adpilot_core::decision::{DecisionStatus, PersistedDecision};
use adpilot_core::transcript::{Transcript, Turn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

const BASE_POLICY: &str = "You are a senior performance marketer reviewing an advertising \
account. You have been given an analytical summary of recent performance. Your job is to \
turn it into a short list of concrete, high-value actions.";

/// The analytical summary a run starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedContext {
    /// Cross-platform summary; also the fallback output of an interrupted run
    pub summary: String,

    /// Per-platform sub-summaries keyed by connector name
    #[serde(default)]
    pub platform_summaries: BTreeMap<String, String>,
}

impl SeedContext {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            platform_summaries: BTreeMap::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>, summary: impl Into<String>) -> Self {
        self.platform_summaries.insert(platform.into(), summary.into());
        self
    }
}

/// Inputs to the system prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub max_recommendations: usize,
    pub recommendations_enabled: bool,
    pub exploration_enabled: bool,
    pub business_context: Option<&'a str>,
    pub prior_decisions: &'a [PersistedDecision],
}

/// Build the transcript a run starts from: one caller turn with the summary,
/// each platform section, and the task instruction.
pub fn build_seed_transcript(run_id: &str, seed: &SeedContext) -> Transcript {
    let mut text = String::from("## Analysis summary\n");
    text.push_str(seed.summary.trim());
    text.push('\n');

    for (platform, summary) in &seed.platform_summaries {
        let _ = write!(text, "\n## Platform: {platform}\n{}\n", summary.trim());
    }

    text.push_str(
        "\nInvestigate anything in this summary that needs evidence, then record your \
         recommendations with the recommendation tools.",
    );

    let mut transcript = Transcript::new(run_id);
    transcript.push(Turn::caller_text(text));
    transcript
}

/// Build the system prompt for a run.
pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut prompt = String::from(BASE_POLICY);

    prompt.push_str("\n\n## Tool use\n");
    if inputs.exploration_enabled {
        prompt.push_str("- Use the exploration tools to verify a hypothesis before recommending on it.\n");
    }
    if inputs.recommendations_enabled {
        let _ = writeln!(
            prompt,
            "- Each recommendation tool call records exactly one action. You may record at most {} recommendations.",
            inputs.max_recommendations
        );
        prompt.push_str("- Justify every recommendation with the numbers you found.\n");
    } else {
        prompt.push_str("- Recommendation tools are disabled for this run. Report your findings as text.\n");
    }
    prompt.push_str("- When you have nothing more to investigate or record, reply with a final summary and no tool calls.\n");

    if let Some(context) = inputs.business_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\n## Business context\n");
        prompt.push_str(context);
        prompt.push('\n');
    }

    if !inputs.prior_decisions.is_empty() {
        prompt.push_str("\n## Prior decisions\n");
        prompt.push_str(&format_decision_digest(inputs.prior_decisions));
    }

    prompt
}

/// One line per decision; rejected decisions are flagged so the model does
/// not suggest them again.
pub fn format_decision_digest(decisions: &[PersistedDecision]) -> String {
    let mut digest = String::new();
    for decision in decisions {
        let rec = &decision.recommendation;
        let _ = write!(
            digest,
            "- [{}] {} on {} {} '{}' ({}): {}",
            decision.status.as_str(),
            rec.tool_name,
            rec.platform,
            rec.entity_type,
            rec.entity_name,
            rec.entity_id,
            rec.justification.trim()
        );
        if decision.status == DecisionStatus::Rejected {
            digest.push_str(" (rejected, do not repeat)");
        }
        digest.push('\n');
    }
    digest
}

/// The system prompt for the final call once the cap is reached.
pub fn final_summary_prompt(base: &str, max_recommendations: usize) -> String {
    format!(
        "{base}\n## Recommendation limit reached\nYou have recorded the maximum of \
         {max_recommendations} recommendations. Do not call any tools. Write the final summary \
         as plain text: what you found, what you recommended and why.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_core::decision::{Confidence, Recommendation};
    use adpilot_core::scope::OrgScope;
    use adpilot_core::transcript::Role;
    use chrono::Utc;

    fn decision(status: DecisionStatus, name: &str) -> PersistedDecision {
        let now = Utc::now();
        PersistedDecision {
            id: format!("d-{name}"),
            org: OrgScope::new("org_1"),
            run_id: "run_0".into(),
            recommendation: Recommendation {
                tool_name: "pause_entity".into(),
                platform: "meta".into(),
                entity_type: "ad_set".into(),
                entity_id: "123".into(),
                entity_name: name.into(),
                parameters: serde_json::Map::new(),
                justification: "CPA 3x target ".into(),
                predicted_impact: None,
                confidence: Confidence::Medium,
                created_at: now,
            },
            status,
            created_at: now,
            expires_at: now,
        }
    }

    fn inputs<'a>(prior: &'a [PersistedDecision], context: Option<&'a str>) -> PromptInputs<'a> {
        PromptInputs {
            max_recommendations: 4,
            recommendations_enabled: true,
            exploration_enabled: true,
            business_context: context,
            prior_decisions: prior,
        }
    }

    #[test]
    fn seed_transcript_orders_platform_sections() {
        let seed = SeedContext::new("Spend up 20%, ROAS flat")
            .with_platform("tiktok", "Creative fatigue")
            .with_platform("meta", "CPM rising");
        let transcript = build_seed_transcript("run_1", &seed);

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.run_id, "run_1");
        let turn = &transcript.turns[0];
        assert_eq!(turn.role, Role::Caller);
        let text = turn.text();
        assert!(text.contains("Spend up 20%, ROAS flat"));
        let meta = text.find("## Platform: meta").unwrap();
        let tiktok = text.find("## Platform: tiktok").unwrap();
        assert!(meta < tiktok);
    }

    #[test]
    fn system_prompt_mentions_cap_and_optional_sections() {
        let bare = build_system_prompt(&inputs(&[], None));
        assert!(bare.contains("at most 4 recommendations"));
        assert!(!bare.contains("## Business context"));
        assert!(!bare.contains("## Prior decisions"));

        let prior = vec![decision(DecisionStatus::Approved, "Retargeting")];
        let full = build_system_prompt(&inputs(&prior, Some("Q4 is peak season")));
        assert!(full.contains("## Business context\nQ4 is peak season"));
        assert!(full.contains("## Prior decisions"));
        assert!(full.contains("'Retargeting'"));
    }

    #[test]
    fn blank_business_context_is_omitted() {
        let prompt = build_system_prompt(&inputs(&[], Some("   ")));
        assert!(!prompt.contains("## Business context"));
    }

    #[test]
    fn exploration_only_prompt() {
        let prompt = build_system_prompt(&PromptInputs {
            recommendations_enabled: false,
            ..inputs(&[], None)
        });
        assert!(prompt.contains("Recommendation tools are disabled"));
        assert!(!prompt.contains("at most"));
    }

    #[test]
    fn digest_flags_rejected_decisions() {
        let digest = format_decision_digest(&[
            decision(DecisionStatus::Rejected, "Broad"),
            decision(DecisionStatus::Pending, "Lookalike"),
        ]);
        let lines: Vec<_> = digest.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "- [rejected] pause_entity on meta ad_set 'Broad' (123): CPA 3x target (rejected, do not repeat)"
        );
        assert!(lines[1].starts_with("- [pending]"));
        assert!(!lines[1].contains("do not repeat"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let prior = vec![decision(DecisionStatus::Rejected, "Broad")];
        let a = build_system_prompt(&inputs(&prior, Some("ctx")));
        let b = build_system_prompt(&inputs(&prior, Some("ctx")));
        assert_eq!(a, b);
        assert_eq!(final_summary_prompt(&a, 2), final_summary_prompt(&b, 2));
    }

    #[test]
    fn final_summary_prompt_extends_base() {
        let base = build_system_prompt(&inputs(&[], None));
        let prompt = final_summary_prompt(&base, 2);
        assert!(prompt.starts_with(&base));
        assert!(prompt.contains("## Recommendation limit reached"));
        assert!(prompt.contains("maximum of 2"));
    }
}
