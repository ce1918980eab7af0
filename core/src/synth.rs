//! Synthesizer: merge per-file analyses into one report with a single call.

use crate::absorb::{Absorbed, absorb, synthesis_error_report};
use crate::inference::InferenceClient;
use crate::prompts::synthesis_prompt;
use crate::types::{AnalysisFragment, ReportVariant};

/// Fragments rendered and joined with a blank line.
pub fn corpus(fragments: &[AnalysisFragment]) -> String {
    fragments
        .iter()
        .map(AnalysisFragment::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Issue exactly one inference call for the whole report.
///
/// A failed call yields the error-placeholder report, tagged as annotated so
/// callers can decide whether that is acceptable.
pub async fn synthesize(
    client: &dyn InferenceClient,
    fragments: &[AnalysisFragment],
    project: &str,
    variant: ReportVariant,
) -> Absorbed {
    let prompt = synthesis_prompt(variant, project, &corpus(fragments));
    tracing::info!(
        repo = project,
        variant = %variant,
        fragments = fragments.len(),
        "Generating project summary"
    );
    absorb(
        client.generate(&prompt).await,
        "synthesis",
        synthesis_error_report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInference;
    use pretty_assertions::assert_eq;

    fn fragment(rel: &str, text: &str) -> AnalysisFragment {
        AnalysisFragment {
            rel_path: rel.to_string(),
            results: vec![text.to_string()],
        }
    }

    #[test]
    fn corpus_joins_rendered_fragments() {
        let frags = vec![fragment("a.py", "A"), fragment("b.py", "B")];
        assert_eq!(
            corpus(&frags),
            "## Analysis of a.py\n\nA\n\n## Analysis of b.py\n\nB"
        );
    }

    #[tokio::test]
    async fn single_call_with_variant_prompt() {
        let client = ScriptedInference::new().with_default("# tool\n\nREADME body");
        let frags = vec![fragment("a.py", "A")];

        let out = synthesize(&client, &frags, "tool", ReportVariant::Readme).await;

        assert_eq!(out, Absorbed::Clean("# tool\n\nREADME body".to_string()));
        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("**# tool**"));
        assert!(prompts[0].contains("## Analysis of a.py"));
    }

    #[tokio::test]
    async fn failure_yields_placeholder() {
        let client = ScriptedInference::new().fail_when_contains("CODE ANALYSES", "quota exceeded");

        let out = synthesize(&client, &[], "tool", ReportVariant::Analysis).await;

        assert!(out.is_annotated());
        assert_eq!(
            out.into_text(),
            "# Error Generating Project Summary\n\nAn error occurred: API error (429): quota exceeded"
        );
    }
}
