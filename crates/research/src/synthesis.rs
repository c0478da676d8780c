//! Answer synthesis with citations.
//!
//! Evidence is numbered `[1]..[n]` in pool order. After the model answers,
//! citation markers are checked against the pool: markers pointing outside
//! it are removed, so the final answer only cites retrieved sources.

use crate::model::ModelCaller;
use crate::state::{EvidenceItem, SourceType};
use prosearch_core::{AppError, AppResult};
use prosearch_prompt::ANSWER;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Appended when the answer had no evidence behind it.
pub const NO_EVIDENCE_CAVEAT: &str = "No supporting evidence could be retrieved for this question, \
so this answer is not backed by any cited source and may be incomplete or out of date.";

/// Largest number read as a citation marker; `[2024]` and the like are
/// left in the text untouched.
const MAX_CITATION_NUMBER: usize = 999;

/// A pooled source referenced by the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// `[k]` marker as it appears in the answer
    pub citation_ref: String,
    /// 1-based position in the evidence pool
    pub index: usize,
    pub source_type: SourceType,
    pub source_label: String,
    /// URL for web results, chunk id for documents
    pub source_id: String,
}

/// Final answer text and the sources it cites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Writes the answer from numbered evidence.
#[async_trait::async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn compose(&self, topic: &str, evidence: &[EvidenceItem]) -> AppResult<String>;
}

/// Synthesizer backed by the `research.answer` prompt.
pub struct LlmAnswerSynthesizer {
    caller: ModelCaller,
}

impl LlmAnswerSynthesizer {
    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }
}

#[async_trait::async_trait]
impl AnswerSynthesizer for LlmAnswerSynthesizer {
    async fn compose(&self, topic: &str, evidence: &[EvidenceItem]) -> AppResult<String> {
        let numbered: Vec<serde_json::Value> = evidence
            .iter()
            .enumerate()
            .map(|(i, item)| {
                json!({
                    "index": i + 1,
                    "label": item.source_label,
                    "text": item.text,
                })
            })
            .collect();

        self.caller
            .text(
                ANSWER,
                json!({
                    "research_topic": topic,
                    "has_evidence": !evidence.is_empty(),
                    "evidence": numbered,
                }),
            )
            .await
    }
}

/// Compose the answer and reconcile its citations with the pool.
///
/// This is the one research step whose failure is returned to the caller.
pub async fn synthesize(
    synthesizer: &dyn AnswerSynthesizer,
    topic: &str,
    pool: &[EvidenceItem],
) -> AppResult<Answer> {
    let draft = synthesizer
        .compose(topic, pool)
        .await
        .map_err(|e| AppError::Research(format!("Answer synthesis failed: {}", e)))?;

    if draft.trim().is_empty() {
        return Err(AppError::Research(
            "Answer synthesis returned no text".to_string(),
        ));
    }

    let (mut text, citations) = reconcile_citations(draft.trim(), pool);
    if pool.is_empty() {
        text = format!("{}\n\n_{}_", text, NO_EVIDENCE_CAVEAT);
    }

    tracing::info!(
        "Synthesized answer with {} citations from {} evidence items",
        citations.len(),
        pool.len()
    );
    Ok(Answer { text, citations })
}

/// Strip markers that point outside the pool and list cited items in
/// first-reference order.
pub fn reconcile_citations(text: &str, pool: &[EvidenceItem]) -> (String, Vec<Citation>) {
    let mut out = String::with_capacity(text.len());
    let mut cited: Vec<usize> = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];

        let Some((numbers, len)) = parse_marker(after) else {
            out.push('[');
            rest = &after[1..];
            continue;
        };

        let valid: Vec<usize> = numbers
            .into_iter()
            .filter(|k| (1..=pool.len()).contains(k))
            .collect();

        if valid.is_empty() {
            let kept = out.trim_end_matches(' ').len();
            out.truncate(kept);
        } else {
            let list: Vec<String> = valid.iter().map(|k| k.to_string()).collect();
            out.push('[');
            out.push_str(&list.join(", "));
            out.push(']');
            for k in valid {
                if !cited.contains(&k) {
                    cited.push(k);
                }
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);

    let citations = cited
        .into_iter()
        .map(|k| {
            let item = &pool[k - 1];
            Citation {
                citation_ref: format!("[{}]", k),
                index: k,
                source_type: item.source_type,
                source_label: item.source_label.clone(),
                source_id: item.id.clone(),
            }
        })
        .collect();

    (out, citations)
}

/// Parse `[k]` or `[k, m, ...]` at the start of `s`; returns the numbers and
/// the marker's byte length. Brackets holding a zero or a number above
/// [`MAX_CITATION_NUMBER`] are not markers.
fn parse_marker(s: &str) -> Option<(Vec<usize>, usize)> {
    let close = s.find(']')?;
    let inner = &s[1..close];
    if inner.trim().is_empty() {
        return None;
    }

    let numbers = inner
        .split(',')
        .map(|part| part.trim().parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    if numbers.iter().any(|k| !(1..=MAX_CITATION_NUMBER).contains(k)) {
        return None;
    }
    Some((numbers, close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<EvidenceItem> {
        (1..=n)
            .map(|i| EvidenceItem {
                source_type: SourceType::Web,
                id: format!("https://source{}.example", i),
                text: format!("fact {}", i),
                raw_score: 1.0,
                rerank_score: None,
                source_label: format!("Source {}", i),
                citation_ref: Some(format!("[{}]", i)),
            })
            .collect()
    }

    struct Canned(&'static str);

    #[async_trait::async_trait]
    impl AnswerSynthesizer for Canned {
        async fn compose(&self, _topic: &str, _evidence: &[EvidenceItem]) -> AppResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl AnswerSynthesizer for Broken {
        async fn compose(&self, _topic: &str, _evidence: &[EvidenceItem]) -> AppResult<String> {
            Err(AppError::Llm("connection refused".to_string()))
        }
    }

    #[test]
    fn test_valid_markers_kept_in_first_reference_order() {
        let (text, citations) =
            reconcile_citations("Solar grew [2]. Wind too [1, 2]. Again [2].", &pool(3));
        assert_eq!(text, "Solar grew [2]. Wind too [1, 2]. Again [2].");
        let refs: Vec<&str> = citations.iter().map(|c| c.citation_ref.as_str()).collect();
        assert_eq!(refs, vec!["[2]", "[1]"]);
        assert_eq!(citations[0].source_id, "https://source2.example");
    }

    #[test]
    fn test_out_of_range_markers_removed() {
        let (text, citations) = reconcile_citations("Claim [7]. Mixed [1, 9].", &pool(2));
        assert_eq!(text, "Claim. Mixed [1].");
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn test_non_citation_brackets_untouched() {
        let input = "See [the report] and [x] or [] and arrays like a[0";
        let (text, citations) = reconcile_citations(input, &pool(1));
        assert_eq!(text, "See [the report] and [x] or [] and arrays like a[0");
        assert!(citations.is_empty());
    }

    #[test]
    fn test_years_and_indices_are_not_markers() {
        let (text, citations) = reconcile_citations(
            "The IEA report [2024] shows growth [1]. Row [0] is a header.",
            &pool(2),
        );
        assert_eq!(text, "The IEA report [2024] shows growth [1]. Row [0] is a header.");
        let refs: Vec<&str> = citations.iter().map(|c| c.citation_ref.as_str()).collect();
        assert_eq!(refs, vec!["[1]"]);
    }

    #[test]
    fn test_empty_pool_strips_everything() {
        let (text, citations) = reconcile_citations("Made up [1].", &[]);
        assert_eq!(text, "Made up.");
        assert!(citations.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_adds_caveat() {
        let answer = synthesize(&Canned("General knowledge answer."), "q", &[])
            .await
            .unwrap();
        assert!(answer.text.starts_with("General knowledge answer."));
        assert!(answer.text.contains(NO_EVIDENCE_CAVEAT));
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_synthesis_failure_surfaces() {
        let err = synthesize(&Broken, "q", &pool(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Research(_)));
    }

    #[tokio::test]
    async fn test_blank_answer_is_error() {
        assert!(synthesize(&Canned("   "), "q", &pool(1)).await.is_err());
    }
}
