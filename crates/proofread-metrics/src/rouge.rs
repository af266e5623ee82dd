//! ROUGE overlap between a candidate translation and its reference.
//!
//! F-measures for ROUGE-1, ROUGE-2, ROUGE-L and summary-level ROUGE-Lsum (sentences split on
//! newlines). Tokens are lower-cased runs of alphanumeric characters; no stemming.

use async_trait::async_trait;
use proofread_core::metrics_api::{ExperimentOutput, ScenarioExperiment, ValueRange};
use proofread_core::model::{EvaluationResult, Scenario};
use std::collections::HashMap;

pub const NAME: &str = "rouge_experiment";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RougeScores {
    pub rouge1: f64,
    pub rouge2: f64,
    pub rouge_l: f64,
    pub rouge_lsum: f64,
}

pub struct RougeExperiment {
    name: String,
}

impl RougeExperiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for RougeExperiment {
    fn default() -> Self {
        Self::new(NAME)
    }
}

#[async_trait]
impl ScenarioExperiment for RougeExperiment {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_range(&self) -> Option<ValueRange> {
        Some(ValueRange::UNIT)
    }

    async fn run_eval(&self, scenario: &Scenario) -> anyhow::Result<ExperimentOutput> {
        let s = rouge(&scenario.baseline.text, &scenario.evaluation.text);
        Ok(
            EvaluationResult::new(format!("{}:{}", self.name, scenario.name), s.rouge_lsum)
                .with_details(serde_json::json!({
                    "rouge1": s.rouge1,
                    "rouge2": s.rouge2,
                    "rougeL": s.rouge_l,
                    "rougeLsum": s.rouge_lsum,
                }))
                .into(),
        )
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn rouge(reference: &str, candidate: &str) -> RougeScores {
    let r = tokenize(reference);
    let c = tokenize(candidate);
    RougeScores {
        rouge1: rouge_n(&r, &c, 1),
        rouge2: rouge_n(&r, &c, 2),
        rouge_l: {
            let lcs = lcs_table(&r, &c);
            f_measure(lcs[r.len()][c.len()], c.len(), r.len())
        },
        rouge_lsum: rouge_lsum(reference, candidate),
    }
}

fn f_measure(hits: usize, candidate_len: usize, reference_len: usize) -> f64 {
    if hits == 0 || candidate_len == 0 || reference_len == 0 {
        return 0.0;
    }
    let precision = hits as f64 / candidate_len as f64;
    let recall = hits as f64 / reference_len as f64;
    2.0 * precision * recall / (precision + recall)
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for gram in tokens.windows(n) {
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}

fn rouge_n(reference: &[String], candidate: &[String], n: usize) -> f64 {
    let r = ngram_counts(reference, n);
    let c = ngram_counts(candidate, n);
    let overlap: usize = c
        .iter()
        .map(|(gram, count)| (*count).min(r.get(gram).copied().unwrap_or(0)))
        .sum();
    f_measure(overlap, c.values().sum(), r.values().sum())
}

fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<usize>> {
    let mut t = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            t[i][j] = if a[i - 1] == b[j - 1] {
                t[i - 1][j - 1] + 1
            } else {
                t[i - 1][j].max(t[i][j - 1])
            };
        }
    }
    t
}

/// Indices into `a` of one longest common subsequence with `b`.
fn lcs_indices(a: &[String], b: &[String]) -> Vec<usize> {
    let t = lcs_table(a, b);
    let (mut i, mut j) = (a.len(), b.len());
    let mut out = Vec::new();
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            out.push(i - 1);
            i -= 1;
            j -= 1;
        } else if t[i - 1][j] >= t[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    out.reverse();
    out
}

fn rouge_lsum(reference: &str, candidate: &str) -> f64 {
    let sentences = |text: &str| -> Vec<Vec<String>> {
        text.lines()
            .map(tokenize)
            .filter(|s| !s.is_empty())
            .collect()
    };
    let refs = sentences(reference);
    let cands = sentences(candidate);

    let count = |sents: &[Vec<String>]| -> HashMap<String, usize> {
        let mut m = HashMap::new();
        for t in sents.iter().flatten() {
            *m.entry(t.clone()).or_insert(0) += 1;
        }
        m
    };
    let mut ref_left = count(&refs);
    let mut cand_left = count(&cands);
    let ref_len: usize = refs.iter().map(Vec::len).sum();
    let cand_len: usize = cands.iter().map(Vec::len).sum();

    let mut hits = 0;
    for r in &refs {
        let mut union: Vec<usize> = cands.iter().flat_map(|c| lcs_indices(r, c)).collect();
        union.sort_unstable();
        union.dedup();
        for i in union {
            let token = &r[i];
            let (Some(rl), Some(cl)) = (ref_left.get(token).copied(), cand_left.get(token).copied())
            else {
                continue;
            };
            if rl > 0 && cl > 0 {
                hits += 1;
                ref_left.insert(token.clone(), rl - 1);
                cand_left.insert(token.clone(), cl - 1);
            }
        }
    }
    f_measure(hits, cand_len, ref_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofread_core::model::Translation;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn identical_text_scores_one() {
        let s = rouge("Su solicitud fue aprobada.", "su solicitud fue aprobada");
        assert!(close(s.rouge1, 1.0));
        assert!(close(s.rouge2, 1.0));
        assert!(close(s.rouge_l, 1.0));
        assert!(close(s.rouge_lsum, 1.0));
    }

    #[test]
    fn partial_overlap_matches_hand_computed_values() {
        // ref: the cat sat on the mat / cand: the cat lay on the mat
        let s = rouge("the cat sat on the mat", "the cat lay on the mat");
        assert!(close(s.rouge1, 5.0 / 6.0));
        // bigrams: shared "the cat", "on the", "the mat" of 5
        assert!(close(s.rouge2, 3.0 / 5.0));
        assert!(close(s.rouge_l, 5.0 / 6.0));
    }

    #[test]
    fn disjoint_or_empty_text_scores_zero() {
        assert_eq!(rouge("hola", "adios").rouge1, 0.0);
        assert_eq!(rouge("", "adios").rouge_lsum, 0.0);
        assert_eq!(rouge("uno", "").rouge2, 0.0);
    }

    #[test]
    fn lsum_matches_reordered_sentences() {
        let reference = "the notice was approved\nbenefits start in may";
        let candidate = "benefits start in may\nthe notice was approved";
        let s = rouge(reference, candidate);
        assert!(close(s.rouge_lsum, 1.0));
        assert!(s.rouge_l < 1.0);
        assert!(close(s.rouge1, 1.0));
    }

    #[tokio::test]
    async fn result_is_named_after_scenario_and_scores_lsum() {
        let scenario = Scenario {
            document: "notice".into(),
            name: "modelx_spanish".into(),
            baseline: Translation::new("Spanish", "baseline", "hola mundo"),
            evaluation: Translation::new("Spanish", "modelX", "hola a todo el mundo"),
            results: vec![],
        };
        let out = RougeExperiment::default().run_eval(&scenario).await.unwrap();
        let results = out.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metric_name, "rouge_experiment:modelx_spanish");
        let details = results[0].details.as_ref().unwrap();
        assert_eq!(results[0].score, details["rougeLsum"].as_f64());
        assert!(details["rouge1"].as_f64().unwrap() > 0.0);
    }
}
