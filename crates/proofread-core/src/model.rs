use serde::{Deserialize, Serialize};

/// Author tag carried by human reference translations.
pub const REFERENCE_AUTHOR: &str = "baseline";

/// Case-insensitive language comparison; languages are free-form names ("English", "spanish").
pub fn same_language(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub text: String,
    pub language: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub part: Option<u32>,
    /// Input-only: source file to hydrate `text` from. Cleared once hydrated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_author() -> String {
    REFERENCE_AUTHOR.to_string()
}

impl Translation {
    pub fn new(language: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            author: author.into(),
            prompt: None,
            part: None,
            path: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_part(mut self, part: u32) -> Self {
        self.part = Some(part);
        self
    }

    pub fn is_reference(&self) -> bool {
        self.author == REFERENCE_AUTHOR
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metric_name: String,
    /// Experiment-defined range; `None` when the experiment produced no score.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub llm_model_name: Option<String>,
    /// Which part of an analysis this result scores ("summary" or the question text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_analysis: Option<String>,
    /// Wall time of the experiment invocation. Bookkeeping only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl EvaluationResult {
    pub fn new(metric_name: impl Into<String>, score: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: Some(score),
            reason: None,
            details: None,
            llm_model_name: None,
            related_analysis: None,
            duration_ms: None,
        }
    }

    /// A result carrying no score, with the reason it could not be produced.
    pub fn unscored(metric_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: None,
            reason: Some(reason.into()),
            details: None,
            llm_model_name: None,
            related_analysis: None,
            duration_ms: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model_name = Some(model.into());
        self
    }

    pub fn with_related_analysis(mut self, part: impl Into<String>) -> Self {
        self.related_analysis = Some(part.into());
        self
    }

    pub fn is_failed(&self) -> bool {
        self.score.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisQuestion {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_chunks: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    #[serde(default)]
    pub questions: Vec<AnalysisQuestion>,
    #[serde(default)]
    pub llm_model_name: Option<String>,
    #[serde(default)]
    pub prompt_name: Option<String>,
    #[serde(default)]
    pub evaluation_results: Vec<EvaluationResult>,
}

impl Analysis {
    /// The scoreable parts: the summary first, then each answer keyed by its question.
    pub fn parts(&self) -> Vec<(&str, &str)> {
        std::iter::once(("summary", self.summary.as_str()))
            .chain(
                self.questions
                    .iter()
                    .map(|q| (q.question.as_str(), q.answer.as_str())),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notice_analysis: Vec<Analysis>,
}

impl Document {
    /// Human-readable identifier used in logs and scenario output.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .or_else(|| self.path.clone())
            .unwrap_or_else(|| format!("document[{}]", index))
    }

    pub fn has_reference(&self, language: &str, reference_author: &str) -> bool {
        self.translations
            .iter()
            .any(|t| t.author == reference_author && same_language(&t.language, language))
    }

    /// Reference-author translations in `language`, in manifest order (one per part).
    pub fn references_in(&self, language: &str, reference_author: &str) -> Vec<&Translation> {
        self.translations
            .iter()
            .filter(|t| t.author == reference_author && same_language(&t.language, language))
            .collect()
    }
}

/// Top-level unit of I/O. Reads both `{"documents": [...]}` and a bare document array;
/// always writes the wrapped form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManifestRepr")]
pub struct Manifest {
    pub documents: Vec<Document>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestRepr {
    Wrapped {
        #[serde(default)]
        documents: Vec<Document>,
    },
    Bare(Vec<Document>),
}

impl From<ManifestRepr> for Manifest {
    fn from(repr: ManifestRepr) -> Self {
        match repr {
            ManifestRepr::Wrapped { documents } | ManifestRepr::Bare(documents) => {
                Manifest { documents }
            }
        }
    }
}

/// One (baseline, evaluation) comparison unit plus the results accumulated against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub document: String,
    pub name: String,
    pub baseline: Translation,
    pub evaluation: Translation,
    #[serde(default)]
    pub results: Vec<EvaluationResult>,
}
