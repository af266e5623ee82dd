use crate::errors::ConfigError;
use crate::model::{same_language, Document, Scenario, Translation, REFERENCE_AUTHOR};
use std::fmt::{Display, Formatter};

/// Selects translations within a document. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    pub language: Option<String>,
    pub author: Option<String>,
    pub prompt: Option<String>,
    /// Narrows to one chunk of a multi-part document. Not part of the scenario name.
    pub part: Option<u32>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn part(mut self, part: u32) -> Self {
        self.part = Some(part);
        self
    }

    /// Language is compared case-insensitively; author and prompt exactly.
    pub fn matches(&self, t: &Translation) -> bool {
        self.language
            .as_deref()
            .map_or(true, |l| same_language(l, &t.language))
            && self.author.as_deref().map_or(true, |a| a == t.author)
            && self
                .prompt
                .as_deref()
                .map_or(true, |p| t.prompt.as_deref() == Some(p))
            && self.part.map_or(true, |p| t.part == Some(p))
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{language: {}, author: {}, prompt: {}",
            self.language.as_deref().unwrap_or("*"),
            self.author.as_deref().unwrap_or("*"),
            self.prompt.as_deref().unwrap_or("*"),
        )?;
        if let Some(part) = self.part {
            write!(f, ", part: {}", part)?;
        }
        write!(f, "}}")
    }
}

/// Scenario label: the identifying author/prompt values of both conditions (the reference
/// author carries no information and is dropped), then the compared language. Lower-cased,
/// joined with `_`: `{author: "aya-expanse:8b"}` vs `{language: "Spanish"}` gives
/// `aya-expanse:8b_spanish`.
pub fn build_name(from: &Condition, to: &Condition) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cond in [from, to] {
        for value in [cond.author.as_deref(), cond.prompt.as_deref()]
            .into_iter()
            .flatten()
        {
            let value = value.to_lowercase();
            if value != REFERENCE_AUTHOR && !parts.contains(&value) {
                parts.push(value);
            }
        }
    }
    if let Some(language) = to.language.as_deref().or(from.language.as_deref()) {
        parts.push(language.to_lowercase());
    }
    parts.join("_")
}

/// One scenario per document that has exactly one translation matching each condition.
/// Documents with no match for either side are skipped with a warning. More than one match
/// is an error: the comparison would otherwise silently depend on manifest order.
pub fn build_scenarios(
    documents: &[Document],
    from: &Condition,
    to: &Condition,
) -> Result<Vec<Scenario>, ConfigError> {
    let mut scenarios = Vec::new();
    for (index, document) in documents.iter().enumerate() {
        let label = document.label(index);
        if let Some(scenario) = build_document_scenario(&label, document, from, to)? {
            scenarios.push(scenario);
        }
    }
    Ok(scenarios)
}

/// The single-document step of [`build_scenarios`]; `label` identifies the document in
/// the scenario and in logs.
pub fn build_document_scenario(
    label: &str,
    document: &Document,
    from: &Condition,
    to: &Condition,
) -> Result<Option<Scenario>, ConfigError> {
    let name = build_name(from, to);
    let baseline = unique_match(label, &document.translations, from)?;
    let evaluation = unique_match(label, &document.translations, to)?;

    let (Some(baseline), Some(evaluation)) = (baseline, evaluation) else {
        tracing::warn!(
            scenario = %name,
            document = %label,
            missing = if baseline.is_none() { "from" } else { "to" },
            "skipping document: no translation matches scenario condition"
        );
        return Ok(None);
    };

    Ok(Some(Scenario {
        document: label.to_string(),
        name,
        baseline: baseline.clone(),
        evaluation: evaluation.clone(),
        results: Vec::new(),
    }))
}

fn unique_match<'a>(
    document: &str,
    translations: &'a [Translation],
    condition: &Condition,
) -> Result<Option<&'a Translation>, ConfigError> {
    let mut matches = translations.iter().filter(|t| condition.matches(t));
    let first = matches.next();
    let extra = matches.count();
    if extra > 0 {
        return Err(ConfigError::AmbiguousTranslation {
            document: document.to_string(),
            condition: condition.to_string(),
            count: extra + 1,
        });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, translations: Vec<Translation>) -> Document {
        Document {
            name: Some(name.into()),
            translations,
            ..Document::default()
        }
    }

    #[test]
    fn build_name_joins_identifying_values_and_language() {
        let from = Condition::new().author("aya-expanse:8b");
        let to = Condition::new().language("spanish");
        assert_eq!(build_name(&from, &to), "aya-expanse:8b_spanish");

        let from = Condition::new().language("Spanish").author("baseline");
        let to = Condition::new().language("Spanish").author("modelX");
        assert_eq!(build_name(&from, &to), "modelx_spanish");

        let to = Condition::new()
            .language("Spanish")
            .author("modelX")
            .prompt("simple_translation_prompt");
        assert_eq!(
            build_name(&from, &to),
            "modelx_simple_translation_prompt_spanish"
        );
    }

    #[test]
    fn condition_language_is_case_insensitive_author_is_not() {
        let t = Translation::new("Spanish", "ModelX", "hola");
        assert!(Condition::new().language("SPANISH").matches(&t));
        assert!(!Condition::new().author("modelx").matches(&t));
        assert!(!Condition::new().prompt("p1").matches(&t));
        assert!(Condition::new().matches(&t));
        assert!(!Condition::new().part(1).matches(&t));
        assert!(Condition::new().part(2).matches(&t.clone().with_part(2)));
    }

    #[test]
    fn documents_missing_a_side_are_skipped() {
        let docs = vec![
            doc(
                "complete",
                vec![
                    Translation::new("English", "baseline", "hello"),
                    Translation::new("Spanish", "baseline", "hola"),
                    Translation::new("Spanish", "modelX", "hola!"),
                ],
            ),
            doc("no_reference", vec![Translation::new("Spanish", "modelX", "hola")]),
            doc("no_candidate", vec![Translation::new("Spanish", "baseline", "hola")]),
        ];
        let from = Condition::new().language("Spanish").author("baseline");
        let to = Condition::new().language("Spanish").author("modelX");

        let scenarios = build_scenarios(&docs, &from, &to).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].document, "complete");
        assert_eq!(scenarios[0].name, "modelx_spanish");
        assert_eq!(scenarios[0].baseline.text, "hola");
        assert_eq!(scenarios[0].evaluation.text, "hola!");
        assert!(scenarios[0].results.is_empty());
    }

    #[test]
    fn ambiguous_matches_are_reported() {
        let docs = vec![doc(
            "twice",
            vec![
                Translation::new("Spanish", "baseline", "hola"),
                Translation::new("Spanish", "modelX", "uno"),
                Translation::new("spanish", "modelX", "dos"),
            ],
        )];
        let from = Condition::new().language("Spanish").author("baseline");
        let to = Condition::new().language("Spanish").author("modelX");

        let err = build_scenarios(&docs, &from, &to).unwrap_err();
        match err {
            ConfigError::AmbiguousTranslation {
                document, count, ..
            } => {
                assert_eq!(document, "twice");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
