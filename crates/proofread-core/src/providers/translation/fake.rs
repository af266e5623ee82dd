//! Deterministic translation service for tests and dry runs.

use super::TranslationService;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Returns `"[<target>] <text>"` for every request. Targets registered with
/// [`FakeTranslator::fail_on`] return an error instead. Every request is recorded as
/// `(source, target, text)`.
pub struct FakeTranslator {
    name: String,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl FakeTranslator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(mut self, target: impl Into<String>) -> Self {
        self.failing.insert(target.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TranslationService for FakeTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((source.to_string(), target.to_string(), text.to_string()));
        }
        if self.failing.contains(target) {
            anyhow::bail!("fake translator refuses target '{}'", target);
        }
        Ok(format!("[{}] {}", target, text))
    }

    fn service_name(&self) -> &str {
        &self.name
    }
}
