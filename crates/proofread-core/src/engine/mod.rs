pub mod runner;

pub use runner::{has_analyses, unconfigured_languages, Runner, TranslationPlan};
