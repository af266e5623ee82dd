//! Generation prompts. Each prompt's name is recorded on what it produces
//! (`Translation::prompt`, `Analysis::prompt_name`).

pub struct TranslationPrompt {
    pub name: &'static str,
    pub render: fn(from: &str, to: &str, text: &str) -> String,
}

pub struct AnalysisPrompt {
    pub name: &'static str,
    pub render: fn(notice: &str) -> String,
    /// A reply must answer exactly these, in order.
    pub questions: &'static [&'static str],
}

pub const TRANSLATION_PROMPTS: &[TranslationPrompt] = &[TranslationPrompt {
    name: "simple_translation_prompt",
    render: simple_translation_prompt,
}];

pub const ANALYSIS_PROMPTS: &[AnalysisPrompt] = &[
    AnalysisPrompt {
        name: "prompt_1",
        render: prompt_1,
        questions: PLAIN_QUESTIONS,
    },
    AnalysisPrompt {
        name: "prompt_2",
        render: prompt_2,
        questions: HEADED_QUESTIONS,
    },
];

/// Questions asked by `prompt_1`, in order.
pub const PLAIN_QUESTIONS: &[&str] = &[
    "What actions are required by the recipient?",
    "Is the document primarily informational or is action required?",
    "Is this notice written in plain language, at 6th-grade reading level or lower?",
    "How could this document be more effective for the recipient?",
];

/// Headings asked by `prompt_2`; they line up with [`PLAIN_QUESTIONS`].
pub const HEADED_QUESTIONS: &[&str] = &[
    "**Required Actions**",
    "**Document Classification**",
    "**Plain Language Assessment**",
    "**Effectiveness Improvements**",
];

const JSON_TRANSLATION_REPLY: &str = r#"Reply with JSON only, in the form {"text": "<translation>"}."#;

const JSON_ANALYSIS_REPLY: &str = r#"Reply with JSON only, in the form
{"summary": "<summary>", "questions": [{"question": "<question as asked>", "answer": "<answer>"}]}"#;

pub fn simple_translation_prompt(from: &str, to: &str, text: &str) -> String {
    format!(
        "Translate the {from} text below into {to}. Keep the meaning, tone and formatting. \
         Do not add explanations.\n{reply}\n\n{from} text:\n{text}\n",
        from = from,
        to = to,
        reply = JSON_TRANSLATION_REPLY,
        text = text,
    )
}

pub fn prompt_1(notice: &str) -> String {
    let questions: String = PLAIN_QUESTIONS.iter().map(|q| format!("- {}\n", q)).collect();
    format!(
        "Below is a benefits notice sent to a program recipient.\n\n\
         Summarize the notice in two or three sentences, then answer each question below \
         in two or three sentences.\n\n\
         Questions:\n{questions}\n{reply}\n\nNotice:\n{notice}\n",
        questions = questions,
        reply = JSON_ANALYSIS_REPLY,
        notice = notice,
    )
}

pub fn prompt_2(notice: &str) -> String {
    format!(
        "You are reviewing a benefits notice for how well it serves the person who receives it.\n\n\
         Summary: in two or three sentences, state the key information and purpose of the notice.\n\n\
         Then address each heading with two or three sentences of specific analysis:\n\
         - {actions}: what must the recipient do after receiving this notice? Include deadlines \
         and what happens if they do nothing.\n\
         - {classification}: is the notice mainly informational or does it require a response? \
         Explain the consequences of not acting on it.\n\
         - {plain}: is the language suitable for a 6th-grade reader? Consider vocabulary, \
         sentence structure and jargon.\n\
         - {improvements}: which changes would most improve clarity, accessibility and \
         actionability for the recipient?\n\n\
         Use the heading text as the question.\n{reply}\n\nNotice:\n{notice}\n",
        actions = HEADED_QUESTIONS[0],
        classification = HEADED_QUESTIONS[1],
        plain = HEADED_QUESTIONS[2],
        improvements = HEADED_QUESTIONS[3],
        reply = JSON_ANALYSIS_REPLY,
        notice = notice,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_source_and_json_instructions() {
        let p = simple_translation_prompt("English", "Korean", "Your benefits were approved.");
        assert!(p.contains("into Korean"));
        assert!(p.contains("Your benefits were approved."));
        assert!(p.contains(r#"{"text""#));

        for prompt in ANALYSIS_PROMPTS {
            let rendered = (prompt.render)("NOTICE BODY");
            assert!(rendered.contains("NOTICE BODY"), "{}", prompt.name);
            assert!(rendered.contains("\"summary\""), "{}", prompt.name);
        }
    }
}
