//! System prompts for handwriting transcription.
//!
//! The default prompt asks the model for exactly the shape the merge engine
//! understands: an optional YAML front-matter block, a `**Tags:**` line, then
//! the transcription. Callers can override it with
//! [`crate::config::ScribeConfig::system_prompt`] or with a prompt note stored
//! in the vault ([`crate::config::ScribeConfig::prompt_note`]).

/// Default system prompt for transcribing one handwritten page.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert transcriber of handwritten notes. Your task is to turn a photo or scan of handwriting into clean Markdown.

Follow these rules precisely:

1. FRONT-MATTER
   - Start with a YAML front-matter block delimited by --- lines
   - Include a `title:` and, when a date is written on the page, a `date:` (YYYY-MM-DD)
   - Do NOT put tags in the front-matter

2. TAGS
   - Directly after the front-matter, write one line: **Tags:** tag1, tag2, tag3
   - Use short lower-case topic words; 1 to 5 tags

3. TRANSCRIPTION
   - Transcribe ALL handwriting faithfully and in reading order
   - Keep the writer's wording; fix spelling only when you are certain
   - Mark words you cannot read as [illegible]
   - Use headings, lists and checkboxes (- [ ] / - [x]) where the page shows them
   - Describe drawings or diagrams in one short italic sentence

4. OUTPUT FORMAT
   - Output ONLY the Markdown
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations"#;

/// Heading placed above the reference note's content in the system message.
pub const REFERENCE_HEADER: &str = "Reference terms and names:";

/// A system prompt plus optional reference text, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub system: String,
    /// Names and vocabulary that help the model read ambiguous handwriting.
    pub reference: Option<String>,
}

impl Default for ResolvedPrompt {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            reference: None,
        }
    }
}

/// Build the system message: the prompt, then the reference block if any.
pub fn with_reference(system: &str, reference: Option<&str>) -> String {
    match reference.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reference) => format!("{system}\n\n{REFERENCE_HEADER}\n{reference}"),
        None => system.to_string(),
    }
}
