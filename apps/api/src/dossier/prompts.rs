// Dossier extraction prompt templates.
// Output must stay byte-stable for identical input: no dates, ids or randomness here.

use crate::dossier::extractor::RawDocument;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// Maximum number of CV characters embedded in the prompt.
pub const MAX_CV_CHARS: usize = 6000;

pub const DOSSIER_EXTRACT_SYSTEM: &str = "\
You are a professional CV extractor building a skills dossier. \
Extract ONLY information present in the provided text. \
NEVER invent or estimate missing data: use null or an empty list instead. \
Copy names of degrees, schools, positions and companies verbatim, without translating them.";

pub const DOSSIER_EXTRACT_PROMPT: &str = r#"Extract a skills dossier from the CV text below.

--- CV TEXT ---
{cv_text}
--- END CV ---

OUTPUT SCHEMA (return exactly this structure):
{
  "candidateName": "string" | null,
  "education": [
    {"degree": "string", "institution": "string" | null, "year": number | null}
  ],
  "lastDegree": "string" | null,
  "experience": [
    {"role": "string" | null, "employer": "string" | null,
     "startDate": "string" | null, "endDate": "string" | null,
     "years": number | null}
  ],
  "yearsOfExperience": number | null,
  "languages": [{"name": "string", "level": 1-5}],
  "hardSkills": [{"name": "string", "level": 1-5}],
  "softSkills": [{"name": "string", "level": 1-5}],
  "tools": [{"name": "string", "level": 1-5}]
}

RULES:
1. Levels are integers from 1 (notions) to 5 (expert / native), based on evidence in the CV.
2. languages: at most 3 entries. hardSkills, softSkills, tools: at most 5 entries each, best first.
3. hardSkills are know-how domains (e.g. "Backend Development", "Machine Learning");
   tools are concrete languages, frameworks and software (e.g. "Python", "Docker", "Jira").
4. education.year is the year the degree was (or will be) obtained.
5. startDate / endDate are copied as written in the CV; use "present" for ongoing positions.
6. lastDegree is the highest degree obtained.
7. Return ONLY the JSON object: nothing else, no code fences."#;

/// A fully rendered prompt: fixed system instructions plus the document-specific user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    pub system: String,
    pub user: String,
}

/// Builds the extraction prompt for a document. Deterministic for identical text.
pub fn build_prompt(document: &RawDocument) -> ExtractionPrompt {
    let text = document.text();
    let cv_text = truncate_chars(&text, MAX_CV_CHARS);

    ExtractionPrompt {
        system: format!("{DOSSIER_EXTRACT_SYSTEM} {JSON_ONLY_SYSTEM}"),
        user: DOSSIER_EXTRACT_PROMPT.replace("{cv_text}", cv_text),
    }
}

/// Cuts `text` to at most `max` characters without splitting a code point.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
