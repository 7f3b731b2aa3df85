//! Response Parser: locates the JSON object in the model's free text and reads
//! the dossier fields out of it.
//!
//! Only a response with no usable JSON object is fatal. Individual fields that
//! are missing or badly typed fall back to defaults in `normalize` and `years`.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dossier::models::{EducationEntry, ExperienceEntry, NormalizedFields, SkillCategory};
use crate::dossier::normalize::{
    derive_last_degree, degree_level_label, latest_year, normalize_candidate_name,
    normalize_skills,
};
use crate::dossier::years::{
    entry_span, interval_years, is_internship, parse_duration, total_years,
    years_excluding_internships, EntrySpan,
};
use crate::llm_client::ModelResponse;

/// Top-level keys that identify an object as a dossier answer.
const KNOWN_KEYS: &[&str] = &[
    "candidateName",
    "candidate_name",
    "education",
    "educations",
    "lastDegree",
    "last_degree",
    "experience",
    "experiences",
    "yearsOfExperience",
    "years_of_experience",
    "languages",
    "hardSkills",
    "hard_skills",
    "softSkills",
    "soft_skills",
    "tools",
    "topTools",
    "top_tools",
];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Returns the first top-level `{ ... }` slice of `text` that parses as a JSON object.
///
/// Braces inside JSON strings (and escaped quotes) are ignored while matching, so
/// prose or code fences around the object do not matter. A balanced group that is
/// not JSON is skipped whole; an unbalanced one (a truncated answer) ends the search,
/// so nothing nested inside a broken object is ever returned.
pub fn locate_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let len = balanced_len(&text.as_bytes()[start..])?;
        let candidate = &text[start..start + len];
        if serde_json::from_str::<Map<String, Value>>(candidate).is_ok() {
            return Some(candidate);
        }
        search_from = start + len;
    }
    None
}

/// Length of the brace-balanced span starting at `bytes[0] == b'{'`.
fn balanced_len(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses and normalizes a model response. Pure: the same text and `today`
/// always yield the same fields.
pub fn parse_response(
    response: &ModelResponse,
    today: NaiveDate,
) -> Result<NormalizedFields, ParseError> {
    let json = locate_json_object(&response.text).ok_or_else(|| {
        ParseError::MalformedResponse("no JSON object found in model output".to_string())
    })?;
    let object: Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| ParseError::MalformedResponse(format!("invalid JSON object: {e}")))?;

    if !KNOWN_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Err(ParseError::MalformedResponse(
            "JSON object has none of the expected dossier keys".to_string(),
        ));
    }

    let education = read_education(field(&object, &["education", "educations"]));
    let last_degree = field(&object, &["lastDegree", "last_degree"])
        .and_then(read_text)
        .or_else(|| derive_last_degree(&education));

    let raw_experience = read_experience(field(&object, &["experience", "experiences"]), today);
    let years_of_experience = total_years(
        field(&object, &["yearsOfExperience", "years_of_experience"]),
        &raw_experience,
    );
    let years_of_experience_excluding_internships =
        years_excluding_internships(&raw_experience, years_of_experience);
    let date_notes = raw_experience
        .iter()
        .filter_map(RawExperience::date_note)
        .collect();
    let experience = raw_experience.into_iter().map(|raw| raw.entry).collect();

    let skills = |category: SkillCategory| {
        let value = category.keys().iter().find_map(|key| field(&object, &[*key]));
        normalize_skills(value, category)
    };

    Ok(NormalizedFields {
        candidate_name: field(&object, &["candidateName", "candidate_name", "name"])
            .and_then(read_text)
            .and_then(|name| normalize_candidate_name(&name)),
        education,
        last_degree,
        experience,
        years_of_experience,
        years_of_experience_excluding_internships,
        date_notes,
        languages: skills(SkillCategory::Languages),
        hard_skills: skills(SkillCategory::HardSkills),
        soft_skills: skills(SkillCategory::SoftSkills),
        tools: skills(SkillCategory::Tools),
    })
}

/// First non-null value among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

/// A trimmed, non-empty string; numbers are accepted and rendered as text.
pub(crate) fn read_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn read_education(value: Option<&Value>) -> Vec<EducationEntry> {
    let Some(items) = value.and_then(Value::as_array) else {
        return vec![];
    };

    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let degree = field(object, &["degree", "diploma"]).and_then(read_text)?;
            let year = field(object, &["year", "endYear", "end_year"]).and_then(read_year);
            Some(EducationEntry {
                level: degree_level_label(&degree).map(String::from),
                institution: field(object, &["institution", "school"]).and_then(read_text),
                year,
                degree,
            })
        })
        .collect()
}

fn read_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|y| y.is_finite())
            .map(|y| y.round() as i32)
            .filter(|y| (1900..=2100).contains(y)),
        Value::String(s) => latest_year(s),
        _ => None,
    }
}

/// An experience entry together with what the years computation needs to know about it.
pub(crate) struct RawExperience {
    pub entry: ExperienceEntry,
    /// Duration stated by the model, in years.
    pub explicit_years: Option<f64>,
    pub span: EntrySpan,
    pub internship: bool,
}

impl RawExperience {
    /// Note for a position whose dates could not be fully used. Positions with an
    /// explicit duration need no dates.
    fn date_note(&self) -> Option<String> {
        if self.explicit_years.is_some() {
            return None;
        }
        let role = self.entry.role.as_deref().unwrap_or("inconnu");
        let employer = self.entry.employer.as_deref().unwrap_or("inconnu");
        match self.span {
            EntrySpan::MissingStart => Some(format!("Date début manquante: {role} @ {employer}")),
            EntrySpan::Dated {
                open_ended: true, ..
            } => Some(format!("Date fin absente (→ présent): {role} @ {employer}")),
            EntrySpan::Inverted => Some(format!("Date fin < début (ignorée): {role}")),
            EntrySpan::Dated { .. } => None,
        }
    }
}

fn read_experience(value: Option<&Value>, today: NaiveDate) -> Vec<RawExperience> {
    let Some(items) = value.and_then(Value::as_array) else {
        return vec![];
    };

    items
        .iter()
        .filter_map(|item| {
            let object = item.as_object()?;
            let role = field(object, &["role", "position", "title"]).and_then(read_text);
            let employer = field(object, &["employer", "company"]).and_then(read_text);
            let start_date = field(object, &["startDate", "start_date"]).and_then(read_text);
            let end_date = field(object, &["endDate", "end_date"]).and_then(read_text);
            if role.is_none() && employer.is_none() {
                return None;
            }

            let explicit_years = field(object, &["years", "duration"]).and_then(parse_duration);
            let span = entry_span(start_date.as_deref(), end_date.as_deref(), today);
            let years = explicit_years.or_else(|| span.interval().map(interval_years));
            let internship = role.as_deref().is_some_and(is_internship);

            Some(RawExperience {
                entry: ExperienceEntry {
                    role,
                    employer,
                    years,
                    start_date,
                    end_date,
                },
                explicit_years,
                span,
                internship,
            })
        })
        .collect()
}
