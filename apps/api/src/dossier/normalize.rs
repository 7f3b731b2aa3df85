// Skill ranking, name canonicalisation and degree ranking.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::dossier::models::{
    EducationEntry, SkillCategory, SkillEntry, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL,
};

static NUMERIC_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*(?:/\s*(\d+(?:[.,]\d+)?))?\s*$").unwrap());

static CEFR_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b([abc][12])\b").unwrap());

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

static DEGREE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(doctorat|doctorate|ph\.?\s?d|master|ingénieur|ingenieur|msc|mba|licence|bachelor|bsc|dut|bts|deust|deug|baccalauréat|baccalaureat|bac)\b",
    )
    .unwrap()
});

/// Canonical spellings for common abbreviations and French labels.
const SKILL_ALIASES: &[(&str, &str)] = &[
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("py", "Python"),
    ("cpp", "C++"),
    ("csharp", "C#"),
    ("postgres", "PostgreSQL"),
    ("mongo", "MongoDB"),
    ("elastic", "Elasticsearch"),
    ("k8s", "Kubernetes"),
    ("tf", "Terraform"),
    ("react.js", "React"),
    ("reactjs", "React"),
    ("angularjs", "Angular"),
    ("vuejs", "Vue.js"),
    ("nextjs", "Next.js"),
    ("expressjs", "Express"),
    ("node", "Node.js"),
    ("nodejs", "Node.js"),
    ("sklearn", "scikit-learn"),
    ("sk-learn", "scikit-learn"),
    ("hf", "Hugging Face"),
    ("langchain", "LangChain"),
    ("gcp", "GCP"),
    ("google cloud platform", "GCP"),
    ("problem-solving", "Problem solving"),
    ("problem solving", "Problem solving"),
    ("analyse de données", "Data Analysis"),
    ("analyse des données", "Data Analysis"),
    ("visualisation de données", "Data Visualization"),
    ("visualisation des données", "Data Visualization"),
    ("préparation des données", "Data Preprocessing"),
    ("ia générative", "Generative AI"),
    ("traitement du langage naturel", "NLP"),
    ("traitement automatique du langage", "NLP"),
    ("vision par ordinateur", "Computer Vision"),
    ("modélisation prédictive", "Predictive Modeling"),
    ("développement backend", "Backend Development"),
    ("développement frontend", "Frontend Development"),
    ("développement web", "Web Development"),
    ("développement mobile", "Mobile Development"),
    ("architecture logicielle", "Software Architecture"),
    ("conception api", "API Design"),
    ("conception d'api", "API Design"),
    ("gestion de projet", "Project Management"),
    ("intégration continue", "CI/CD"),
    ("conteneurisation", "Containerization"),
    ("déploiement cloud", "Cloud Deployment"),
    ("architecture cloud", "Cloud Architecture"),
    ("sécurité informatique", "Cybersecurity"),
];

/// Textual language levels on the 1–5 scale. Longer phrases come first so
/// "full professional proficiency" is not read as "professional proficiency".
const LANGUAGE_LEVELS: &[(&str, f64)] = &[
    ("full professional proficiency", 4.5),
    ("professional proficiency", 4.0),
    ("intermédiaire avancé", 3.5),
    ("upper intermediate", 3.5),
    ("langue maternelle", 5.0),
    ("mother tongue", 5.0),
    ("native", 5.0),
    ("bilingue", 5.0),
    ("bilingual", 5.0),
    ("fluent", 4.0),
    ("couramment", 4.0),
    ("courant", 4.0),
    ("intermediate", 3.0),
    ("intermédiaire", 3.0),
    ("basic", 2.0),
    ("basique", 2.0),
    ("notions", 2.0),
    ("scolaire", 2.0),
    ("elementary", 2.0),
    ("beginner", 1.0),
    ("débutant", 1.0),
];

const CEFR_LEVELS: &[(&str, f64)] = &[
    ("c2", 5.0),
    ("c1", 4.0),
    ("b2", 3.5),
    ("b1", 3.0),
    ("a2", 2.0),
    ("a1", 1.0),
];

/// Degree rank per keyword; a higher rank is a higher degree.
fn degree_rank(keyword: &str) -> u8 {
    match keyword {
        "doctorat" | "doctorate" => 8,
        k if k.starts_with("ph") => 8,
        "master" | "ingénieur" | "ingenieur" | "msc" | "mba" => 7,
        "licence" | "bachelor" | "bsc" => 6,
        "dut" | "bts" | "deust" | "deug" => 5,
        _ => 4,
    }
}

fn degree_label(rank: u8) -> &'static str {
    match rank {
        8 => "Bac+8 / Doctorat",
        7 => "Bac+5 / Master-Ingénieur",
        6 => "Bac+3 / Licence",
        5 => "Bac+2 / DUT-BTS",
        _ => "Baccalauréat",
    }
}

/// Normalizes one skill category: reads entries, canonicalises names, drops
/// duplicates (first occurrence wins), sorts by level descending (stable) and
/// truncates to the category cap.
pub fn normalize_skills(value: Option<&Value>, category: SkillCategory) -> Vec<SkillEntry> {
    let Some(items) = value.and_then(Value::as_array) else {
        return vec![];
    };

    let mut seen = HashSet::new();
    let mut entries: Vec<SkillEntry> = items
        .iter()
        .filter_map(|item| read_skill(item, category))
        .filter(|entry| seen.insert(entry.name.to_lowercase()))
        .collect();

    entries.sort_by(|a, b| b.level.cmp(&a.level));
    entries.truncate(category.cap());
    entries
}

fn read_skill(item: &Value, category: SkillCategory) -> Option<SkillEntry> {
    let (name, level) = match item {
        Value::String(name) => (name.as_str(), DEFAULT_LEVEL),
        Value::Object(object) => {
            let name = ["name", "skill", "language", "tool"]
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str))?;
            let level = ["level", "score", "rating"]
                .iter()
                .find_map(|key| object.get(*key).filter(|v| !v.is_null()));
            let level = match level {
                None => DEFAULT_LEVEL,
                Some(value) => read_level(value, category)?,
            };
            (name, level)
        }
        _ => return None,
    };

    let name = canonical_skill_name(name)?;
    Some(SkillEntry::new(name, level))
}

/// Level on the 1–5 scale, or `None` when the value cannot be read as one.
fn read_level(value: &Value, category: SkillCategory) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_f64().and_then(level_from_number),
        Value::String(s) => numeric_level(s).or_else(|| {
            (category == SkillCategory::Languages)
                .then(|| language_level(s))
                .flatten()
                .and_then(level_from_number)
        }),
        _ => None,
    }
}

/// Rounds half-up and clamps into the level range.
fn level_from_number(value: f64) -> Option<u8> {
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(MIN_LEVEL as f64, MAX_LEVEL as f64) as u8)
}

/// "4", "4.5", "4,5" or "4/5". A "/10"-style scale is rescaled to 5.
fn numeric_level(text: &str) -> Option<u8> {
    let caps = NUMERIC_LEVEL.captures(text)?;
    let parse = |m: regex::Match| m.as_str().replace(',', ".").parse::<f64>().ok();
    let value = parse(caps.get(1)?)?;
    match caps.get(2).and_then(parse) {
        Some(scale) if scale > 0.0 => level_from_number(value / scale * MAX_LEVEL as f64),
        Some(_) => None,
        None => level_from_number(value),
    }
}

/// Maps "C1", "native", "courant", ... onto the 1–5 scale.
pub fn language_level(text: &str) -> Option<f64> {
    if let Some(caps) = CEFR_LEVEL.captures(text) {
        let code = caps[1].to_lowercase();
        return CEFR_LEVELS
            .iter()
            .find(|(key, _)| *key == code)
            .map(|(_, level)| *level);
    }

    let lower = text.to_lowercase();
    LANGUAGE_LEVELS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, level)| *level)
}

/// Trims and collapses whitespace, then applies the alias table. Empty names yield `None`.
pub fn canonical_skill_name(name: &str) -> Option<String> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return None;
    }

    let lower = name.to_lowercase();
    let canonical = SKILL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(name);
    Some(canonical)
}

/// Trims the candidate name and title-cases it when it is written in capitals.
pub fn normalize_candidate_name(name: &str) -> Option<String> {
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return None;
    }

    let has_letters = name.chars().any(char::is_alphabetic);
    let all_caps = name
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(char::is_uppercase);
    if has_letters && all_caps {
        Some(title_case(&name))
    } else {
        Some(name)
    }
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Highest degree rank named in `degree`, if any keyword matches.
fn degree_level(degree: &str) -> Option<u8> {
    DEGREE_KEYWORD
        .find_iter(degree)
        .map(|m| degree_rank(&m.as_str().to_lowercase()))
        .max()
}

pub fn degree_level_label(degree: &str) -> Option<&'static str> {
    degree_level(degree).map(degree_label)
}

/// Latest plausible 4-digit year mentioned in `text`.
pub fn latest_year(text: &str) -> Option<i32> {
    YEAR.find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .max()
}

/// Picks the highest-ranked degree; the most recent one wins between equal
/// ranks, then the first listed.
pub fn derive_last_degree(education: &[EducationEntry]) -> Option<String> {
    let mut best: Option<(&EducationEntry, (u8, i32))> = None;
    for entry in education {
        let key = (
            degree_level(&entry.degree).unwrap_or(0),
            entry.year.unwrap_or(0),
        );
        if best.map_or(true, |(_, best_key)| key > best_key) {
            best = Some((entry, key));
        }
    }
    best.map(|(entry, _)| entry.degree.clone())
}
