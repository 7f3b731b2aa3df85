use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lowest and highest level a skill can carry after normalization.
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
/// Level assumed when the model names a skill without rating it.
pub const DEFAULT_LEVEL: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    pub level: u8,
}

impl SkillEntry {
    pub fn new(name: impl Into<String>, level: u8) -> Self {
        Self {
            name: name.into(),
            level: level.clamp(MIN_LEVEL, MAX_LEVEL),
        }
    }
}

/// The four ranked, capped lists of a dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillCategory {
    Languages,
    HardSkills,
    SoftSkills,
    Tools,
}

impl SkillCategory {
    #[cfg(test)]
    pub const ALL: [SkillCategory; 4] = [
        SkillCategory::Languages,
        SkillCategory::HardSkills,
        SkillCategory::SoftSkills,
        SkillCategory::Tools,
    ];

    /// Top-N cap applied after sorting.
    pub fn cap(self) -> usize {
        match self {
            SkillCategory::Languages => 3,
            _ => 5,
        }
    }

    /// Keys the model may use for this category, preferred spelling first.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            SkillCategory::Languages => &["languages"],
            SkillCategory::HardSkills => &["hardSkills", "hard_skills"],
            SkillCategory::SoftSkills => &["softSkills", "soft_skills"],
            SkillCategory::Tools => &["tools", "topTools", "top_tools"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub degree: String,
    pub institution: Option<String>,
    pub year: Option<i32>,
    /// Degree level label derived from the degree name, e.g. "Bac+5 / Master-Ingénieur".
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub role: Option<String>,
    pub employer: Option<String>,
    /// Duration of this position in years, explicit or derived from its dates.
    pub years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Candidate photo lifted from the PDF as an already-encoded image stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub data: Vec<u8>,
}

fn to_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// Everything the normalizer recovers from the model's answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedFields {
    pub candidate_name: Option<String>,
    pub education: Vec<EducationEntry>,
    pub last_degree: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub years_of_experience: u32,
    pub years_of_experience_excluding_internships: u32,
    /// Notes about positions whose dates could not be fully used.
    pub date_notes: Vec<String>,
    pub languages: Vec<SkillEntry>,
    pub hard_skills: Vec<SkillEntry>,
    pub soft_skills: Vec<SkillEntry>,
    pub tools: Vec<SkillEntry>,
}

#[cfg(test)]
impl NormalizedFields {
    pub fn skills(&self, category: SkillCategory) -> &[SkillEntry] {
        match category {
            SkillCategory::Languages => &self.languages,
            SkillCategory::HardSkills => &self.hard_skills,
            SkillCategory::SoftSkills => &self.soft_skills,
            SkillCategory::Tools => &self.tools,
        }
    }
}

/// The skills dossier returned to callers. Built once per request, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dossier {
    pub candidate_name: Option<String>,
    pub photo: Option<Photo>,
    pub education: Vec<EducationEntry>,
    pub last_degree: Option<String>,
    pub experience: Vec<ExperienceEntry>,
    pub years_of_experience: u32,
    pub years_of_experience_excluding_internships: u32,
    pub languages: Vec<SkillEntry>,
    pub hard_skills: Vec<SkillEntry>,
    pub soft_skills: Vec<SkillEntry>,
    pub tools: Vec<SkillEntry>,
    pub missing_information: Vec<String>,
}
