use crate::dossier::models::{Dossier, NormalizedFields, Photo};

/// Merges the normalized fields with the extracted photo into the final dossier,
/// noting every section that came back empty.
pub fn assemble(fields: NormalizedFields, photo: Option<Photo>) -> Dossier {
    let missing_information = missing_information(&fields, photo.is_some());

    Dossier {
        candidate_name: fields.candidate_name,
        photo,
        education: fields.education,
        last_degree: fields.last_degree,
        experience: fields.experience,
        years_of_experience: fields.years_of_experience,
        years_of_experience_excluding_internships: fields.years_of_experience_excluding_internships,
        languages: fields.languages,
        hard_skills: fields.hard_skills,
        soft_skills: fields.soft_skills,
        tools: fields.tools,
        missing_information,
    }
}

fn missing_information(fields: &NormalizedFields, has_photo: bool) -> Vec<String> {
    let mut notes = Vec::new();

    if fields.candidate_name.is_none() {
        notes.push("Nom du candidat non détecté".to_string());
    }
    if !has_photo {
        notes.push("Photo candidat non trouvée".to_string());
    }
    if fields.education.is_empty() {
        notes.push("Aucune formation détectée".to_string());
    }
    if fields.last_degree.is_none() {
        notes.push("Dernier diplôme non déterminé".to_string());
    }
    if fields.experience.is_empty() {
        notes.push("Aucune expérience détectée".to_string());
    }
    notes.extend(fields.date_notes.iter().cloned());
    if fields.languages.is_empty() {
        notes.push("Aucune langue détectée".to_string());
    }
    if fields.hard_skills.is_empty() {
        notes.push("Aucun hard skill détecté".to_string());
    }
    if fields.soft_skills.is_empty() {
        notes.push("Aucun soft skill détecté".to_string());
    }
    if fields.tools.is_empty() {
        notes.push("Aucun outil maîtrisé détecté".to_string());
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dossier::models::{EducationEntry, ExperienceEntry, SkillEntry};

    fn complete_fields() -> NormalizedFields {
        NormalizedFields {
            candidate_name: Some("J. Doe".to_string()),
            education: vec![EducationEntry {
                degree: "MSc Computer Science".to_string(),
                institution: Some("ETH".to_string()),
                year: Some(2019),
                level: Some("Bac+5 / Master-Ingénieur".to_string()),
            }],
            last_degree: Some("MSc Computer Science".to_string()),
            experience: vec![ExperienceEntry {
                role: Some("Engineer".to_string()),
                employer: Some("Acme".to_string()),
                years: Some(4.0),
                start_date: Some("2020".to_string()),
                end_date: None,
            }],
            years_of_experience: 4,
            years_of_experience_excluding_internships: 4,
            date_notes: vec![],
            languages: vec![SkillEntry::new("English", 5)],
            hard_skills: vec![SkillEntry::new("Rust", 5)],
            soft_skills: vec![SkillEntry::new("Teamwork", 4)],
            tools: vec![SkillEntry::new("Docker", 4)],
        }
    }

    fn photo() -> Photo {
        Photo {
            mime_type: "image/jpeg".to_string(),
            width: 200,
            height: 200,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_complete_fields_have_no_notes() {
        let dossier = assemble(complete_fields(), Some(photo()));
        assert!(dossier.missing_information.is_empty());
        assert_eq!(dossier.candidate_name.as_deref(), Some("J. Doe"));
        assert_eq!(dossier.photo, Some(photo()));
        assert_eq!(dossier.years_of_experience, 4);
    }

    #[test]
    fn test_empty_fields_assemble_with_nulls_and_notes() {
        let dossier = assemble(NormalizedFields::default(), None);
        assert!(dossier.candidate_name.is_none());
        assert!(dossier.photo.is_none());
        assert_eq!(dossier.years_of_experience, 0);
        assert_eq!(dossier.missing_information.len(), 9);
        assert!(dossier
            .missing_information
            .contains(&"Photo candidat non trouvée".to_string()));
    }

    #[test]
    fn test_date_notes_follow_experience_note() {
        let mut fields = complete_fields();
        fields.experience.clear();
        fields.date_notes = vec!["Date fin < début (ignorée): Consultant".to_string()];
        let dossier = assemble(fields, Some(photo()));
        assert_eq!(
            dossier.missing_information,
            vec![
                "Aucune expérience détectée".to_string(),
                "Date fin < début (ignorée): Consultant".to_string(),
            ]
        );
    }

    #[test]
    fn test_internship_total_is_carried() {
        let mut fields = complete_fields();
        fields.years_of_experience_excluding_internships = 3;
        let dossier = assemble(fields, Some(photo()));
        assert_eq!(dossier.years_of_experience_excluding_internships, 3);
    }
}
