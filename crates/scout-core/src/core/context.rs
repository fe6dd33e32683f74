//! Prompt assembly.
//!
//! The model sees, in order: the asking user's own profile (if known), the
//! profile being viewed (if any), then the question itself.

use std::fmt::Write;

use crate::profile::{Profile, UserProfile};

const MAX_EXPERIENCE: usize = 5;
const MAX_EDUCATION: usize = 3;
const MAX_SKILLS: usize = 10;
const MAX_CERTIFICATIONS: usize = 5;

const NOT_AVAILABLE: &str = "Not available";

pub const CLOSING_INSTRUCTION: &str = "Provide a helpful, professional response. Use the information about the user asking (your profile) to give personalized advice and context-aware suggestions.";

/// Builds the text sent as the single user turn.
pub fn build_prompt(
    user_profile: Option<&UserProfile>,
    viewed: Option<&Profile>,
    question: &str,
) -> String {
    let mut out = String::new();

    if let Some(user) = user_profile {
        write_user_profile(&mut out, user);
    }

    let Some(viewed) = viewed else {
        out.push_str(question);
        return out;
    };

    out.push_str("=== PROFILE BEING VIEWED ===\n");
    let _ = writeln!(out, "Name: {}", viewed.name);
    let _ = writeln!(out, "Headline: {}", or_not_available(&viewed.headline));
    let _ = writeln!(out, "Location: {}", or_not_available(&viewed.location));
    if !viewed.about.is_empty() {
        let _ = writeln!(out, "About: {}", viewed.about);
    }

    let _ = write!(out, "\n=== USER QUESTION ===\n{question}\n\n");
    out.push_str(CLOSING_INSTRUCTION);
    out
}

fn or_not_available(value: &str) -> &str {
    if value.is_empty() { NOT_AVAILABLE } else { value }
}

fn write_user_profile(out: &mut String, user: &UserProfile) {
    out.push_str("=== YOUR PROFILE (Person asking this question) ===\n");
    let name = if user.name.is_empty() {
        "User"
    } else {
        &user.name
    };
    let _ = writeln!(out, "Name: {name}");
    if !user.headline.is_empty() {
        let _ = writeln!(out, "Headline: {}", user.headline);
    }
    if !user.location.is_empty() {
        let _ = writeln!(out, "Location: {}", user.location);
    }
    if !user.about.is_empty() {
        let _ = writeln!(out, "\nAbout: {}", user.about);
    }

    if !user.experience.is_empty() {
        out.push_str("\nExperience:\n");
        for exp in user.experience.iter().take(MAX_EXPERIENCE) {
            let _ = write!(out, "- {}", exp.title);
            if !exp.company.is_empty() {
                let _ = write!(out, " at {}", exp.company);
            }
            if !exp.duration.is_empty() {
                let _ = write!(out, " ({})", exp.duration);
            }
            out.push('\n');
        }
    }

    if !user.education.is_empty() {
        out.push_str("\nEducation:\n");
        for edu in user.education.iter().take(MAX_EDUCATION) {
            let _ = write!(out, "- {}", edu.school);
            if !edu.degree.is_empty() {
                let _ = write!(out, ": {}", edu.degree);
            }
            out.push('\n');
        }
    }

    if !user.skills.is_empty() {
        let top: Vec<&str> = user
            .skills
            .iter()
            .take(MAX_SKILLS)
            .map(String::as_str)
            .collect();
        let _ = writeln!(out, "\nTop Skills: {}", top.join(", "));
    }

    if !user.certifications.is_empty() {
        let certs: Vec<&str> = user
            .certifications
            .iter()
            .take(MAX_CERTIFICATIONS)
            .map(String::as_str)
            .collect();
        let _ = writeln!(out, "\nCertifications: {}", certs.join(", "));
    }

    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Education, Experience};

    fn viewed() -> Profile {
        Profile {
            name: "Jane Doe".to_string(),
            headline: "Staff Engineer".to_string(),
            url: "https://example.com/in/jane".to_string(),
            ..Profile::default()
        }
    }

    #[test]
    fn test_question_only() {
        assert_eq!(build_prompt(None, None, "Hi there"), "Hi there");
    }

    #[test]
    fn test_viewed_profile_block() {
        let prompt = build_prompt(None, Some(&viewed()), "What does she do?");
        assert_eq!(
            prompt,
            format!(
                "=== PROFILE BEING VIEWED ===\nName: Jane Doe\nHeadline: Staff Engineer\nLocation: Not available\n\n=== USER QUESTION ===\nWhat does she do?\n\n{CLOSING_INSTRUCTION}"
            )
        );
    }

    #[test]
    fn test_viewed_profile_about_is_included() {
        let profile = Profile {
            about: "Builds compilers.".to_string(),
            ..viewed()
        };
        let prompt = build_prompt(None, Some(&profile), "q");
        assert!(prompt.contains("Location: Not available\nAbout: Builds compilers.\n\n=== USER QUESTION ==="));
    }

    #[test]
    fn test_user_profile_block_limits_lists() {
        let user = UserProfile {
            headline: "Student".to_string(),
            experience: (0..7)
                .map(|i| Experience {
                    title: format!("Role {i}"),
                    company: if i == 0 { "Acme".to_string() } else { String::new() },
                    duration: if i == 0 { "2 yrs".to_string() } else { String::new() },
                })
                .collect(),
            education: vec![
                Education {
                    school: "State U".to_string(),
                    degree: "BSc".to_string(),
                },
                Education {
                    school: "Night School".to_string(),
                    degree: String::new(),
                },
            ],
            skills: (0..12).map(|i| format!("s{i}")).collect(),
            certifications: vec!["AWS".to_string()],
            ..UserProfile::default()
        };

        let prompt = build_prompt(Some(&user), None, "Should I connect?");
        let expected = "=== YOUR PROFILE (Person asking this question) ===\n\
            Name: User\n\
            Headline: Student\n\
            \nExperience:\n\
            - Role 0 at Acme (2 yrs)\n\
            - Role 1\n\
            - Role 2\n\
            - Role 3\n\
            - Role 4\n\
            \nEducation:\n\
            - State U: BSc\n\
            - Night School\n\
            \nTop Skills: s0, s1, s2, s3, s4, s5, s6, s7, s8, s9\n\
            \nCertifications: AWS\n\
            \nShould I connect?";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_both_profiles_in_order() {
        let user = UserProfile {
            name: "Sam".to_string(),
            ..UserProfile::default()
        };
        let prompt = build_prompt(Some(&user), Some(&viewed()), "q");
        let mine = prompt.find("=== YOUR PROFILE").unwrap();
        let theirs = prompt.find("=== PROFILE BEING VIEWED").unwrap();
        let question = prompt.find("=== USER QUESTION").unwrap();
        assert!(mine < theirs && theirs < question);
        assert!(prompt.starts_with("=== YOUR PROFILE (Person asking this question) ===\nName: Sam\n\n"));
    }
}
