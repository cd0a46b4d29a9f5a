//! Keyword-based skill extraction from job postings.

use std::collections::HashMap;
use std::sync::LazyLock;

use lmi_core::{Cell, Table, SKILL_COLUMN};
use regex::Regex;

/// Skills recognised in posting text, matched case-insensitively on word
/// boundaries.
const COMMON_SKILLS: &[&str] = &[
    // Languages and platforms
    "python",
    "java",
    "javascript",
    "typescript",
    "golang",
    "rust",
    "sql",
    "nosql",
    "r programming",
    "aws",
    "azure",
    "gcp",
    "docker",
    "kubernetes",
    "terraform",
    "linux",
    "git",
    "react",
    "angular",
    "vue",
    "node.js",
    "django",
    "flask",
    "spark",
    "hadoop",
    "snowflake",
    // Data
    "machine learning",
    "deep learning",
    "data science",
    "data analysis",
    "data visualization",
    "statistics",
    "excel",
    "tableau",
    "power bi",
    "etl",
    // Business systems
    "salesforce",
    "sap",
    "oracle",
    "erp",
    "crm",
    // Professional
    "communication",
    "leadership",
    "project management",
    "problem solving",
    "teamwork",
    "analytical",
    "critical thinking",
    "time management",
    "customer service",
    // Certifications and methods
    "pmp",
    "cpa",
    "cissp",
    "aws certified",
    "azure certified",
    "six sigma",
    "scrum",
    "agile",
    "itil",
];

static SKILL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    COMMON_SKILLS
        .iter()
        .map(|skill| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(skill));
            let re = Regex::new(&pattern).expect("escaped skill pattern is valid regex");
            (*skill, re)
        })
        .collect()
});

/// Vocabulary skills mentioned in `text`, in vocabulary order.
pub(crate) fn extract_skills(text: &str) -> Vec<&'static str> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    SKILL_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(skill, _)| *skill)
        .collect()
}

/// Upper-cases the first letter of every whitespace-separated word.
pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Frequency table of `mentions` across `total_jobs` postings.
///
/// Sorted by frequency descending, ties broken alphabetically.
pub(crate) fn skills_summary(mentions: &[&'static str], total_jobs: usize) -> Table {
    let mut table = Table::new([SKILL_COLUMN, "frequency", "percentage"]);
    if mentions.is_empty() || total_jobs == 0 {
        return table;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for skill in mentions {
        *counts.entry(skill).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    for (skill, count) in ranked {
        #[allow(clippy::cast_precision_loss)]
        let pct = count as f64 / total_jobs as f64 * 100.0;
        table.push_row(vec![
            Cell::from(title_case(skill)),
            Cell::from(i64::try_from(count).unwrap_or(i64::MAX)),
            Cell::from(format!("{pct:.1}%")),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_skills_matches_whole_words_only() {
        let text = "Senior Python developer with SQL and AWS; JavaScript a plus.";
        let skills = extract_skills(text);
        assert!(skills.contains(&"python"));
        assert!(skills.contains(&"sql"));
        assert!(skills.contains(&"aws"));
        assert!(skills.contains(&"javascript"));
        assert!(!skills.contains(&"java"), "java must not match inside javascript");
    }

    #[test]
    fn extract_skills_handles_multi_word_and_dotted_terms() {
        let skills = extract_skills("Experience in machine learning and Node.js services");
        assert!(skills.contains(&"machine learning"));
        assert!(skills.contains(&"node.js"));
    }

    #[test]
    fn extract_skills_empty_text() {
        assert!(extract_skills("   ").is_empty());
    }

    #[test]
    fn title_case_capitalises_each_word() {
        assert_eq!(title_case("power bi"), "Power Bi");
        assert_eq!(title_case("sql"), "Sql");
    }

    #[test]
    fn skills_summary_sorts_by_frequency_then_name() {
        let mentions = ["sql", "python", "python", "aws", "sql", "python"];
        let table = skills_summary(&mentions, 4);
        assert_eq!(table.text_column(SKILL_COLUMN), vec!["Python", "Sql", "Aws"]);
        assert_eq!(table.rows[0][1], Cell::Integer(3));
        assert_eq!(table.rows[0][2], Cell::from("75.0%"));
    }

    #[test]
    fn skills_summary_empty_without_jobs() {
        assert!(skills_summary(&["sql"], 0).is_empty());
    }
}
