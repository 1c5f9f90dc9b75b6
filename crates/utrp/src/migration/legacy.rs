//! Reading the v1 `savedCourses` list.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A course as v1 stored it. Only the link survives migration; the rest of
/// the v1 record is re-scraped from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCourse {
    pub link: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SavedCourses {
    Wrapped {
        #[serde(rename = "savedCourses")]
        saved_courses: Vec<LegacyCourse>,
    },
    Bare(Vec<LegacyCourse>),
    /// `{}`, a v1 store that never saved anything
    Empty(EmptyStore),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyStore {}

/// Parses either `{"savedCourses": [...]}` or a bare array of `{ "link": ... }`.
///
/// An object without `savedCourses` is only accepted when it is empty.
pub fn parse_saved_courses(json: &str) -> Result<Vec<LegacyCourse>, serde_json::Error> {
    let parsed: SavedCourses = serde_json::from_str(json)?;
    Ok(match parsed {
        SavedCourses::Wrapped { saved_courses } => saved_courses,
        SavedCourses::Bare(courses) => courses,
        SavedCourses::Empty(_) => Vec::new(),
    })
}

pub fn load_saved_courses(path: &Path) -> Result<Vec<LegacyCourse>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_saved_courses(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_store() {
        let json = r#"{
            "savedCourses": [
                { "link": "https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/52625/",
                  "courseName": "DISCRETE MATH", "unique": 52625 },
                { "link": "https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/53790/" }
            ]
        }"#;
        let courses = parse_saved_courses(json).unwrap();
        assert_eq!(courses.len(), 2);
        assert!(courses[1].link.ends_with("/53790/"));
    }

    #[test]
    fn test_parse_bare_and_empty() {
        let courses = parse_saved_courses(r#"[{ "link": "https://example.test/1" }]"#).unwrap();
        assert_eq!(courses, vec![LegacyCourse { link: "https://example.test/1".into() }]);

        assert!(parse_saved_courses(r#"{ "savedCourses": [] }"#).unwrap().is_empty());
        assert!(parse_saved_courses("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_objects_without_saved_courses() {
        assert!(parse_saved_courses("{}").unwrap().is_empty());
        assert!(parse_saved_courses(r#"{ "courses": [{ "link": "https://example.test/1" }] }"#).is_err());
    }

    #[test]
    fn test_parse_rejects_records_without_link() {
        assert!(parse_saved_courses(r#"[{ "unique": 52625 }]"#).is_err());
    }
}
