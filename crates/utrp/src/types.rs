/// Types for courses and schedules
use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static SEMESTER_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/course_schedule/(\d{4})(\d)(?:/|$)").unwrap());

/// Deterministic identity of a course section.
///
/// Built only from fields every catalog row carries (department, course
/// number, unique number) plus the semester when the link encodes one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    pub fn derive(department: &str, number: &str, section: &str, semester: Option<&Semester>) -> Self {
        let dept: String = department
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        let number = number.trim().to_uppercase();
        let section = section.trim();

        match semester {
            Some(sem) => Self(format!("{}:{}{}:{}", sem.code(), dept, number, section)),
            None => Self(format!("{}{}:{}", dept, number, section)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
}

impl Season {
    fn digit(self) -> u8 {
        match self {
            Season::Spring => 2,
            Season::Summer => 6,
            Season::Fall => 9,
        }
    }
}

/// A catalog semester, e.g. Fall 2023 (code `20239`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semester {
    pub year: u16,
    pub season: Season,
}

impl Semester {
    /// Parses a five-digit semester code (`YYYYS`).
    pub fn from_code(code: &str) -> Option<Self> {
        if code.len() != 5 || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let year = code[..4].parse().ok()?;
        let season = match &code[4..] {
            "2" => Season::Spring,
            "6" => Season::Summer,
            "9" => Season::Fall,
            _ => return None,
        };
        Some(Self { year, season })
    }

    /// Extracts the semester from a catalog link such as
    /// `https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/52625/`.
    pub fn from_link(link: &str) -> Option<Self> {
        let caps = SEMESTER_CODE_REGEX.captures(link)?;
        let code = format!("{}{}", caps.get(1)?.as_str(), caps.get(2)?.as_str());
        Self::from_code(&code)
    }

    pub fn code(&self) -> String {
        format!("{:04}{}", self.year, self.season.digit())
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.season, self.year)
    }
}

/// Enrollment status of a section as shown by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Open,
    Closed,
    Waitlisted,
    Cancelled,
    Unknown(String),
}

impl Status {
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.starts_with("open") {
            Status::Open
        } else if lower.starts_with("closed") {
            Status::Closed
        } else if lower.contains("waitlist") {
            Status::Waitlisted
        } else if lower.starts_with("cancel") {
            Status::Cancelled
        } else {
            Status::Unknown(text.trim().to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionMode {
    InPerson,
    Online,
    Hybrid,
    Unknown(String),
}

impl InstructionMode {
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.contains("hybrid") || lower.contains("blended") {
            InstructionMode::Hybrid
        } else if lower.contains("internet") || lower.contains("online") || lower.contains("web") {
            InstructionMode::Online
        } else if lower.contains("face-to-face") || lower.contains("in person") {
            InstructionMode::InPerson
        } else {
            InstructionMode::Unknown(text.trim().to_string())
        }
    }
}

/// One meeting of a section ("MWF", "10:00 a.m.-11:00 a.m.", "GDC 2.216")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub days: String,
    pub hours: String,
    pub location: Option<String>,
}

/// One catalog course section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub unique_id: CourseId,
    /// Catalog page this course was scraped from
    pub link: String,
    /// e.g. "C S 311 DISCRETE MATH FOR COMPUTER SCI"
    pub full_name: String,
    pub course_name: String,
    pub department: String,
    pub number: String,
    /// The catalog's unique number for this section
    pub section: String,
    pub semester: Option<Semester>,
    pub instructors: Vec<String>,
    pub status: Status,
    pub instruction_mode: InstructionMode,
    pub schedule: Vec<Meeting>,
    pub flags: Vec<String>,
    pub core: Vec<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Identifier of a schedule, unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(String);

impl ScheduleId {
    pub(crate) fn generate() -> Self {
        Self(generate_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a named schedule and its courses.
///
/// Snapshots are detached copies; mutation goes through
/// [`crate::store::ScheduleStore`] by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub courses: Vec<Course>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn contains(&self, unique_id: &CourseId) -> bool {
        self.courses.iter().any(|c| &c.unique_id == unique_id)
    }
}

/// Timestamp + random suffix, also used for migration run ids.
pub(crate) fn generate_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
