/// Interprets extracted catalog rows into typed courses
use super::table::{element_text, ColumnRole, RowRecord};
use super::SiteSupport;
use crate::error::AmbiguousResult;
use crate::types::{Course, CourseId, InstructionMode, Meeting, Semester, Status};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

static COURSE_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z ]*?)\s+(\d+[A-Z]*)\b\s*(.*)$").unwrap());
static SECTION_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3,6}\b").unwrap());
static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#details p").unwrap());

/// Why a row did not become a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnresolvedReason {
    /// No course header precedes the row
    MissingHeader,
    /// A column needed for identity is absent or empty
    MissingField(ColumnRole),
    /// A field is present but does not have the expected shape
    Malformed(String),
    /// The row names more than one section
    Ambiguous { candidates: usize },
}

/// Result of scraping one row.
#[derive(Debug, Clone, Serialize)]
pub enum ScrapedRow {
    Resolved(Course),
    Unresolved {
        position: usize,
        reason: UnresolvedReason,
    },
}

impl ScrapedRow {
    pub fn course(&self) -> Option<&Course> {
        match self {
            ScrapedRow::Resolved(course) => Some(course),
            ScrapedRow::Unresolved { .. } => None,
        }
    }

    pub fn into_course(self) -> Option<Course> {
        match self {
            ScrapedRow::Resolved(course) => Some(course),
            ScrapedRow::Unresolved { .. } => None,
        }
    }
}

/// Collects the resolved courses out of a scrape, dropping unresolved rows.
pub fn resolved_courses(rows: Vec<ScrapedRow>) -> Vec<Course> {
    rows.into_iter().filter_map(ScrapedRow::into_course).collect()
}

/// The parts of a course header: department, number, title.
struct CourseHeader<'h> {
    department: &'h str,
    number: &'h str,
    title: &'h str,
}

fn parse_course_header(header: &str) -> Option<CourseHeader<'_>> {
    let caps = COURSE_HEADER_REGEX.captures(header.trim())?;
    Some(CourseHeader {
        department: caps.get(1)?.as_str().trim(),
        number: caps.get(2)?.as_str(),
        title: caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default(),
    })
}

/// Scrapes courses out of one catalog document.
pub struct CourseCatalogScraper<'a> {
    support: SiteSupport,
    document: &'a Html,
    link: String,
    base: Option<Url>,
}

impl<'a> CourseCatalogScraper<'a> {
    pub fn new(support: SiteSupport, document: &'a Html, link: impl Into<String>) -> Self {
        let link = link.into();
        let base = Url::parse(&link).ok();
        Self {
            support,
            document,
            link,
            base,
        }
    }

    /// Scrapes every row, producing exactly one entry per row in input order.
    ///
    /// With `include_ambiguous` false, rows listing several section numbers
    /// are reported as [`UnresolvedReason::Ambiguous`]; with true, the first
    /// listed section is used.
    pub fn scrape(&self, rows: &[RowRecord], include_ambiguous: bool) -> Vec<ScrapedRow> {
        let scraped_at = Utc::now();

        rows.iter()
            .map(|row| match self.scrape_row(row, include_ambiguous, scraped_at) {
                Ok(course) => ScrapedRow::Resolved(course),
                Err(reason) => {
                    debug!(position = row.position, ?reason, link = %self.link, "Row unresolved");
                    ScrapedRow::Unresolved {
                        position: row.position,
                        reason,
                    }
                }
            })
            .collect()
    }

    fn scrape_row(
        &self,
        row: &RowRecord,
        include_ambiguous: bool,
        scraped_at: DateTime<Utc>,
    ) -> Result<Course, UnresolvedReason> {
        let full_name = row.header.as_deref().ok_or(UnresolvedReason::MissingHeader)?;
        let header = parse_course_header(full_name).ok_or_else(|| {
            UnresolvedReason::Malformed(format!("unrecognised course header '{full_name}'"))
        })?;

        let unique_text = row
            .text(ColumnRole::Unique)
            .ok_or(UnresolvedReason::MissingField(ColumnRole::Unique))?;
        let sections: Vec<&str> = SECTION_NUMBER_REGEX
            .find_iter(unique_text)
            .map(|m| m.as_str())
            .collect();
        let section = match sections.as_slice() {
            [] => {
                return Err(UnresolvedReason::Malformed(format!(
                    "no section number in '{unique_text}'"
                )))
            }
            [only] => *only,
            [first, ..] if include_ambiguous => {
                warn!(
                    link = %self.link,
                    candidates = sections.len(),
                    "Row lists several sections, taking the first"
                );
                *first
            }
            _ => {
                return Err(UnresolvedReason::Ambiguous {
                    candidates: sections.len(),
                })
            }
        };

        let link = self.course_link(row);
        let semester = Semester::from_link(&link).or_else(|| Semester::from_link(&self.link));
        let unique_id = CourseId::derive(header.department, header.number, section, semester.as_ref());

        let values = |role| row.cell(role).map(|c| c.values()).unwrap_or_default();

        Ok(Course {
            unique_id,
            link,
            full_name: full_name.to_string(),
            course_name: header.title.to_string(),
            department: header.department.to_string(),
            number: header.number.to_string(),
            section: section.to_string(),
            semester,
            instructors: values(ColumnRole::Instructor),
            status: row
                .text(ColumnRole::Status)
                .map(Status::parse)
                .unwrap_or_else(|| Status::Unknown(String::new())),
            instruction_mode: row
                .text(ColumnRole::InstructionMode)
                .map(InstructionMode::parse)
                .unwrap_or_else(|| InstructionMode::Unknown(String::new())),
            schedule: meetings(row),
            flags: values(ColumnRole::Flags),
            core: values(ColumnRole::Core),
            description: None,
            scraped_at,
        })
    }

    /// The page that identifies this course on its own.
    ///
    /// On a details page that is the page itself; result rows link to their
    /// details page from the unique number.
    fn course_link(&self, row: &RowRecord) -> String {
        if self.support == SiteSupport::CourseCatalogDetails {
            return self.link.clone();
        }

        row.cell(ColumnRole::Unique)
            .and_then(|c| c.href.as_deref())
            .and_then(|href| match &self.base {
                Some(base) => base.join(href).ok().map(String::from),
                None => Url::parse(href).ok().map(String::from),
            })
            .unwrap_or_else(|| self.link.clone())
    }

    /// Returns the course description of the document.
    ///
    /// A page's description only describes its course when the page produced
    /// exactly one course, so anything else is rejected.
    pub fn description(&self, courses: &[Course]) -> Result<Option<String>, AmbiguousResult> {
        if courses.len() != 1 {
            return Err(AmbiguousResult {
                found: courses.len(),
            });
        }

        let paragraphs: Vec<String> = self
            .document
            .select(&DESCRIPTION_SELECTOR)
            .map(|p| element_text(&p))
            .filter(|t| !t.is_empty())
            .collect();

        if paragraphs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(paragraphs.join("\n")))
        }
    }
}

/// Zips the Days/Hour/Room columns into meetings; one span per meeting.
fn meetings(row: &RowRecord) -> Vec<Meeting> {
    let days = row.cell(ColumnRole::Days).map(|c| c.values()).unwrap_or_default();
    let hours = row.cell(ColumnRole::Hour).map(|c| c.values()).unwrap_or_default();
    let rooms = row.cell(ColumnRole::Room).map(|c| c.values()).unwrap_or_default();

    let count = days.len().max(hours.len()).max(rooms.len());
    (0..count)
        .map(|i| Meeting {
            days: days.get(i).cloned().unwrap_or_default(),
            hours: hours.get(i).cloned().unwrap_or_default(),
            location: rooms.get(i).cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::table::{extract_rows, Cell};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    const DETAILS_LINK: &str =
        "https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/52625/";
    const RESULTS_LINK: &str =
        "https://utdirect.utexas.edu/apps/registrar/course_schedule/20239/results/?fos_fl=C+S";

    const DETAILS_PAGE: &str = r#"
        <html><body>
        <div id="details">
          <h2>C S 311 DISCRETE MATH FOR COMPUTER SCI</h2>
          <p>Mathematical logic, proof techniques, and combinatorics.</p>
          <p>  Three lecture hours a week for one semester. </p>
        </div>
        <table>
          <tr><th>Unique</th><th>Days</th><th>Hour</th><th>Room</th><th>Instruction Mode</th>
              <th>Instructor</th><th>Status</th><th>Flags</th><th>Core</th></tr>
          <tr>
            <td data-th="Unique">52625</td>
            <td data-th="Days"><span>MWF</span><span>W</span></td>
            <td data-th="Hour"><span>10:00 a.m.-11:00 a.m.</span><span>5:00 p.m.-6:00 p.m.</span></td>
            <td data-th="Room"><span>GDC 2.216</span><span>GDC 1.304</span></td>
            <td data-th="Instruction Mode">Face-to-face</td>
            <td data-th="Instructor"><span>GHEITH, AHMED</span></td>
            <td data-th="Status">open</td>
            <td data-th="Flags"><ul><li>Quantitative Reasoning</li></ul></td>
            <td data-th="Core"></td>
          </tr>
        </table>
        </body></html>
    "#;

    fn scrape_page(html: &str, support: SiteSupport, link: &str, include: bool) -> Vec<ScrapedRow> {
        let document = Html::parse_document(html);
        let rows = extract_rows(&document, support);
        CourseCatalogScraper::new(support, &document, link).scrape(&rows, include)
    }

    #[test]
    fn test_scrape_details_page() {
        let results = scrape_page(DETAILS_PAGE, SiteSupport::CourseCatalogDetails, DETAILS_LINK, false);
        assert_eq!(results.len(), 1);

        let course = results[0].course().unwrap();
        assert_eq!(course.unique_id.as_str(), "20239:CS311:52625");
        assert_eq!(course.department, "C S");
        assert_eq!(course.number, "311");
        assert_eq!(course.course_name, "DISCRETE MATH FOR COMPUTER SCI");
        assert_eq!(course.link, DETAILS_LINK);
        assert_eq!(course.status, Status::Open);
        assert_eq!(course.instruction_mode, InstructionMode::InPerson);
        assert_eq!(course.instructors, vec!["GHEITH, AHMED".to_string()]);
        assert_eq!(course.flags, vec!["Quantitative Reasoning".to_string()]);
        assert!(course.core.is_empty());
        assert_eq!(course.schedule.len(), 2);
        assert_eq!(course.schedule[1].days, "W");
        assert_eq!(course.schedule[1].location.as_deref(), Some("GDC 1.304"));
        assert!(course.description.is_none());
    }

    #[test]
    fn test_scraping_twice_gives_equal_ids() {
        let first = scrape_page(DETAILS_PAGE, SiteSupport::CourseCatalogDetails, DETAILS_LINK, false);
        let second = scrape_page(DETAILS_PAGE, SiteSupport::CourseCatalogDetails, DETAILS_LINK, false);

        assert_eq!(
            first[0].course().unwrap().unique_id,
            second[0].course().unwrap().unique_id
        );
    }

    #[test]
    fn test_description_requires_single_course() {
        let document = Html::parse_document(DETAILS_PAGE);
        let rows = extract_rows(&document, SiteSupport::CourseCatalogDetails);
        let scraper = CourseCatalogScraper::new(SiteSupport::CourseCatalogDetails, &document, DETAILS_LINK);
        let courses = resolved_courses(scraper.scrape(&rows, false));

        let description = scraper.description(&courses).unwrap().unwrap();
        assert_eq!(
            description,
            "Mathematical logic, proof techniques, and combinatorics.\nThree lecture hours a week for one semester."
        );

        assert_eq!(scraper.description(&[]), Err(AmbiguousResult { found: 0 }));
        let two = vec![courses[0].clone(), courses[0].clone()];
        assert_eq!(scraper.description(&two), Err(AmbiguousResult { found: 2 }));
    }

    #[test]
    fn test_one_result_per_row_in_order() {
        let html = r#"
            <table>
              <tr><td data-th="Unique">11111</td></tr>
              <tr><td class="course_header"><h2>M 408C CALCULUS</h2></td></tr>
              <tr><td data-th="Unique"><a href="/apps/registrar/course_schedule/20242/53790/">53790</a></td></tr>
              <tr><td data-th="Unique"></td><td data-th="Days">MWF</td></tr>
              <tr><td data-th="Unique">53800 / 53805</td></tr>
              <tr><td data-th="Unique">TBA</td></tr>
              <tr><td class="course_header"><h2>lowercase header</h2></td></tr>
              <tr><td data-th="Unique">53900</td></tr>
            </table>
        "#;
        let results = scrape_page(html, SiteSupport::CourseCatalogList, RESULTS_LINK, false);
        assert_eq!(results.len(), 6);

        assert!(matches!(
            results[0],
            ScrapedRow::Unresolved { reason: UnresolvedReason::MissingHeader, .. }
        ));

        let calc = results[1].course().unwrap();
        assert_eq!(calc.unique_id.as_str(), "20242:M408C:53790");
        assert_eq!(
            calc.link,
            "https://utdirect.utexas.edu/apps/registrar/course_schedule/20242/53790/"
        );

        assert!(matches!(
            results[2],
            ScrapedRow::Unresolved {
                reason: UnresolvedReason::MissingField(ColumnRole::Unique),
                ..
            }
        ));
        assert!(matches!(
            results[3],
            ScrapedRow::Unresolved {
                reason: UnresolvedReason::Ambiguous { candidates: 2 },
                ..
            }
        ));
        assert!(matches!(
            results[4],
            ScrapedRow::Unresolved { reason: UnresolvedReason::Malformed(_), .. }
        ));
        assert!(matches!(
            results[5],
            ScrapedRow::Unresolved { reason: UnresolvedReason::Malformed(_), .. }
        ));
    }

    #[test]
    fn test_include_ambiguous_takes_first_section() {
        let html = r#"
            <table>
              <tr><td class="course_header"><h2>C S 429 COMP ORGANIZATN AND ARCH</h2></td></tr>
              <tr><td data-th="Unique">52400 / 52405</td></tr>
            </table>
        "#;
        let results = scrape_page(html, SiteSupport::CourseCatalogList, RESULTS_LINK, true);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].course().unwrap().section, "52400");
    }

    #[test]
    fn test_cs311_section_001_identity() {
        let html = r#"
            <div id="details"><h2>CS 311 DISCRETE MATH</h2></div>
            <table><tr><td data-th="Unique">001</td></tr></table>
        "#;
        let results = scrape_page(html, SiteSupport::CourseCatalogDetails, DETAILS_LINK, false);
        let course = results[0].course().unwrap();
        assert_eq!(course.unique_id.as_str(), "20239:CS311:001");
    }

    fn text_cell(text: String) -> Cell {
        Cell {
            text,
            ..Cell::default()
        }
    }

    /// (header, unique text, days text) for one generated row
    fn row_parts() -> impl Strategy<Value = (Option<String>, Option<String>, Option<String>)> {
        (
            prop::option::of(prop_oneof![
                Just("C S 311 DISCRETE MATH FOR COMPUTER SCI".to_string()),
                "[A-Z ]{0,6}[0-9]{0,3}[A-Za-z ]{0,12}",
            ]),
            prop::option::of("[0-9A-Z /]{0,20}"),
            prop::option::of("[MTWFH]{0,4}"),
        )
    }

    proptest! {
        #[test]
        fn test_scrape_keeps_one_entry_per_row(
            parts in prop::collection::vec(row_parts(), 0..24),
            gaps in prop::collection::vec(1usize..4, 24),
            include_ambiguous in any::<bool>(),
        ) {
            let mut position = 0;
            let rows: Vec<RowRecord> = parts
                .into_iter()
                .zip(gaps)
                .map(|((header, unique, days), gap)| {
                    position += gap;
                    let mut cells = BTreeMap::new();
                    if let Some(text) = unique {
                        cells.insert(ColumnRole::Unique, text_cell(text));
                    }
                    if let Some(text) = days {
                        cells.insert(ColumnRole::Days, text_cell(text));
                    }
                    RowRecord { position, header, cells }
                })
                .collect();

            let document = Html::parse_document("<html></html>");
            let scraper = CourseCatalogScraper::new(SiteSupport::CourseCatalogList, &document, RESULTS_LINK);
            let results = scraper.scrape(&rows, include_ambiguous);

            prop_assert_eq!(results.len(), rows.len());
            for (row, result) in rows.iter().zip(&results) {
                match result {
                    ScrapedRow::Unresolved { position, .. } => {
                        prop_assert_eq!(*position, row.position);
                    }
                    ScrapedRow::Resolved(course) => {
                        prop_assert_eq!(row.header.as_deref(), Some(course.full_name.as_str()));
                        let unique = row.text(ColumnRole::Unique).unwrap_or_default();
                        prop_assert!(unique.contains(course.section.as_str()));
                    }
                }
            }
        }
    }
}
