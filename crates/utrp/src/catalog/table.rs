//! Row extraction for course schedule result tables.

use super::SiteSupport;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

// Static selectors for parsing - compiled once
static ROW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static DATA_CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static HEADER_CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static COURSE_HEADER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.course_header").unwrap());
static DETAILS_HEADER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#details h2").unwrap());
static ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span, li").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// The columns a section row can carry, keyed by the cell's `data-th` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnRole {
    Unique,
    Days,
    Hour,
    Room,
    InstructionMode,
    Instructor,
    Status,
    Flags,
    Core,
}

impl ColumnRole {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "unique" => Some(ColumnRole::Unique),
            "days" => Some(ColumnRole::Days),
            "hour" | "hours" => Some(ColumnRole::Hour),
            "room" => Some(ColumnRole::Room),
            "instruction mode" => Some(ColumnRole::InstructionMode),
            "instructor" | "instructors" => Some(ColumnRole::Instructor),
            "status" => Some(ColumnRole::Status),
            "flags" => Some(ColumnRole::Flags),
            "core" => Some(ColumnRole::Core),
            _ => None,
        }
    }
}

/// A single table cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// Whitespace-normalized text of the whole cell
    pub text: String,
    /// Text of each outermost `span`/`li` inside the cell, for multi-valued columns
    pub items: Vec<String>,
    /// First link target inside the cell
    pub href: Option<String>,
}

impl Cell {
    /// Items if the cell has any, otherwise the whole text as one value.
    pub fn values(&self) -> Vec<String> {
        if !self.items.is_empty() {
            self.items.clone()
        } else if self.text.is_empty() {
            Vec::new()
        } else {
            vec![self.text.clone()]
        }
    }
}

/// One section row of a results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// Index of the `<tr>` among all table rows in the document
    pub position: usize,
    /// Course header in effect for this row, e.g. "C S 311 DISCRETE MATH FOR COMPUTER SCI"
    pub header: Option<String>,
    pub cells: BTreeMap<ColumnRole, Cell>,
}

impl RowRecord {
    pub fn cell(&self, role: ColumnRole) -> Option<&Cell> {
        self.cells.get(&role)
    }

    /// Cell text, with empty cells treated as absent.
    pub fn text(&self, role: ColumnRole) -> Option<&str> {
        self.cell(role)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Extracts section rows from a catalog document.
///
/// Header rows, course-header rows and rows without any recognised column
/// are skipped. A document without a results table yields no rows.
pub fn extract_rows(document: &Html, support: SiteSupport) -> Vec<RowRecord> {
    let mut header = match support {
        SiteSupport::CourseCatalogDetails => document
            .select(&DETAILS_HEADER_SELECTOR)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty()),
        SiteSupport::CourseCatalogList => None,
    };

    let mut rows = Vec::new();

    for (position, tr) in document.select(&ROW_SELECTOR).enumerate() {
        if let Some(course_header) = tr.select(&COURSE_HEADER_SELECTOR).next() {
            let text = element_text(&course_header);
            debug!(position, header = %text, "Course header row");
            header = Some(text).filter(|t| !t.is_empty());
            continue;
        }

        let mut cells = BTreeMap::new();
        let mut data_cells = 0usize;
        for td in tr.select(&DATA_CELL_SELECTOR) {
            data_cells += 1;
            let Some(label) = td.value().attr("data-th") else {
                continue;
            };
            match ColumnRole::from_label(label) {
                Some(role) => {
                    cells.insert(role, parse_cell(&td));
                }
                None => debug!(position, label, "Ignoring unknown column"),
            }
        }

        if cells.is_empty() {
            if data_cells == 0 && tr.select(&HEADER_CELL_SELECTOR).next().is_some() {
                debug!(position, "Skipping table header row");
            } else {
                debug!(position, "Skipping non-data row");
            }
            continue;
        }

        rows.push(RowRecord {
            position,
            header: header.clone(),
            cells,
        });
    }

    debug!(rows = rows.len(), ?support, "Extracted catalog rows");
    rows
}

fn parse_cell(td: &ElementRef) -> Cell {
    let items = td
        .select(&ITEM_SELECTOR)
        .filter(|el| is_outermost_item(el, td))
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect();

    let href = td
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string());

    Cell {
        text: element_text(td),
        items,
        href,
    }
}

/// True unless `el` sits inside another item of the same cell, as a `span`
/// inside an `li` does.
fn is_outermost_item(el: &ElementRef, cell: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|ancestor| ancestor != cell)
        .all(|ancestor| !ITEM_SELECTOR.matches(&ancestor))
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    normalize_ws(&el.text().collect::<String>())
}

pub(crate) fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <table class="rwd-table results">
          <thead><tr><th>Unique</th><th>Days</th><th>Hour</th><th>Room</th></tr></thead>
          <tbody>
            <tr><td colspan="9" class="course_header"><h2>C S  311 DISCRETE MATH FOR COMPUTER SCI</h2></td></tr>
            <tr>
              <td data-th="Unique"><a href="/apps/registrar/course_schedule/20239/52625/">52625</a></td>
              <td data-th="Days"><span>MWF</span></td>
              <td data-th="Hour"><span>10:00 a.m.-11:00 a.m.</span></td>
              <td data-th="Room"><span>GDC 2.216</span></td>
              <td data-th="Mystery">??</td>
            </tr>
            <tr><td colspan="9" class="course_header"><h2>M 408C DIFFERENTIAL AND INTEGRAL CALCULUS</h2></td></tr>
            <tr>
              <td data-th="Unique"><a href="/apps/registrar/course_schedule/20239/53790/">53790</a></td>
              <td data-th="Days"><span>TTH</span><span>F</span></td>
            </tr>
            <tr><td colspan="9">Showing 2 results</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_extract_list_rows_carry_headers() {
        let document = Html::parse_document(RESULTS_PAGE);
        let rows = extract_rows(&document, SiteSupport::CourseCatalogList);

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].header.as_deref(),
            Some("C S 311 DISCRETE MATH FOR COMPUTER SCI")
        );
        assert_eq!(rows[0].text(ColumnRole::Unique), Some("52625"));
        assert_eq!(
            rows[0].cell(ColumnRole::Unique).unwrap().href.as_deref(),
            Some("/apps/registrar/course_schedule/20239/52625/")
        );
        assert_eq!(rows[0].cells.len(), 4);

        assert_eq!(
            rows[1].header.as_deref(),
            Some("M 408C DIFFERENTIAL AND INTEGRAL CALCULUS")
        );
        assert_eq!(
            rows[1].cell(ColumnRole::Days).unwrap().items,
            vec!["TTH".to_string(), "F".to_string()]
        );
        assert!(rows[1].cell(ColumnRole::Room).is_none());
    }

    #[test]
    fn test_extract_details_header() {
        let html = r#"
            <div id="details"><h2>C S 439 PRINCIPLES OF COMPUTER SYSTEMS</h2>
              <p>Operating systems and networking.</p></div>
            <table><tr><td data-th="Unique">52700</td><td data-th="Status">open</td></tr></table>
        "#;
        let document = Html::parse_document(html);
        let rows = extract_rows(&document, SiteSupport::CourseCatalogDetails);

        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].header.as_deref(),
            Some("C S 439 PRINCIPLES OF COMPUTER SYSTEMS")
        );
    }

    #[test]
    fn test_no_table_yields_no_rows() {
        let document = Html::parse_document("<html><body><p>Please log in.</p></body></html>");
        assert!(extract_rows(&document, SiteSupport::CourseCatalogList).is_empty());
        assert!(extract_rows(&document, SiteSupport::CourseCatalogDetails).is_empty());
    }

    #[test]
    fn test_nested_items_are_not_duplicated() {
        let html = r#"
            <div id="details"><h2>C S 311 DISCRETE MATH</h2></div>
            <table><tr>
              <td data-th="Unique">52625</td>
              <td data-th="Flags"><ul><li><span>QR</span></li><li><span>WR</span></li></ul></td>
              <td data-th="Instructor"><span><span>GHEITH, AHMED</span></span></td>
            </tr></table>
        "#;
        let document = Html::parse_document(html);
        let rows = extract_rows(&document, SiteSupport::CourseCatalogDetails);

        assert_eq!(
            rows[0].cell(ColumnRole::Flags).unwrap().items,
            vec!["QR".to_string(), "WR".to_string()]
        );
        assert_eq!(
            rows[0].cell(ColumnRole::Instructor).unwrap().items,
            vec!["GHEITH, AHMED".to_string()]
        );
    }

    #[test]
    fn test_unknown_columns_ignored_on_both_variants() {
        let html = r#"
            <div id="details"><h2>C S 311 DISCRETE MATH</h2></div>
            <table><tr>
              <td data-th="Unique">52625</td><td data-th="Add">+</td><td data-th="Status">open</td>
            </tr></table>
        "#;
        let document = Html::parse_document(html);
        for support in [SiteSupport::CourseCatalogList, SiteSupport::CourseCatalogDetails] {
            let rows = extract_rows(&document, support);
            assert_eq!(rows.len(), 1);
            assert_eq!(
                rows[0].cells.keys().copied().collect::<Vec<_>>(),
                vec![ColumnRole::Unique, ColumnRole::Status]
            );
        }
    }

    #[test]
    fn test_column_labels() {
        assert_eq!(ColumnRole::from_label(" Instruction Mode "), Some(ColumnRole::InstructionMode));
        assert_eq!(ColumnRole::from_label("Add"), None);
    }
}
