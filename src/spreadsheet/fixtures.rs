//! Test documents: small ODS packages built in memory and an in-memory spreadsheet.

use crate::error::RosterSyncError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::SpreadsheetMut;
use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

pub(crate) const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

pub(crate) const MANIFEST: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.3">"#,
    r#"<manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>"#,
    r#"<manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>"#,
    r#"<manifest:file-entry manifest:full-path="styles.xml" manifest:media-type="text/xml"/>"#,
    r#"</manifest:manifest>"#,
);

pub(crate) const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<office:document-styles xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" office:version="1.3">"#,
    r#"<office:styles/></office:document-styles>"#,
);

/// Zip with the given entries, the first one stored and the rest deflated.
pub(crate) fn zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, (name, content)) in entries.iter().enumerate() {
        let method = if index == 0 { CompressionMethod::Stored } else { CompressionMethod::Deflated };
        writer
            .start_file(*name, SimpleFileOptions::default().compression_method(method))
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Full `content.xml` around the given `office:spreadsheet` body.
pub(crate) fn content(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
            r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
            r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
            r#"xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0" office:version="1.3">"#,
            r#"<office:body><office:spreadsheet>{}</office:spreadsheet></office:body></office:document-content>"#,
        ),
        body
    )
}

/// ODS package whose content holds the given spreadsheet body.
pub(crate) fn package(body: &str) -> Vec<u8> {
    zip(&[
        ("mimetype", MIME_TYPE),
        ("META-INF/manifest.xml", MANIFEST),
        ("styles.xml", STYLES),
        ("content.xml", &content(body)),
    ])
}

/// Tables of plain string cells, each row padded with the usual trailing filler cell.
pub(crate) fn sheets(sheets: &[(&str, &[&[&str]])]) -> String {
    let mut body = String::new();
    for (name, rows) in sheets {
        body.push_str(&format!(r#"<table:table table:name="{}">"#, name));
        for row in rows.iter() {
            body.push_str("<table:table-row>");
            for text in row.iter() {
                if text.is_empty() {
                    body.push_str("<table:table-cell/>");
                } else {
                    body.push_str(&format!(
                        r#"<table:table-cell office:value-type="string" calcext:value-type="string"><text:p>{}</text:p></table:table-cell>"#,
                        text.replace('&', "&amp;").replace('<', "&lt;")
                    ));
                }
            }
            body.push_str(r#"<table:table-cell table:number-columns-repeated="1000"/></table:table-row>"#);
        }
        body.push_str("</table:table>");
    }
    body
}

/// In-memory document that records writes on its snapshot and can be told to refuse some cells.
pub(crate) struct MemorySpreadsheet {
    sheets: Vec<Sheet>,
    failing: Vec<(usize, usize, usize)>,
    pub(crate) saved: Vec<PathBuf>,
}

impl MemorySpreadsheet {
    pub(crate) fn new(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            failing: Vec::new(),
            saved: Vec::new(),
        }
    }

    /// Makes writes to (sheet, row, col) fail.
    pub(crate) fn fail_on(&mut self, sheet: usize, row: usize, col: usize) {
        self.failing.push((sheet, row, col));
    }
}

impl Spreadsheet for MemorySpreadsheet {
    fn name(&self) -> &str {
        "memory"
    }

    fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

impl SpreadsheetMut for MemorySpreadsheet {
    fn set_cell_text(&mut self, sheet: usize, row: usize, col: usize, text: &str) -> Result<(), SpreadsheetError> {
        let name = self.sheets
            .get(sheet)
            .map(|sheet| sheet.name.to_owned())
            .ok_or(SpreadsheetError::SheetIndexError(sheet))?;
        if self.failing.contains(&(sheet, row, col)) {
            return Err(SpreadsheetError::CoveredCellError(name, index_to_reference(row, col)));
        }
        let cell = self.sheets[sheet]
            .rows
            .get_mut(row)
            .and_then(|cells| cells.get_mut(col))
            .ok_or_else(|| SpreadsheetError::CellOutOfRangeError(name, index_to_reference(row, col)))?;
        *cell = text.trim().to_owned();
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), RosterSyncError> {
        self.saved.push(path.to_owned());
        Ok(())
    }
}
