use crate::error::ResultMessage;
use crate::error::RosterSyncError;
use crate::helpers::fs::atomic_write_bytes;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::write_patched_cell;
use crate::spreadsheet::cell::CellNode;
use crate::spreadsheet::cell::CellTextReader;
use crate::spreadsheet::cell::COLUMNS_REPEATED;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::SpreadsheetMut;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// Archive entry holding the sheets
const CONTENT: &str = "content.xml";
/// Archive entry holding the package manifest
const MANIFEST: &str = "META-INF/manifest.xml";
/// XML element name for table (sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for covered table cell (merged cells)
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for a manifest entry
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
/// XML element name for manifest encryption data
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

const ROWS_REPEATED: &str = "table:number-rows-repeated";

/// Error types specific to ODS spreadsheet processing
#[derive(Error, Debug)]
pub enum OdsError {
    /// Invalid ODS MIME type detected in file
    #[error("Invalid ODS MIME type")]
    MimeTypeError,

    #[error("Missing {0} entry")]
    MissingEntryError(&'static str),

    #[error("Malformed cell element at event {0}")]
    MalformedCellError(usize),
}

/// Cell elements of one `table:table-row`.
#[derive(Debug, Default)]
struct RowNodes {
    /// Value of `table:number-rows-repeated`
    repeated: usize,
    cells: Vec<CellNode>,
}

impl RowNodes {
    /// Finds the node covering logical column `col` and the offset inside its repeat run.
    ///
    /// The trailing filler shows as one column in the snapshot but still
    /// reaches its full repeat count here, so blank columns past the last
    /// non-empty cell stay writable.
    fn locate(&self, col: usize) -> Option<(CellNode, usize)> {
        let mut first = 0usize;
        for node in &self.cells {
            if col < first + node.span {
                return Some((*node, col - first));
            }
            first += node.span;
        }
        let last = self.cells.last()?;
        let first = first - last.span;
        (col < first + last.repeated).then(|| (*last, col - first))
    }
}

/// Pending replacement texts for one cell element, keyed by repeat offset.
struct CellPatch {
    node: CellNode,
    texts: BTreeMap<usize, String>,
}

/// OpenDocument spreadsheet held fully in memory.
///
/// `content.xml` is kept as the event stream it was read from; writes are
/// recorded against cell elements and spliced in when the document is
/// serialised, so everything that was not written keeps its original markup.
pub struct OdsSpreadsheet {
    /// Name of the ODS file
    name: String,
    /// ZIP archive containing the ODS file contents
    archive: ZipArchive<Cursor<Vec<u8>>>,
    /// `content.xml` events
    events: Vec<Event<'static>>,
    /// Text snapshot of every sheet
    sheets: Vec<Sheet>,
    /// Cell element positions, parallel to `sheets`
    nodes: Vec<Vec<RowNodes>>,
    /// Pending writes keyed by the start event of the cell element
    patches: BTreeMap<usize, CellPatch>,
}

impl OdsSpreadsheet {
    /// Opens an ODS file and validates its format
    pub fn open(path: &Path) -> Result<Self, RosterSyncError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&path.to_string_lossy(), bytes)
    }

    /// Reads an ODS package from memory
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Self, RosterSyncError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        check_mime(&mut archive)?;
        if is_password_protected(&mut archive)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?;
        }
        let content = archive
            .read_bytes(CONTENT)?
            .ok_or(OdsError::MissingEntryError(CONTENT))?;
        let events = XmlReader::new(content.as_slice())
            .read_to_end()
            .with_prefix("Read content.xml")?;

        let mut indexer = ContentIndexer::default();
        for (index, event) in events.iter().enumerate() {
            indexer.feed(index, event)?;
        }
        let (sheets, nodes) = indexer.finish();
        log::debug!("{}: {} sheets indexed from {} events", name, sheets.len(), events.len());

        Ok(OdsSpreadsheet {
            name: name.to_owned(),
            archive,
            events,
            sheets,
            nodes,
            patches: BTreeMap::new(),
        })
    }

    /// Serialises `content.xml` with every pending write applied
    pub fn content(&self) -> Result<Vec<u8>, RosterSyncError> {
        let mut writer = Writer::new(Vec::new());
        let mut index = 0usize;
        while index < self.events.len() {
            if let Some(patch) = self.patches.get(&index) {
                write_patched_cell(&mut writer, &self.events, &patch.node, &patch.texts)?;
                index = patch.node.end + 1;
            } else {
                writer.write_event(self.events[index].borrow())?;
                index += 1;
            }
        }
        Ok(writer.into_inner())
    }

    /// Serialises the whole package
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, RosterSyncError> {
        let content = self.content()?;
        self.archive.repack(CONTENT, &content)
    }

    /// Number of cell elements with pending writes
    pub fn pending_writes(&self) -> usize {
        self.patches.values().map(|patch| patch.texts.len()).sum()
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
}

impl SpreadsheetMut for OdsSpreadsheet {
    fn set_cell_text(&mut self, sheet: usize, row: usize, col: usize, text: &str) -> Result<(), SpreadsheetError> {
        let sheet_name = self.sheets
            .get(sheet)
            .map(|sheet| sheet.name.to_owned())
            .ok_or(SpreadsheetError::SheetIndexError(sheet))?;
        let row_nodes = self.nodes
            .get(sheet)
            .and_then(|rows| rows.get(row))
            .ok_or_else(|| SpreadsheetError::CellOutOfRangeError(sheet_name.to_owned(), index_to_reference(row, col)))?;
        if row_nodes.repeated > 1 {
            return Err(SpreadsheetError::RepeatedRowError(sheet_name, row + 1, row_nodes.repeated));
        }
        let (node, offset) = row_nodes
            .locate(col)
            .ok_or_else(|| SpreadsheetError::CellOutOfRangeError(sheet_name.to_owned(), index_to_reference(row, col)))?;
        if node.covered {
            return Err(SpreadsheetError::CoveredCellError(sheet_name, index_to_reference(row, col)));
        }

        self.patches
            .entry(node.start)
            .or_insert_with(|| CellPatch { node, texts: BTreeMap::new() })
            .texts
            .insert(offset, text.to_owned());
        let cells = &mut self.sheets[sheet].rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = text.trim().to_owned();
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), RosterSyncError> {
        let bytes = self.to_bytes()?;
        atomic_write_bytes(path, &bytes)
    }
}

/// Row being indexed
#[derive(Default)]
struct OpenRow {
    nodes: RowNodes,
    texts: Vec<String>,
}

/// Cell being indexed
struct OpenCell {
    start: usize,
    repeated: usize,
    covered: bool,
    depth: usize,
    text: CellTextReader,
}

/// Builds the sheet snapshot and the cell element positions from the event stream.
#[derive(Default)]
struct ContentIndexer {
    sheets: Vec<Sheet>,
    nodes: Vec<Vec<RowNodes>>,
    sheet: Option<(Sheet, Vec<RowNodes>)>,
    row: Option<OpenRow>,
    cell: Option<OpenCell>,
}

impl ContentIndexer {
    fn feed(&mut self, index: usize, event: &Event<'static>) -> Result<(), RosterSyncError> {
        if self.cell.is_some() {
            return self.feed_cell(index, event);
        }
        let empty = matches!(event, Event::Empty(_));
        match event {
            Event::Start(element) | Event::Empty(element)
                if self.row.is_some() && (element.name() == TABLE_CELL || element.name() == TABLE_COVERED_CELL) =>
            {
                let cell = OpenCell {
                    start: index,
                    repeated: element.parse_attribute_value(COLUMNS_REPEATED)?.unwrap_or(1usize).max(1),
                    covered: element.name() == TABLE_COVERED_CELL,
                    depth: 0,
                    text: CellTextReader::default(),
                };
                if empty {
                    self.close_cell(cell, index);
                } else {
                    self.cell = Some(cell);
                }
            }
            Event::Start(element) | Event::Empty(element)
                if self.sheet.is_some() && self.row.is_none() && element.name() == TABLE_ROW =>
            {
                let repeated = element.parse_attribute_value(ROWS_REPEATED)?.unwrap_or(1usize).max(1);
                let mut row = OpenRow::default();
                row.nodes.repeated = repeated;
                self.row = Some(row);
                if empty {
                    self.close_row();
                }
            }
            Event::End(element) if self.row.is_some() && element.name() == TABLE_ROW => self.close_row(),
            Event::Start(element) | Event::Empty(element) if self.sheet.is_none() && element.name() == TABLE => {
                let name = element
                    .get_attribute_value("table:name")?
                    .map(|name| name.into_owned())
                    .unwrap_or_default();
                self.sheet = Some((Sheet::new(&name, Vec::new()), Vec::new()));
                if empty {
                    self.close_sheet();
                }
            }
            Event::End(element) if self.sheet.is_some() && self.row.is_none() && element.name() == TABLE => {
                self.close_sheet()
            }
            _ => (),
        }
        Ok(())
    }

    fn feed_cell(&mut self, index: usize, event: &Event<'static>) -> Result<(), RosterSyncError> {
        let closing = matches!(event, Event::End(_)) && self.cell.as_ref().map(|cell| cell.depth == 0).unwrap_or(false);
        if closing {
            if let Some(cell) = self.cell.take() {
                self.close_cell(cell, index);
            }
            return Ok(());
        }
        if let Some(cell) = self.cell.as_mut() {
            match event {
                Event::Start(_) => cell.depth += 1,
                Event::End(_) => cell.depth -= 1,
                _ => (),
            }
            cell.text.feed(event)?;
        }
        Ok(())
    }

    fn close_cell(&mut self, cell: OpenCell, end: usize) {
        if let Some(row) = self.row.as_mut() {
            row.nodes.cells.push(CellNode {
                start: cell.start,
                end,
                repeated: cell.repeated,
                span: cell.repeated,
                covered: cell.covered,
            });
            row.texts.push(cell.text.finish());
        }
    }

    /// A trailing empty cell is filler and counts as a single column.
    fn close_row(&mut self) {
        let Some(mut row) = self.row.take() else {
            return;
        };
        if let (Some(node), Some(text)) = (row.nodes.cells.last_mut(), row.texts.last()) {
            if text.is_empty() {
                node.span = 1;
            }
        }
        let mut texts = Vec::new();
        for (node, text) in row.nodes.cells.iter().zip(row.texts) {
            for _ in 0..node.span {
                texts.push(text.to_owned());
            }
        }
        if let Some((sheet, nodes)) = self.sheet.as_mut() {
            sheet.rows.push(texts);
            nodes.push(row.nodes);
        }
    }

    fn close_sheet(&mut self) {
        if let Some((sheet, nodes)) = self.sheet.take() {
            self.sheets.push(sheet);
            self.nodes.push(nodes);
        }
    }

    fn finish(mut self) -> (Vec<Sheet>, Vec<Vec<RowNodes>>) {
        self.close_row();
        self.close_sheet();
        (self.sheets, self.nodes)
    }
}

/// Validates that the ZIP archive contains a valid ODS file by checking MIME type
fn check_mime(zip: &mut ZipArchive<Cursor<Vec<u8>>>) -> Result<(), RosterSyncError> {
    if let Some(mimetype) = zip.read_bytes("mimetype")? {
        if mimetype.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// Checks if the ODS file is password protected by examining the manifest
fn is_password_protected(zip: &mut ZipArchive<Cursor<Vec<u8>>>) -> Result<bool, RosterSyncError> {
    let Some(mut reader) = zip.xml_reader(MANIFEST)? else {
        return Ok(false);
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) | Event::Empty(event) if in_file_entry && event.name() == ENCRYPTION_DATA => {
            return Ok(true);
        }
    });
    Ok(false)
}
