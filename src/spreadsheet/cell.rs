//! Cell text codec for OpenDocument cells.
//!
//! Reading turns the paragraph content of a `table:table-cell` into one plain
//! string. Writing replaces the paragraphs of a cell with a single paragraph
//! holding new text, leaving every other child and attribute of the cell alone.

use crate::error::RosterSyncError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::spreadsheet::ods::OdsError;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::io::Write;

/// XML element name for annotations (comments)
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for paragraph text
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for heading text
const HEADING: QName = QName(b"text:h");
/// XML element name for collapsed spaces
const SPACE: QName = QName(b"text:s");
/// XML element name for tab stops
const TAB: QName = QName(b"text:tab");
/// XML element name for line breaks
const LINE_BREAK: QName = QName(b"text:line-break");

pub(crate) const COLUMNS_REPEATED: &str = "table:number-columns-repeated";

/// Attributes that give a cell a typed value; dropped when the cell becomes text.
const VALUE_ATTRIBUTES: [&str; 9] = [
    "office:value-type",
    "calcext:value-type",
    "office:value",
    "office:date-value",
    "office:time-value",
    "office:boolean-value",
    "office:string-value",
    "office:currency",
    "table:formula",
];

/// Position of one cell element inside the `content.xml` event stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CellNode {
    /// Index of the `Start` or `Empty` event
    pub(crate) start: usize,
    /// Index of the matching `End` event (equal to `start` for empty elements)
    pub(crate) end: usize,
    /// Value of `table:number-columns-repeated`
    pub(crate) repeated: usize,
    /// Logical columns this node occupies in the sheet snapshot
    pub(crate) span: usize,
    /// Covered (merged-away) cell
    pub(crate) covered: bool,
}

impl CellNode {
    pub(crate) fn is_empty_element(&self) -> bool {
        self.start == self.end
    }
}

fn is_paragraph(name: QName) -> bool {
    name == PARAGRAPH || name == HEADING
}

/// Collects the plain text of a cell from the events between its start and end tags.
#[derive(Default)]
pub(crate) struct CellTextReader {
    paragraphs: Vec<String>,
    paragraph: Option<String>,
    annotation_depth: usize,
}

impl CellTextReader {
    pub(crate) fn feed(&mut self, event: &Event) -> Result<(), RosterSyncError> {
        match event {
            Event::Start(element) if element.name() == ANNOTATION => self.annotation_depth += 1,
            Event::End(element) if element.name() == ANNOTATION => {
                self.annotation_depth = self.annotation_depth.saturating_sub(1)
            }
            _ if self.annotation_depth > 0 => (),
            Event::Start(element) if is_paragraph(element.name()) => self.paragraph = Some(String::new()),
            Event::Empty(element) if is_paragraph(element.name()) => self.paragraphs.push(String::new()),
            Event::End(element) if is_paragraph(element.name()) => {
                if let Some(paragraph) = self.paragraph.take() {
                    self.paragraphs.push(paragraph);
                }
            }
            Event::Start(element) | Event::Empty(element) if element.name() == SPACE => {
                if let Some(paragraph) = &mut self.paragraph {
                    let count: usize = element.parse_attribute_value("text:c")?.unwrap_or(1);
                    paragraph.push_str(&" ".repeat(count));
                }
            }
            Event::Empty(element) if element.name() == TAB => {
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.push('\t');
                }
            }
            Event::Empty(element) if element.name() == LINE_BREAK => {
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.push('\n');
                }
            }
            Event::Text(text) => {
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.push_bytes_text(text)?;
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(paragraph) = &mut self.paragraph {
                    paragraph.push_bytes_ref(reference)?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    /// Paragraphs joined by a single space, trimmed.
    pub(crate) fn finish(self) -> String {
        self.paragraphs.join(" ").trim().to_owned()
    }
}

/// Writes `text` as paragraph content. Space runs, tabs and newlines are
/// encoded as `text:s`, `text:tab` and `text:line-break` so that reading the
/// cell back yields the same text.
fn write_paragraph_content<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<(), RosterSyncError> {
    let mut buffer = String::new();
    let mut chars = text.chars().peekable();
    let mut at_start = true;
    while let Some(character) = chars.next() {
        match character {
            ' ' => {
                let mut count = 1usize;
                while chars.next_if_eq(&' ').is_some() {
                    count += 1;
                }
                if !at_start {
                    buffer.push(' ');
                    count -= 1;
                }
                if count > 0 {
                    flush_text(writer, &mut buffer)?;
                    write_space(writer, count)?;
                }
            }
            '\t' => {
                flush_text(writer, &mut buffer)?;
                writer.write_event(Event::Empty(BytesStart::new("text:tab")))?;
            }
            '\n' => {
                flush_text(writer, &mut buffer)?;
                writer.write_event(Event::Empty(BytesStart::new("text:line-break")))?;
            }
            '\r' => (),
            _ => buffer.push(character),
        }
        at_start = false;
    }
    flush_text(writer, &mut buffer)
}

fn flush_text<W: Write>(writer: &mut Writer<W>, buffer: &mut String) -> Result<(), RosterSyncError> {
    if !buffer.is_empty() {
        writer.write_event(Event::Text(BytesText::new(buffer.as_str())))?;
        buffer.clear();
    }
    Ok(())
}

fn write_space<W: Write>(writer: &mut Writer<W>, count: usize) -> Result<(), RosterSyncError> {
    let mut element = BytesStart::new("text:s");
    if count > 1 {
        element.push_attribute(("text:c", count.to_string().as_str()));
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

/// Writes the cell children, leaving out every top-level paragraph subtree.
fn write_without_paragraphs<W: Write>(writer: &mut Writer<W>, children: &[Event<'static>]) -> Result<(), RosterSyncError> {
    let mut depth = 0usize;
    let mut skipping = false;
    for event in children {
        match event {
            Event::Start(element) => {
                if depth == 0 && is_paragraph(element.name()) {
                    skipping = true;
                }
                depth += 1;
                if skipping {
                    continue;
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if skipping {
                    skipping = depth > 0;
                    continue;
                }
            }
            Event::Empty(element) if depth == 0 && is_paragraph(element.name()) => continue,
            _ if skipping => continue,
            _ => (),
        }
        writer.write_event(event.borrow())?;
    }
    Ok(())
}

/// Writes one cell holding `text`, typed as a string cell.
fn write_text_cell<W: Write>(
    writer: &mut Writer<W>,
    start: &BytesStart,
    children: &[Event<'static>],
    text: &str,
) -> Result<(), RosterSyncError> {
    let mut removed = VALUE_ATTRIBUTES.to_vec();
    removed.push(COLUMNS_REPEATED);
    let added: &[(&str, &str)] = if text.is_empty() {
        &[]
    } else {
        &[("office:value-type", "string"), ("calcext:value-type", "string")]
    };
    let element = start.rewrite_attributes(&removed, added)?;
    let name = std::str::from_utf8(start.name().as_ref())?.to_owned();

    writer.write_event(Event::Start(element))?;
    write_without_paragraphs(writer, children)?;
    if text.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("text:p")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("text:p")))?;
        write_paragraph_content(writer, text)?;
        writer.write_event(Event::End(BytesEnd::new("text:p")))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Writes an unchanged copy of a cell repeated `repeated` times.
fn write_cell_copy<W: Write>(
    writer: &mut Writer<W>,
    start: &BytesStart,
    children: &[Event<'static>],
    repeated: usize,
    empty_element: bool,
) -> Result<(), RosterSyncError> {
    let count = repeated.to_string();
    let added: Vec<(&str, &str)> = if repeated > 1 {
        vec![(COLUMNS_REPEATED, count.as_str())]
    } else {
        Vec::new()
    };
    let element = start.rewrite_attributes(&[COLUMNS_REPEATED], &added)?;
    if empty_element {
        writer.write_event(Event::Empty(element))?;
    } else {
        let name = std::str::from_utf8(start.name().as_ref())?.to_owned();
        writer.write_event(Event::Start(element))?;
        for event in children {
            writer.write_event(event.borrow())?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

/// Writes the cell `node` with the columns in `texts` (offsets into the
/// repeat run) replaced. A repeated cell is split so that only those
/// columns change.
pub(crate) fn write_patched_cell<W: Write>(
    writer: &mut Writer<W>,
    events: &[Event<'static>],
    node: &CellNode,
    texts: &BTreeMap<usize, String>,
) -> Result<(), RosterSyncError> {
    let (start, children) = match events.get(node.start) {
        Some(Event::Start(start)) if node.end > node.start && node.end < events.len() => {
            (start, &events[node.start + 1..node.end])
        }
        Some(Event::Empty(start)) => (start, &events[0..0]),
        _ => return Err(OdsError::MalformedCellError(node.start).into()),
    };

    let mut offset = 0usize;
    while offset < node.repeated {
        if let Some(text) = texts.get(&offset) {
            write_text_cell(writer, start, children, text)?;
            offset += 1;
        } else {
            let next = texts
                .range(offset..)
                .next()
                .map(|(next, _)| *next)
                .unwrap_or(node.repeated)
                .min(node.repeated);
            write_cell_copy(writer, start, children, next - offset, node.is_empty_element())?;
            offset = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::xml::XmlReader;

    fn read_text(xml: &str) -> String {
        let events = XmlReader::new(xml.as_bytes()).read_to_end().unwrap();
        let mut reader = CellTextReader::default();
        for event in &events {
            reader.feed(event).unwrap();
        }
        reader.finish()
    }

    fn patch(xml: &str, repeated: usize, texts: &[(usize, &str)]) -> String {
        let events = XmlReader::new(xml.as_bytes()).read_to_end().unwrap();
        let node = CellNode {
            start: 0,
            end: events.len() - 1,
            repeated,
            span: repeated,
            covered: false,
        };
        let texts: BTreeMap<usize, String> = texts
            .iter()
            .map(|(offset, text)| (*offset, text.to_string()))
            .collect();
        let mut writer = Writer::new(Vec::new());
        write_patched_cell(&mut writer, &events, &node, &texts).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn read_joins_paragraphs() {
        assert_eq!(read_text("<text:p>Alice</text:p><text:p>Smith</text:p>"), "Alice Smith");
        assert_eq!(read_text("<text:p> 101 </text:p>"), "101");
        assert_eq!(read_text("<text:p/><text:p>x</text:p>"), "x");
        assert_eq!(read_text(""), "");
    }

    #[test]
    fn read_expands_inline_elements() {
        assert_eq!(read_text("<text:p>a<text:s text:c=\"2\"/>b<text:tab/>c</text:p>"), "a  b\tc");
        assert_eq!(read_text("<text:p><text:span text:style-name=\"T1\">Ana</text:span> Paz</text:p>"), "Ana Paz");
        assert_eq!(read_text("<text:p>A&amp;B</text:p>"), "A&B");
    }

    #[test]
    fn read_ignores_annotations() {
        let xml = "<office:annotation><dc:creator>x</dc:creator><text:p>note</text:p></office:annotation><text:p>101</text:p>";
        assert_eq!(read_text(xml), "101");
    }

    #[test]
    fn write_replaces_paragraphs_and_retypes() {
        let xml = "<table:table-cell table:style-name=\"ce1\" office:value-type=\"float\" office:value=\"2\" calcext:value-type=\"float\"><text:p>2</text:p></table:table-cell>";
        assert_eq!(
            patch(xml, 1, &[(0, "3")]),
            "<table:table-cell table:style-name=\"ce1\" office:value-type=\"string\" calcext:value-type=\"string\"><text:p>3</text:p></table:table-cell>"
        );
    }

    #[test]
    fn write_keeps_annotations() {
        let xml = "<table:table-cell><office:annotation><text:p>note</text:p></office:annotation><text:p>old</text:p></table:table-cell>";
        assert_eq!(
            patch(xml, 1, &[(0, "new")]),
            "<table:table-cell office:value-type=\"string\" calcext:value-type=\"string\"><office:annotation><text:p>note</text:p></office:annotation><text:p>new</text:p></table:table-cell>"
        );
    }

    #[test]
    fn write_empty_text() {
        let xml = "<table:table-cell office:value-type=\"string\"><text:p>old</text:p></table:table-cell>";
        assert_eq!(patch(xml, 1, &[(0, "")]), "<table:table-cell><text:p/></table:table-cell>");
    }

    #[test]
    fn write_escapes_and_encodes_whitespace() {
        let xml = "<table:table-cell/>";
        assert_eq!(
            patch(xml, 1, &[(0, "A&B  C\nD")]),
            "<table:table-cell office:value-type=\"string\" calcext:value-type=\"string\"><text:p>A&amp;B <text:s/>C<text:line-break/>D</text:p></table:table-cell>"
        );
    }

    #[test]
    fn write_splits_repeated_cell() {
        let xml = "<table:table-cell table:style-name=\"ce2\" table:number-columns-repeated=\"4\"/>";
        assert_eq!(
            patch(xml, 4, &[(1, "x")]),
            concat!(
                "<table:table-cell table:style-name=\"ce2\"/>",
                "<table:table-cell table:style-name=\"ce2\" office:value-type=\"string\" calcext:value-type=\"string\"><text:p>x</text:p></table:table-cell>",
                "<table:table-cell table:style-name=\"ce2\" table:number-columns-repeated=\"2\"/>",
            )
        );
    }

    #[test]
    fn written_text_reads_back() {
        let xml = "<table:table-cell/>";
        let written = patch(xml, 1, &[(0, "Juan  Perez\tDNI")]);
        assert_eq!(read_text(&written), "Juan  Perez\tDNI");
    }
}
