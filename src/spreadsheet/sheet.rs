/// Plain-text view of one sheet: rows of cell texts in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name as shown on the tab
    pub name: String,
    /// Row texts, one entry per logical column
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: &str, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_owned(),
            rows,
        }
    }

    /// Returns the text at (row, col), or None when the row is shorter.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(col))
            .map(String::as_str)
    }

    /// Like [`Sheet::cell`] but yields an empty string for missing cells.
    pub fn text(&self, row: usize, col: usize) -> &str {
        self.cell(row, col).unwrap_or("")
    }

    /// Index of the first row whose `col` text, trimmed, equals `key`.
    pub fn find_row(&self, col: usize, key: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|cells| cells.get(col).map(|text| text.trim() == key).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Sheet {
        Sheet::new("PISO 1", vec![
            vec!["TIPO".to_owned(), "HAB".to_owned()],
            vec!["DBL".to_owned()],
            vec!["DBL".to_owned(), " 101 ".to_owned(), "x".to_owned()],
            vec!["TPL".to_owned(), "101".to_owned()],
        ])
    }

    #[test]
    fn cell_access() {
        let sheet = sheet();

        assert_eq!(sheet.cell(0, 1), Some("HAB"));
        assert_eq!(sheet.cell(1, 1), None);
        assert_eq!(sheet.cell(9, 0), None);
        assert_eq!(sheet.text(1, 1), "");
    }

    #[test]
    fn find_row_takes_first_trimmed_match() {
        let sheet = sheet();

        assert_eq!(sheet.find_row(1, "101"), Some(2));
        assert_eq!(sheet.find_row(1, "102"), None);
    }
}
