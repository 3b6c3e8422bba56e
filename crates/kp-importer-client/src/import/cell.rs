/// One worksheet row rendered to text, addressed by column position.
///
/// Trailing empty cells are not part of the row, so [`Row::width`] is the
/// populated width the importers compare against their minimum column counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    pub(crate) fn new(mut cells: Vec<String>) -> Self {
        while cells.last().is_some_and(|cell| cell.is_empty()) {
            cells.pop();
        }
        Self { cells }
    }

    pub(crate) fn width(&self) -> usize {
        self.cells.len()
    }

    /// Raw cell text, or `""` past the end of the row.
    pub(crate) fn raw(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// Normalized cell text; `None` when the cell is absent or blank.
    pub(crate) fn cell(&self, index: usize) -> Option<String> {
        normalize_cell(self.raw(index))
    }

    /// Normalized cell text, or `""` when the cell is absent.
    pub(crate) fn text(&self, index: usize) -> String {
        self.cell(index).unwrap_or_default()
    }
}

/// Collapses whitespace runs to one space and trims; blank input is absent.
pub(crate) fn normalize_cell(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// `"Ya"` (any case) marks a yes/no column as set.
pub(crate) fn yes_flag(value: Option<&str>) -> i64 {
    match value {
        Some(text) if text.eq_ignore_ascii_case("ya") => 1,
        _ => 0,
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub(crate) fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if at_word_start {
            result.extend(ch.to_uppercase());
        } else {
            result.extend(ch.to_lowercase());
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }
    result
}
