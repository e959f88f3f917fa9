//! read_part.rs — reading cell values back out of the sheet.

use anyhow::{Context, Result};
use quick_xml::{Reader, events::Event};

use crate::{XlsxEditor, split_coord};

/// One `<row>` of the sheet; `cells[i]` is column `i` (0-based), `None` when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRow {
    pub number: u32,
    pub cells: Vec<Option<String>>,
}

impl SheetRow {
    pub fn cell(&self, col0: usize) -> Option<&str> {
        self.cells.get(col0)?.as_deref()
    }

    /// The first `width` cells as text, unset cells as "".
    pub fn texts(&self, width: usize) -> Vec<String> {
        (0..width)
            .map(|c| self.cell(c).unwrap_or_default().to_owned())
            .collect()
    }
}

#[derive(Default)]
struct PendingCell {
    col: usize,
    kind: Option<String>,
    value: Option<String>,
    inline: Option<String>,
    formula: Option<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Capture {
    Off,
    Value,
    Inline,
    Formula,
}

impl XlsxEditor {
    /// All rows of the sheet, in document order.
    pub fn rows(&self) -> Result<Vec<SheetRow>> {
        let mut reader = Reader::from_reader(self.sheet_xml.as_slice());
        reader.config_mut().trim_text(false);

        let mut rows = Vec::new();
        let mut row: Option<SheetRow> = None;
        let mut cell: Option<PendingCell> = None;
        let mut capture = Capture::Off;
        let mut in_phonetic = false;
        let mut next_row = 1u32;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"row" => {
                        let number = row_number(e, next_row)?;
                        next_row = number + 1;
                        row = Some(SheetRow { number, cells: Vec::new() });
                    }
                    b"c" => {
                        if let Some(r) = row.as_ref() {
                            cell = Some(pending_cell(e, r)?);
                        }
                    }
                    b"v" if cell.is_some() => capture = Capture::Value,
                    b"f" if cell.is_some() => capture = Capture::Formula,
                    b"t" if cell.is_some() && !in_phonetic => capture = Capture::Inline,
                    b"rPh" => in_phonetic = true,
                    _ => {}
                },
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"row" => {
                        let number = row_number(e, next_row)?;
                        next_row = number + 1;
                        rows.push(SheetRow { number, cells: Vec::new() });
                    }
                    b"c" => {
                        // a style-only cell: present but unset
                        if let Some(r) = row.as_mut() {
                            let pending = pending_cell(e, r)?;
                            place(r, pending.col, None);
                        }
                    }
                    b"f" => {
                        if let Some(c) = cell.as_mut() {
                            c.formula.get_or_insert_with(String::new);
                        }
                    }
                    _ => {}
                },
                Event::Text(ref t) => {
                    let text = unescaped(&**t)?;
                    push_text(cell.as_mut(), capture, &text);
                }
                Event::GeneralRef(ref r) => {
                    let name = std::str::from_utf8(&**r)?;
                    let text = unescaped(format!("&{name};").as_bytes())?;
                    push_text(cell.as_mut(), capture, &text);
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"v" | b"f" | b"t" => capture = Capture::Off,
                    b"rPh" => in_phonetic = false,
                    b"c" => {
                        if let (Some(r), Some(done)) = (row.as_mut(), cell.take()) {
                            let col = done.col;
                            let value = self.resolve(done)?;
                            place(r, col, value);
                        }
                    }
                    b"row" => {
                        if let Some(done) = row.take() {
                            rows.push(done);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(rows)
    }

    /// Row `number`, if the sheet has it.
    pub fn row(&self, number: u32) -> Result<Option<SheetRow>> {
        Ok(self.rows()?.into_iter().find(|r| r.number == number))
    }

    fn resolve(&self, cell: PendingCell) -> Result<Option<String>> {
        Ok(match cell.kind.as_deref() {
            Some("s") => match cell.value {
                Some(idx) => {
                    let idx: usize = idx
                        .trim()
                        .parse()
                        .with_context(|| format!("bad shared string index '{idx}'"))?;
                    Some(
                        self.shared_strings
                            .get(idx)
                            .with_context(|| format!("shared string {idx} out of range"))?
                            .clone(),
                    )
                }
                None => None,
            },
            Some("inlineStr") => cell.inline,
            _ => cell.value.or(cell.formula.map(|f| format!("={f}"))),
        })
    }
}

fn row_number(e: &quick_xml::events::BytesStart<'_>, default: u32) -> Result<u32> {
    match attr_value(e, b"r") {
        Some(r) => r.parse().with_context(|| format!("bad row number '{r}'")),
        None => Ok(default),
    }
}

fn pending_cell(e: &quick_xml::events::BytesStart<'_>, row: &SheetRow) -> Result<PendingCell> {
    let col = match attr_value(e, b"r") {
        Some(coord) => split_coord(&coord)?.0 as usize,
        None => row.cells.len(),
    };
    Ok(PendingCell {
        col,
        kind: attr_value(e, b"t"),
        ..PendingCell::default()
    })
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes().with_checks(false).flatten().find_map(|a| {
        (a.key.as_ref() == key).then(|| String::from_utf8_lossy(&a.value).into_owned())
    })
}

fn place(row: &mut SheetRow, col: usize, value: Option<String>) {
    if row.cells.len() <= col {
        row.cells.resize(col + 1, None);
    }
    row.cells[col] = value;
}

fn push_text(cell: Option<&mut PendingCell>, capture: Capture, text: &str) {
    let Some(cell) = cell else { return };
    let slot = match capture {
        Capture::Off => return,
        Capture::Value => &mut cell.value,
        Capture::Inline => &mut cell.inline,
        Capture::Formula => &mut cell.formula,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

fn unescaped(raw: &[u8]) -> Result<String> {
    let s = std::str::from_utf8(raw)?;
    Ok(quick_xml::escape::unescape(s)?.into_owned())
}

/// `xl/sharedStrings.xml` → one string per `<si>`, rich-text runs concatenated.
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Event::Text(ref t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&unescaped(&**t)?);
                }
            }
            Event::GeneralRef(ref r) if in_text => {
                if let Some(s) = current.as_mut() {
                    let name = std::str::from_utf8(&**r)?;
                    s.push_str(&unescaped(format!("&{name};").as_bytes())?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => out.extend(current.take()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}
