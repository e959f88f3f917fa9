//! clientes-core — ART client ledger: record validation and append-only xlsx writing.
//!
//! The xlsx layer edits one worksheet as raw XML bytes, in place, and writes the
//! package back atomically. Everything is text: cells are inline strings.

mod append;
mod cols;
mod config;
mod files_part;
mod read_part;
mod record;
mod template;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use quick_xml::{
    Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};

pub use append::{AppendError, Probe, append, append_with, probe};
pub use cols::{col_letter, split_coord};
pub use config::{AppendConfig, HeaderPolicy};
pub use read_part::SheetRow;
pub use record::{CARRIERS, ClientRecord, DEFAULT_FILE_NAME, Field, HEADERS, RawRecord, UnknownField};
pub use validate::{ValidationError, validate, verdict};

/// Where the rest of the package comes from when saving.
enum Source {
    /// Copy every other part from the archive at this path.
    Archive(PathBuf),
    /// In-memory parts of a workbook that has never been written.
    Blank(Vec<(String, Vec<u8>)>),
}

/// `XlsxEditor` opens (or creates) a workbook, edits its active sheet and saves it back.
pub struct XlsxEditor {
    source: Source,
    sheet_name: String,
    sheet_path: String,
    sheet_xml: Vec<u8>,
    shared_strings: Vec<String>,
    last_row: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Append(#[from] AppendError),
}

/// Validates `raw` and, only if it passes, appends it to the workbook at `path`.
pub fn submit<P: AsRef<Path>>(
    path: P,
    raw: &RawRecord,
    config: &AppendConfig,
) -> std::result::Result<ClientRecord, SubmitError> {
    let record = validate(raw)?;
    append_with(path, &record, config)?;
    Ok(record)
}

impl XlsxEditor {
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of the last `<row>` on the sheet, 0 when there is none.
    pub fn last_row(&self) -> u32 {
        self.last_row
    }

    /// Appends one row of text cells after the last row, starting at column A.
    pub fn append_row<I, S>(&mut self, cells: I) -> Result<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cells: Vec<S> = cells.into_iter().collect();
        let row_num = self.last_row + 1;
        for (col, val) in cells.iter().enumerate() {
            check_cell_text(&format!("{}{}", col_letter(col as u32), row_num), val.as_ref())?;
        }
        self.last_row = row_num;
        let mut width = 0u32;
        let mut writer = Writer::new(Vec::new());

        writer
            .create_element("row")
            .with_attribute(("r", row_num.to_string().as_str()))
            .write_inner_content(|w| {
                for (col, val) in cells.into_iter().enumerate() {
                    let coord = format!("{}{}", col_letter(col as u32), row_num);
                    write_text_cell(w, &coord, val.as_ref())?;
                    width = col as u32 + 1;
                }
                Ok(())
            })?;

        let new_row_xml = writer.into_inner();
        let pos = memchr::memmem::rfind(&self.sheet_xml, b"</sheetData>")
            .context("</sheetData> tag not found")?;
        self.sheet_xml.splice(pos..pos, new_row_xml);
        self.refresh_dimension(width)?;
        Ok(row_num)
    }

    /// Writes one text cell, replacing any cell already at `coord`.
    ///
    /// Rows stay sorted by `r`, and cells inside a row stay sorted by column;
    /// Excel reports "recovered records" otherwise.
    pub fn set_cell(&mut self, coord: &str, value: &str) -> Result<()> {
        let (col0, row_num) = split_coord(coord)?;
        check_cell_text(coord, value)?;

        let mut cell_writer = Writer::new(Vec::new());
        write_text_cell(&mut cell_writer, coord, value)?;
        let cell_xml = cell_writer.into_inner();

        let row_marker = format!("<row r=\"{row_num}\"");
        if let Some(row_start) = memchr::memmem::find(&self.sheet_xml, row_marker.as_bytes()) {
            let open_end = find_bytes_from(&self.sheet_xml, b">", row_start)
                .context("unterminated <row> tag")?;

            if self.sheet_xml[open_end - 1] == b'/' {
                // <row r="N" .../>  →  <row r="N" ...>cell</row>
                let mut row = self.sheet_xml[row_start..open_end - 1].to_vec();
                row.push(b'>');
                row.extend_from_slice(&cell_xml);
                row.extend_from_slice(b"</row>");
                self.sheet_xml.splice(row_start..open_end + 1, row);
            } else {
                let row_end = find_bytes_from(&self.sheet_xml, b"</row>", open_end)
                    .context("</row> not found")?
                    + "</row>".len();
                let mut row_slice = self.sheet_xml[row_start..row_end].to_vec();

                let cell_marker = format!("<c r=\"{coord}\"");
                if let Some(cell_pos) = find_bytes(&row_slice, cell_marker.as_bytes()) {
                    let tag_end =
                        find_bytes_from(&row_slice, b">", cell_pos).context("unterminated <c> tag")?;
                    let cell_end = if row_slice[tag_end - 1] == b'/' {
                        tag_end + 1
                    } else {
                        find_bytes_from(&row_slice, b"</c>", tag_end).context("</c> not found")?
                            + "</c>".len()
                    };
                    row_slice.drain(cell_pos..cell_end);
                }

                // first cell of a later column, else just before </row>
                let mut insert_pos = row_slice.len() - "</row>".len();
                let mut i = 0;
                while let Some(c_pos) = find_bytes_from(&row_slice, b"<c r=\"", i) {
                    let coord_start = c_pos + 6;
                    let Some(end_quote) = find_bytes_from(&row_slice, b"\"", coord_start) else {
                        break;
                    };
                    let other = std::str::from_utf8(&row_slice[coord_start..end_quote])?;
                    if split_coord(other).is_ok_and(|(other_col, _)| other_col > col0) {
                        insert_pos = c_pos;
                        break;
                    }
                    i = end_quote;
                }
                row_slice.splice(insert_pos..insert_pos, cell_xml);
                self.sheet_xml.splice(row_start..row_end, row_slice);
            }
        } else {
            let mut new_row_xml = Vec::new();
            new_row_xml.extend_from_slice(row_marker.as_bytes());
            new_row_xml.push(b'>');
            new_row_xml.extend_from_slice(&cell_xml);
            new_row_xml.extend_from_slice(b"</row>");

            // before the first row with a greater number, else before </sheetData>
            let mut insert_pos = None;
            let mut search_idx = 0;
            while let Some(abs) = find_bytes_from(&self.sheet_xml, b"<row ", search_idx) {
                let tag_end = find_bytes_from(&self.sheet_xml, b">", abs).context("unterminated <row> tag")?;
                let tag = std::str::from_utf8(&self.sheet_xml[abs..tag_end])?;
                if row_number_attr(tag).is_some_and(|existing| existing > row_num) {
                    insert_pos = Some(abs);
                    break;
                }
                search_idx = tag_end;
            }
            let pos = match insert_pos {
                Some(p) => p,
                None => memchr::memmem::rfind(&self.sheet_xml, b"</sheetData>")
                    .context("</sheetData> tag not found")?,
            };
            self.sheet_xml.splice(pos..pos, new_row_xml);
        }

        if row_num > self.last_row {
            self.last_row = row_num;
        }
        self.refresh_dimension(col0 + 1)
    }

    /// Rewrites `<dimension ref>` so it spans A1 to the last row and at least `width` columns.
    fn refresh_dimension(&mut self, width: u32) -> Result<()> {
        let Some(start) = memchr::memmem::find(&self.sheet_xml, b"<dimension") else {
            return Ok(());
        };
        let end = find_bytes_from(&self.sheet_xml, b">", start).context("unterminated <dimension> tag")? + 1;
        let tag = std::str::from_utf8(&self.sheet_xml[start..end])?;

        let current_cols = tag
            .split("ref=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .and_then(|r| r.rsplit(':').next())
            .and_then(|last| split_coord(last).ok())
            .map_or(0, |(col0, _)| col0 + 1);
        let cols = current_cols.max(width).max(1);

        let new_tag = format!(
            r#"<dimension ref="A1:{}{}"/>"#,
            col_letter(cols - 1),
            self.last_row.max(1)
        );
        self.sheet_xml.splice(start..end, new_tag.into_bytes());
        Ok(())
    }
}

/// `<c r=".." t="inlineStr"><is><t xml:space="preserve">..</t></is></c>`
fn write_text_cell(w: &mut Writer<Vec<u8>>, coord: &str, value: &str) -> std::io::Result<()> {
    w.write_event(Event::Start(
        BytesStart::new("c").with_attributes([("r", coord), ("t", "inlineStr")]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("is")))?;
    w.write_event(Event::Start(
        BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
    ))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new("t")))?;
    w.write_event(Event::End(BytesEnd::new("is")))?;
    w.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Sheet XML is XML 1.0: no C0 controls besides tab, LF and CR, and no U+FFFE/U+FFFF.
fn check_cell_text(coord: &str, value: &str) -> Result<()> {
    let bad = value.chars().find(|&c| {
        matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
    });
    if let Some(c) = bad {
        bail!("{coord}: character U+{:04X} cannot be stored in a worksheet", c as u32);
    }
    Ok(())
}

/// Value of `r="N"` inside a `<row ...` start tag.
fn row_number_attr(tag: &str) -> Option<u32> {
    let rest = tag.split(" r=\"").nth(1)?;
    rest.split('"').next()?.parse().ok()
}

/// Excel refuses sheet names that break these rules.
fn check_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > 31 {
        bail!("sheet name must be 1 to 31 characters long: '{name}'");
    }
    if name.contains(['[', ']', ':', '*', '?', '/', '\\']) {
        bail!("sheet name contains a forbidden character: '{name}'");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        bail!("sheet name cannot start or end with an apostrophe: '{name}'");
    }
    Ok(())
}

pub(crate) fn find_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(hay, needle)
}

pub(crate) fn find_bytes_from(hay: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    memchr::memmem::find(hay.get(start..)?, needle).map(|p| p + start)
}
