//! append.rs — open-or-create the ledger workbook and add one record as a row.

use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    XlsxEditor, col_letter,
    config::{AppendConfig, HeaderPolicy},
    record::{ClientRecord, HEADERS},
};

#[derive(Debug, Error)]
pub enum AppendError {
    #[error("the first row does not match the expected header (found: {})", .found.join(", "))]
    HeaderMismatch { found: Vec<String> },
    #[error("{0:#}")]
    Workbook(#[from] anyhow::Error),
}

/// What is at the target path, decided before anything is written.
pub enum Probe {
    /// Opened, and row 1 has content in at least one header column.
    ExistsValid(XlsxEditor),
    /// Opened, but every header cell of row 1 is unset.
    ExistsEmpty(XlsxEditor),
    /// Not there, or not a workbook we can read.
    MissingOrUnreadable(anyhow::Error),
}

pub fn probe<P: AsRef<Path>>(path: P) -> Probe {
    let editor = match XlsxEditor::open(path) {
        Ok(editor) => editor,
        Err(e) => return Probe::MissingOrUnreadable(e),
    };
    match header_cells(&editor) {
        Ok(cells) if cells.iter().all(|c| c.is_empty()) => Probe::ExistsEmpty(editor),
        Ok(_) => Probe::ExistsValid(editor),
        Err(e) => Probe::MissingOrUnreadable(e),
    }
}

/// Row 1, columns A..G, unset cells as "".
fn header_cells(editor: &XlsxEditor) -> anyhow::Result<Vec<String>> {
    Ok(editor
        .row(1)?
        .map(|row| row.texts(HEADERS.len()))
        .unwrap_or_else(|| vec![String::new(); HEADERS.len()]))
}

/// [`append_with`] using [`AppendConfig::default`].
pub fn append<P: AsRef<Path>>(path: P, record: &ClientRecord) -> Result<(), AppendError> {
    append_with(path, record, &AppendConfig::default())
}

/// Appends `record` as one row to the workbook at `path`, creating the
/// workbook and its header row when there is nothing readable there.
///
/// Column widths are reset on every call. The same record appended twice
/// gives two rows.
pub fn append_with<P: AsRef<Path>>(
    path: P,
    record: &ClientRecord,
    config: &AppendConfig,
) -> Result<(), AppendError> {
    let path = path.as_ref();

    let mut editor = match probe(path) {
        Probe::ExistsValid(editor) => {
            if config.header_policy == HeaderPolicy::Strict {
                let found = header_cells(&editor)?;
                if found != HEADERS {
                    return Err(AppendError::HeaderMismatch { found });
                }
            }
            debug!("{}: header present, appending", path.display());
            editor
        }
        Probe::ExistsEmpty(mut editor) => {
            debug!("{}: row 1 is empty, writing the header", path.display());
            for (col, label) in HEADERS.iter().enumerate() {
                editor.set_cell(&format!("{}1", col_letter(col as u32)), label)?;
            }
            editor
        }
        Probe::MissingOrUnreadable(cause) => {
            if path.exists() {
                warn!(
                    "{} is not a readable workbook and will be replaced: {cause:#}",
                    path.display()
                );
            } else {
                debug!("{}: creating a new workbook", path.display());
            }
            let mut editor = XlsxEditor::blank(&config.sheet_name)?;
            editor.append_row(HEADERS)?;
            editor
        }
    };

    let row = editor.append_row(record.values())?;
    for (col, label) in HEADERS.iter().enumerate() {
        editor.set_column_width(col as u32, config.column_width(label))?;
    }
    editor.save(path)?;

    info!(
        "appended row {row} to {} (sheet '{}')",
        path.display(),
        editor.sheet_name()
    );
    Ok(())
}
