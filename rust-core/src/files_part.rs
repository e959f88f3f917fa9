use std::{
    fs::File,
    io::{Read, Seek, Write},
    path::Path,
};

use ::zip as zip_crate;
use anyhow::{Context, Result, bail};
use log::debug;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use tempfile::NamedTempFile;

use crate::{Source, XlsxEditor, check_sheet_name, read_part, template};

/// Work with files
impl XlsxEditor {
    /// Opens a workbook and prepares its active sheet (the one Excel shows first).
    pub fn open<P: AsRef<Path>>(src: P) -> Result<Self> {
        let src_path = src.as_ref().to_path_buf();
        let file = File::open(&src_path)
            .with_context(|| format!("cannot open {}", src_path.display()))?;
        let mut zip = zip_crate::ZipArchive::new(file)
            .with_context(|| format!("{} is not an xlsx package", src_path.display()))?;

        let workbook_xml = read_entry(&mut zip, "xl/workbook.xml")?;
        let rels_xml = read_entry(&mut zip, "xl/_rels/workbook.xml.rels")?;
        let (sheet_name, rid) = active_sheet(&workbook_xml)?;
        let rels = relationships(&rels_xml)?;

        let sheet_path = rels
            .iter()
            .find(|r| r.id == rid)
            .map(|r| resolve_target(&r.target))
            .with_context(|| format!("relationship {rid} for sheet '{sheet_name}' not found"))?;

        let mut sheet_xml = read_entry(&mut zip, &sheet_path)?;
        normalize_sheet_data(&mut sheet_xml)?;

        // the shared-string table is optional; inline-only workbooks have none
        let shared_path = rels
            .iter()
            .find(|r| r.kind.ends_with("/sharedStrings"))
            .map(|r| resolve_target(&r.target));
        let shared_strings = match shared_path {
            Some(path) if zip.file_names().any(|n| n == path) => {
                read_part::parse_shared_strings(&read_entry(&mut zip, &path)?)?
            }
            _ => Vec::new(),
        };

        let last_row = scan_last_row(&sheet_xml)?;
        debug!(
            "opened {} sheet '{}' ({}) with last row {}",
            src_path.display(),
            sheet_name,
            sheet_path,
            last_row
        );

        Ok(Self {
            source: Source::Archive(src_path),
            sheet_name,
            sheet_path,
            sheet_xml,
            shared_strings,
            last_row,
        })
    }

    /// A new in-memory workbook with one empty sheet called `sheet_name`.
    pub fn blank(sheet_name: &str) -> Result<Self> {
        check_sheet_name(sheet_name)?;
        Ok(Self {
            source: Source::Blank(template::blank_parts(sheet_name)),
            sheet_name: sheet_name.to_owned(),
            sheet_path: template::SHEET_PATH.to_owned(),
            sheet_xml: template::EMPTY_SHEET.as_bytes().to_vec(),
            shared_strings: Vec::new(),
            last_row: 0,
        })
    }

    /// Writes the workbook to `dst`, replacing it if it exists.
    ///
    /// The package is built in a temporary file next to `dst` and renamed over
    /// it, so a failed save leaves the old file as it was.
    pub fn save<P: AsRef<Path>>(&self, dst: P) -> Result<()> {
        let dst = dst.as_ref();
        let dir = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("cannot create a temporary file in {}", dir.display()))?;

        {
            let mut zout = zip_crate::ZipWriter::new(tmp.as_file_mut());
            let opt: zip_crate::write::FileOptions<'_, ()> = zip_crate::write::FileOptions::default()
                .compression_method(zip_crate::CompressionMethod::Deflated)
                .compression_level(Some(6));

            match &self.source {
                Source::Archive(src_path) => {
                    let mut zin = zip_crate::ZipArchive::new(
                        File::open(src_path)
                            .with_context(|| format!("cannot reopen {}", src_path.display()))?,
                    )?;
                    for i in 0..zin.len() {
                        let file = zin.by_index_raw(i)?;
                        if file.name() == self.sheet_path {
                            zout.start_file(self.sheet_path.as_str(), opt)?;
                            zout.write_all(&self.sheet_xml)?;
                        } else {
                            zout.raw_copy_file(file)?;
                        }
                    }
                }
                Source::Blank(parts) => {
                    for (path, content) in parts {
                        zout.start_file(path.as_str(), opt)?;
                        zout.write_all(content)?;
                    }
                    zout.start_file(self.sheet_path.as_str(), opt)?;
                    zout.write_all(&self.sheet_xml)?;
                }
            }
            zout.finish()?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(dst)
            .map_err(|e| e.error)
            .with_context(|| format!("cannot write {}", dst.display()))?;
        Ok(())
    }
}

fn read_entry<R: Read + Seek>(zip: &mut zip_crate::ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = zip.by_name(name).with_context(|| format!("{name} not found"))?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

struct Relationship {
    id: String,
    target: String,
    kind: String,
}

/// (sheet name, relationship id) of the active tab, falling back to the first sheet.
fn active_sheet(workbook_xml: &[u8]) -> Result<(String, String)> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.config_mut().trim_text(true);

    let mut active_tab = 0usize;
    let mut sheets: Vec<(String, String)> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attr(e, b"activeTab") {
                        active_tab = tab.parse().unwrap_or(0);
                    }
                }
                b"sheet" => {
                    let name = attr(e, b"name").unwrap_or_default();
                    let rid = attr(e, b"id").context("<sheet> without r:id")?;
                    sheets.push((name, rid));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if sheets.is_empty() {
        bail!("workbook has no sheets");
    }
    let idx = active_tab.min(sheets.len() - 1);
    Ok(sheets.swap_remove(idx))
}

fn relationships(rels_xml: &[u8]) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(rels_xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"Relationship" => {
                out.push(Relationship {
                    id: attr(e, b"Id").unwrap_or_default(),
                    target: attr(e, b"Target").unwrap_or_default(),
                    kind: attr(e, b"Type").unwrap_or_default(),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Targets in workbook.xml.rels are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_owned(),
        None => format!("xl/{target}"),
    }
}

/// Attribute value by local name, so `r:id` matches `id` whatever the prefix.
fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().with_checks(false).flatten().find_map(|a| {
        (a.key.local_name().as_ref() == local).then(|| {
            let raw = String::from_utf8_lossy(&a.value).into_owned();
            match quick_xml::escape::unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            }
        })
    })
}

/// `<sheetData/>` has nowhere to insert rows; open it up.
fn normalize_sheet_data(sheet_xml: &mut Vec<u8>) -> Result<()> {
    if memchr::memmem::find(sheet_xml, b"</sheetData>").is_some() {
        return Ok(());
    }
    let start = memchr::memmem::find(sheet_xml, b"<sheetData").context("<sheetData> not found")?;
    let end = crate::find_bytes_from(sheet_xml, b">", start).context("unterminated <sheetData>")?;
    if sheet_xml[end - 1] != b'/' {
        bail!("</sheetData> not found");
    }
    // keep the attributes, drop the "/"
    let mut open = sheet_xml[start..end - 1].to_vec();
    open.extend_from_slice(b"></sheetData>");
    sheet_xml.splice(start..end + 1, open);
    Ok(())
}

/// Highest row number on the sheet; rows without `r` continue the count.
fn scan_last_row(sheet_xml: &[u8]) -> Result<u32> {
    let mut reader = Reader::from_reader(sheet_xml);
    reader.config_mut().trim_text(true);

    let mut last_row = 0;
    loop {
        match reader.read_event()? {
            Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"row" => {
                last_row = match attr(e, b"r") {
                    Some(r) => r.parse::<u32>().with_context(|| format!("bad row number '{r}'"))?.max(last_row),
                    None => last_row + 1,
                };
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(last_row)
}
