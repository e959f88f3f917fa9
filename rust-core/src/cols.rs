//! cols.rs — column widths in the `<cols>` block, plus coordinate helpers.

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::{XlsxEditor, find_bytes};

/// One `<col>`: the 1-based columns it covers and every other attribute as written.
#[derive(Debug, Clone, PartialEq)]
struct ColSpan {
    min: u32,
    max: u32,
    attrs: Vec<(String, String)>,
}

impl ColSpan {
    fn covers(&self, col: u32) -> bool {
        self.min <= col && col <= self.max
    }

    fn width(&self) -> Option<f64> {
        self.attr("width").and_then(|w| w.parse().ok())
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn put(&mut self, key: &str, value: String) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key.to_owned(), value)),
        }
    }

    /// This span narrowed to `col` alone, with a custom width.
    fn sized(&self, col: u32, width: f64) -> ColSpan {
        let mut one = ColSpan { min: col, max: col, attrs: self.attrs.clone() };
        one.put("width", width.to_string());
        one.put("customWidth", "1".to_owned());
        one
    }

    fn to_xml(&self) -> String {
        let mut s = format!(r#"<col min="{}" max="{}""#, self.min, self.max);
        for (k, v) in &self.attrs {
            s.push_str(&format!(r#" {k}="{v}""#));
        }
        s.push_str("/>");
        s
    }
}

impl XlsxEditor {
    /// Sets a custom width on the 0-based column `col0`, keeping its other properties.
    ///
    /// A `<col>` covering several columns is split around `col0`; neighbours keep
    /// their element unchanged.
    pub fn set_column_width(&mut self, col0: u32, width: f64) -> Result<&mut Self> {
        let (start, end) = self.ensure_cols_block()?;
        let mut spans = parse_cols(&self.sheet_xml[start..end])?;
        let col = col0 + 1;

        match spans.iter().position(|s| s.covers(col)) {
            Some(i) => {
                let old = spans.remove(i);
                let mut pieces = Vec::with_capacity(3);
                if old.min < col {
                    pieces.push(ColSpan { max: col - 1, ..old.clone() });
                }
                pieces.push(old.sized(col, width));
                if col < old.max {
                    pieces.push(ColSpan { min: col + 1, ..old });
                }
                spans.splice(i..i, pieces);
            }
            None => {
                let at = spans.iter().position(|s| s.min > col).unwrap_or(spans.len());
                let blank = ColSpan { min: col, max: col, attrs: Vec::new() };
                spans.insert(at, blank.sized(col, width));
            }
        }

        let block: String = std::iter::once("<cols>".to_owned())
            .chain(spans.iter().map(ColSpan::to_xml))
            .chain(std::iter::once("</cols>".to_owned()))
            .collect();
        self.sheet_xml.splice(start..end, block.into_bytes());
        Ok(self)
    }

    /// Width stored for the 0-based column `col0`, if any.
    pub fn column_width(&self, col0: u32) -> Result<Option<f64>> {
        let (Some(start), Some(end)) = (
            find_bytes(&self.sheet_xml, b"<cols>"),
            find_bytes(&self.sheet_xml, b"</cols>"),
        ) else {
            return Ok(None);
        };
        let spans = parse_cols(&self.sheet_xml[start..end + "</cols>".len()])?;
        Ok(spans
            .iter()
            .find(|s| s.covers(col0 + 1))
            .and_then(ColSpan::width))
    }

    fn ensure_cols_block(&mut self) -> Result<(usize, usize)> {
        if let (Some(start), Some(end)) = (
            find_bytes(&self.sheet_xml, b"<cols>"),
            find_bytes(&self.sheet_xml, b"</cols>"),
        ) {
            return Ok((start, end + "</cols>".len()));
        }
        let block = b"<cols></cols>";
        if let Some(start) = find_bytes(&self.sheet_xml, b"<cols/>") {
            self.sheet_xml.splice(start..start + "<cols/>".len(), block.iter().copied());
            return Ok((start, start + block.len()));
        }

        // <cols> goes right before <sheetData>
        let anchor = find_bytes(&self.sheet_xml, b"<sheetData")
            .context("<sheetData> not found on the current sheet")?;
        self.sheet_xml.splice(anchor..anchor, block.iter().copied());
        Ok((anchor, anchor + block.len()))
    }
}

/// The `<col>` elements of a `<cols>...</cols>` block, in document order.
fn parse_cols(block: &[u8]) -> Result<Vec<ColSpan>> {
    let text = std::str::from_utf8(block)?;
    let col_re = Regex::new(r#"<col\b[^>]*/>"#)?;
    let attr_re = Regex::new(r#"([A-Za-z][\w:]*)\s*=\s*"([^"]*)""#)?;

    let mut spans = Vec::new();
    for m in col_re.find_iter(text) {
        let mut min = None;
        let mut max = None;
        let mut attrs = Vec::new();
        for cap in attr_re.captures_iter(m.as_str()) {
            let (key, value) = (&cap[1], &cap[2]);
            match key {
                "min" => min = Some(value.parse::<u32>().with_context(|| format!("bad <col min=\"{value}\">"))?),
                "max" => max = Some(value.parse::<u32>().with_context(|| format!("bad <col max=\"{value}\">"))?),
                _ => attrs.push((key.to_owned(), value.to_owned())),
            }
        }
        let min = min.unwrap_or(1);
        let max = max.unwrap_or(min);
        if max < min {
            bail!("<col> range {min}..{max} is inverted");
        }
        spans.push(ColSpan { min, max, attrs });
    }
    Ok(spans)
}

/// 0-based column index to letters: 0 → "A", 26 → "AA".
pub fn col_letter(col0: u32) -> String {
    let mut n = col0 + 1;
    let mut rev = Vec::new();
    while n > 0 {
        rev.push((b'A' + ((n - 1) % 26) as u8) as char);
        n = (n - 1) / 26;
    }
    rev.iter().rev().collect()
}

/// "C7" → (2, 7): 0-based column, 1-based row.
pub fn split_coord(coord: &str) -> Result<(u32, u32)> {
    let p = coord
        .find(|c: char| c.is_ascii_digit())
        .with_context(|| format!("invalid cell coordinate '{coord}': no row"))?;
    let (letters, digits) = coord.split_at(p);
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        bail!("invalid cell coordinate '{coord}': bad column");
    }
    let col = letters
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1))
        - 1;
    let row: u32 = digits
        .parse()
        .with_context(|| format!("invalid cell coordinate '{coord}': bad row"))?;
    if row == 0 {
        bail!("invalid cell coordinate '{coord}': rows start at 1");
    }
    Ok((col, row))
}
