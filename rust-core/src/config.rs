//! Configuration for the appender.

/// How strictly an existing first row is checked before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Any content in row 1 is taken to be the header.
    #[default]
    Lenient,
    /// Row 1 must match the expected labels exactly.
    Strict,
}

/// Knobs for [`crate::append_with`].
#[derive(Debug, Clone, PartialEq)]
pub struct AppendConfig {
    /// Sheet name used when a new workbook is created
    pub sheet_name: String,
    /// Lower bound for every column width
    pub min_column_width: f64,
    /// Added to the header label length
    pub column_padding: f64,
    pub header_policy: HeaderPolicy,
}

impl Default for AppendConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Clientes".to_owned(),
            min_column_width: 16.0,
            column_padding: 2.0,
            header_policy: HeaderPolicy::Lenient,
        }
    }
}

impl AppendConfig {
    /// `max(min_column_width, chars(label) + column_padding)`
    pub fn column_width(&self, label: &str) -> f64 {
        self.min_column_width
            .max(label.chars().count() as f64 + self.column_padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_widths() {
        let cfg = AppendConfig::default();
        assert_eq!(cfg.column_width("DNI"), 16.0);
        assert_eq!(cfg.column_width("DiaAltaMedica"), 16.0);
        assert_eq!(cfg.column_width("EstudiosMedicos"), 17.0);
    }
}
