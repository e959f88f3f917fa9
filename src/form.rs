//! The command-line stand-in for the client form: flags in, a raw record out.

use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Args;
use clientes_core::{AppendConfig, DEFAULT_FILE_NAME, Field, HeaderPolicy, RawRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Args)]
pub struct FormArgs {
    /// First name
    #[arg(long, default_value = "")]
    pub nombre: String,
    /// Last name
    #[arg(long, default_value = "")]
    pub apellido: String,
    /// National ID, digits only
    #[arg(long, default_value = "")]
    pub dni: String,
    /// Medical discharge date as yyyy-MM-dd; today when omitted
    #[arg(long, value_parser = parse_date)]
    pub alta: Option<NaiveDate>,
    /// Injury
    #[arg(long, default_value = "")]
    pub lesion: String,
    /// Medical studies, may span several lines
    #[arg(long, default_value = "")]
    pub estudios: String,
    /// Insurance carrier; free text or one of `art-clientes carriers`
    #[arg(long, default_value = "")]
    pub art: String,
    /// Workbook to append to; created when missing
    #[arg(short, long, default_value = DEFAULT_FILE_NAME)]
    pub output: PathBuf,
    /// Sheet name for a newly created workbook
    #[arg(long)]
    pub sheet_name: Option<String>,
    /// Refuse to append when row 1 is not exactly the expected header
    #[arg(long, default_value_t = false)]
    pub strict_header: bool,
}

pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| format!("expected a date as yyyy-MM-dd: {e}"))
}

impl FormArgs {
    /// Builds the raw record, applying the input caps the form widgets enforce.
    /// The caps count the value as typed, surrounding spaces included.
    pub fn to_raw(&self, today: NaiveDate) -> Result<RawRecord> {
        let alta = self.alta.unwrap_or(today).format(DATE_FORMAT).to_string();
        let raw = RawRecord {
            nombre: self.nombre.clone(),
            apellido: self.apellido.clone(),
            dni: self.dni.clone(),
            dia_alta_medica: alta,
            lesion: self.lesion.clone(),
            estudios_medicos: self.estudios.clone(),
            art: self.art.clone(),
        };
        for field in Field::ALL {
            if let Some(max) = field.max_len() {
                let len = raw.get(field).chars().count();
                if len > max {
                    bail!("{field} accepts at most {max} characters, got {len}");
                }
            }
        }
        Ok(raw)
    }

    pub fn config(&self) -> AppendConfig {
        let mut config = AppendConfig::default();
        if let Some(name) = &self.sheet_name {
            config.sheet_name = name.clone();
        }
        if self.strict_header {
            config.header_policy = HeaderPolicy::Strict;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Form {
        #[command(flatten)]
        args: FormArgs,
    }

    fn parse(argv: &[&str]) -> FormArgs {
        Form::try_parse_from(std::iter::once("form").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn omitted_date_defaults_to_today() {
        let args = parse(&["--nombre", "Juan", "--art", "Galeno ART"]);
        let raw = args.to_raw(day(2026, 10, 17)).unwrap();
        assert_eq!(raw.dia_alta_medica, "2026-10-17");
        assert_eq!(raw.nombre, "Juan");
        assert_eq!(raw.dni, "");
        assert_eq!(args.output, PathBuf::from("clientes_art.xlsx"));
    }

    #[test]
    fn explicit_date_is_iso_formatted() {
        let args = parse(&["--alta", "2024-03-01"]);
        let raw = args.to_raw(day(2026, 1, 1)).unwrap();
        assert_eq!(raw.dia_alta_medica, "2024-03-01");
    }

    #[test]
    fn malformed_date_is_a_usage_error() {
        assert!(Form::try_parse_from(["form", "--alta", "01/03/2024"]).is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn widget_caps_are_enforced() {
        let args = parse(&["--dni", "1234567890123456"]);
        let err = args.to_raw(day(2024, 1, 1)).unwrap_err();
        assert_eq!(err.to_string(), "DNI accepts at most 15 characters, got 16");

        let long_lesion = "x".repeat(81);
        let args = parse(&["--lesion", &long_lesion]);
        assert!(args.to_raw(day(2024, 1, 1)).is_err());

        // padding counts towards the cap
        let padded = format!("  {}", "a".repeat(60));
        let args = parse(&["--apellido", &padded]);
        let err = args.to_raw(day(2024, 1, 1)).unwrap_err();
        assert_eq!(err.to_string(), "Apellido accepts at most 60 characters, got 62");

        // multi-byte characters count once
        let args = parse(&["--nombre", &"ñ".repeat(60)]);
        assert!(args.to_raw(day(2024, 1, 1)).is_ok());
    }

    #[test]
    fn flags_shape_the_config() {
        let args = parse(&["--strict-header", "--sheet-name", "Altas"]);
        let config = args.config();
        assert_eq!(config.header_policy, HeaderPolicy::Strict);
        assert_eq!(config.sheet_name, "Altas");

        assert_eq!(parse(&[]).config(), AppendConfig::default());
    }
}
