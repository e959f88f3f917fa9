//! record.rs — the client record: column identities, raw form input and the validated row.

use std::fmt;

use thiserror::Error;

/// Fixed header row, in column order A..G.
pub const HEADERS: [&str; 7] = [
    "Nombre",
    "Apellido",
    "DNI",
    "DiaAltaMedica",
    "Lesion",
    "EstudiosMedicos",
    "ART",
];

/// Quick-pick carrier names offered by the form. Free text is still accepted.
pub const CARRIERS: [&str; 7] = [
    "Prevención ART",
    "Swiss Medical ART",
    "Galeno ART",
    "Provincia ART",
    "Experta ART",
    "Mapfre ART",
    "La Segunda ART",
];

/// File name suggested by the save dialog.
pub const DEFAULT_FILE_NAME: &str = "clientes_art.xlsx";

/// One column of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Nombre,
    Apellido,
    Dni,
    DiaAltaMedica,
    Lesion,
    EstudiosMedicos,
    Art,
}

impl Field {
    /// All fields in declaration (= column) order.
    pub const ALL: [Field; 7] = [
        Field::Nombre,
        Field::Apellido,
        Field::Dni,
        Field::DiaAltaMedica,
        Field::Lesion,
        Field::EstudiosMedicos,
        Field::Art,
    ];

    /// Fields that must be non-empty, in declaration order.
    pub const REQUIRED: [Field; 5] = [
        Field::Nombre,
        Field::Apellido,
        Field::Dni,
        Field::DiaAltaMedica,
        Field::Art,
    ];

    /// Header label, also the key used by mapping-based callers.
    pub fn label(self) -> &'static str {
        HEADERS[self.index()]
    }

    /// 0-based column index.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_label(label: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.label() == label)
    }

    pub fn is_required(self) -> bool {
        Field::REQUIRED.contains(&self)
    }

    /// Input length cap of the form widget, in characters.
    pub fn max_len(self) -> Option<usize> {
        match self {
            Field::Nombre | Field::Apellido => Some(60),
            Field::Dni => Some(15),
            Field::Lesion => Some(80),
            Field::DiaAltaMedica | Field::EstudiosMedicos | Field::Art => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown field '{0}'")]
pub struct UnknownField(pub String);

/// Form input as typed by the user; values may be empty or padded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub nombre: String,
    pub apellido: String,
    pub dni: String,
    pub dia_alta_medica: String,
    pub lesion: String,
    pub estudios_medicos: String,
    pub art: String,
}

impl RawRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Nombre => &self.nombre,
            Field::Apellido => &self.apellido,
            Field::Dni => &self.dni,
            Field::DiaAltaMedica => &self.dia_alta_medica,
            Field::Lesion => &self.lesion,
            Field::EstudiosMedicos => &self.estudios_medicos,
            Field::Art => &self.art,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Nombre => &mut self.nombre,
            Field::Apellido => &mut self.apellido,
            Field::Dni => &mut self.dni,
            Field::DiaAltaMedica => &mut self.dia_alta_medica,
            Field::Lesion => &mut self.lesion,
            Field::EstudiosMedicos => &mut self.estudios_medicos,
            Field::Art => &mut self.art,
        };
        *slot = value.into();
    }

    /// Builds a record from `label → value` pairs. Labels that are absent stay empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, UnknownField>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawRecord::default();
        for (key, value) in pairs {
            let key = key.as_ref();
            let field = Field::from_label(key).ok_or_else(|| UnknownField(key.to_owned()))?;
            raw.set(field, value);
        }
        Ok(raw)
    }
}

/// A record that passed validation. Only [`crate::validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    values: [String; 7],
}

impl ClientRecord {
    pub(crate) fn from_trimmed(values: [String; 7]) -> Self {
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    /// Cell values in header order.
    pub fn values(&self) -> [&str; 7] {
        Field::ALL.map(|f| self.get(f))
    }
}
