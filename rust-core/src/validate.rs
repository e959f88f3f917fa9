//! validate.rs — required-field and DNI checks run before anything touches the workbook.

use thiserror::Error;

use crate::record::{ClientRecord, Field, RawRecord};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("DNI must contain only digits")]
    NonNumericDni,
    #[error("missing required fields: {}", join_labels(.0))]
    MissingFields(Vec<Field>),
}

fn join_labels(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks a raw record and returns its trimmed, validated form.
///
/// A non-digit DNI is reported before any missing field, even when other
/// required fields are empty too. Lesion and EstudiosMedicos are never checked.
pub fn validate(raw: &RawRecord) -> Result<ClientRecord, ValidationError> {
    let values = Field::ALL.map(|f| raw.get(f).trim().to_owned());

    let missing: Vec<Field> = Field::REQUIRED
        .into_iter()
        .filter(|f| values[f.index()].is_empty())
        .collect();

    let dni = &values[Field::Dni.index()];
    if !dni.is_empty() && !dni.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::NonNumericDni);
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }
    Ok(ClientRecord::from_trimmed(values))
}

/// `(ok, reason)` form of [`validate`]; the reason is empty on success.
pub fn verdict(raw: &RawRecord) -> (bool, String) {
    match validate(raw) {
        Ok(_) => (true, String::new()),
        Err(e) => (false, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn complete() -> RawRecord {
        RawRecord {
            nombre: "Juan".into(),
            apellido: "Pérez".into(),
            dni: "30111222".into(),
            dia_alta_medica: "2024-03-01".into(),
            lesion: String::new(),
            estudios_medicos: String::new(),
            art: "Galeno ART".into(),
        }
    }

    #[test]
    fn accepts_complete_record() {
        let record = validate(&complete()).unwrap();
        assert_eq!(record.get(Field::Dni), "30111222");
        assert_eq!(record.get(Field::Lesion), "");
    }

    #[test]
    fn trims_every_field() {
        let mut raw = complete();
        raw.nombre = "  Juan \t".into();
        raw.estudios_medicos = "\n RX de tobillo\n".into();
        let record = validate(&raw).unwrap();
        assert_eq!(record.get(Field::Nombre), "Juan");
        assert_eq!(record.get(Field::EstudiosMedicos), "RX de tobillo");
    }

    #[test]
    fn whitespace_only_counts_as_missing() {
        let mut raw = complete();
        raw.apellido = "   ".into();
        raw.art = "\t".into();
        assert_eq!(
            validate(&raw),
            Err(ValidationError::MissingFields(vec![Field::Apellido, Field::Art]))
        );
    }

    #[test]
    fn missing_message_lists_labels_in_order() {
        let err = validate(&RawRecord::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required fields: Nombre, Apellido, DNI, DiaAltaMedica, ART"
        );
    }

    #[test]
    fn non_digit_dni_wins_over_missing_fields() {
        let raw = RawRecord {
            dni: "30.111.222".into(),
            ..RawRecord::default()
        };
        assert_eq!(validate(&raw), Err(ValidationError::NonNumericDni));
        assert_eq!(
            verdict(&raw),
            (false, "DNI must contain only digits".to_owned())
        );
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        let mut raw = complete();
        raw.dni = "٣٠١١١".into();
        assert_eq!(validate(&raw), Err(ValidationError::NonNumericDni));
    }

    #[test]
    fn verdict_on_success_has_empty_reason() {
        assert_eq!(verdict(&complete()), (true, String::new()));
    }

    fn text() -> impl Strategy<Value = String> {
        "[A-Za-zÁÉÍÓÚáéíóúñ ]{0,12}[A-Za-z][A-Za-z ]{0,12}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn complete_records_pass(
            nombre in text(),
            apellido in text(),
            dni in "[0-9]{1,15}",
            art in text(),
            lesion in "[a-z ]{0,20}",
        ) {
            let raw = RawRecord {
                nombre,
                apellido,
                dni,
                dia_alta_medica: "2024-03-01".into(),
                lesion,
                estudios_medicos: String::new(),
                art,
            };
            prop_assert!(validate(&raw).is_ok());
        }

        #[test]
        fn missing_fields_are_reported_in_order(mask in 1u8..32) {
            let mut raw = complete();
            let mut expected = Vec::new();
            for (bit, field) in Field::REQUIRED.into_iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    raw.set(field, " ");
                    expected.push(field);
                }
            }
            prop_assert_eq!(validate(&raw), Err(ValidationError::MissingFields(expected)));
        }

        #[test]
        fn any_non_digit_dni_is_rejected(
            prefix in "[0-9]{0,6}",
            bad in "[^0-9\\s]",
            suffix in "[0-9]{0,6}",
            blank_nombre in any::<bool>(),
        ) {
            let mut raw = complete();
            raw.dni = format!("{prefix}{bad}{suffix}");
            if blank_nombre {
                raw.nombre.clear();
            }
            prop_assert_eq!(validate(&raw), Err(ValidationError::NonNumericDni));
        }
    }
}
