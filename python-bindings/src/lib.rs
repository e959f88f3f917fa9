use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use clientes_core::{
    AppendConfig, CARRIERS, DEFAULT_FILE_NAME, HEADERS, HeaderPolicy, RawRecord, SubmitError,
    submit, verdict,
};
use std::collections::HashMap;
use std::path::PathBuf;

fn raw_record(fields: HashMap<String, String>) -> PyResult<RawRecord> {
    RawRecord::from_pairs(fields).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Checks a form given as `{header label: value}`; returns `(ok, message)`.
#[pyfunction]
fn validate(fields: HashMap<String, String>) -> PyResult<(bool, String)> {
    Ok(verdict(&raw_record(fields)?))
}

/// Validates the form and appends it as one row to the workbook at `path`.
#[pyfunction]
#[pyo3(signature = (path, fields, strict_header = false))]
fn append_record(path: PathBuf, fields: HashMap<String, String>, strict_header: bool) -> PyResult<()> {
    let raw = raw_record(fields)?;
    let mut config = AppendConfig::default();
    if strict_header {
        config.header_policy = HeaderPolicy::Strict;
    }
    match submit(&path, &raw, &config) {
        Ok(_) => Ok(()),
        Err(SubmitError::Validation(e)) => Err(PyValueError::new_err(e.to_string())),
        Err(SubmitError::Append(e)) => Err(PyRuntimeError::new_err(e.to_string())),
    }
}

#[pyfunction]
fn carriers() -> Vec<&'static str> {
    CARRIERS.to_vec()
}

#[pyfunction]
fn headers() -> Vec<&'static str> {
    HEADERS.to_vec()
}

#[pyfunction]
fn default_file_name() -> &'static str {
    DEFAULT_FILE_NAME
}

#[pymodule]
fn clientes_art(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(validate, m)?)?;
    m.add_function(wrap_pyfunction!(append_record, m)?)?;
    m.add_function(wrap_pyfunction!(carriers, m)?)?;
    m.add_function(wrap_pyfunction!(headers, m)?)?;
    m.add_function(wrap_pyfunction!(default_file_name, m)?)?;
    Ok(())
}
