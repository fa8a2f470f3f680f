//! Vintage-qualified currency units (`USD_2020`, `EUR_2024`, ...).
//!
//! The first currency of the dataset is the base and declares the
//! `[currency]` dimension for the base year. Every other currency is tied to
//! it by an exchange rate in the base year. Each currency then gets one unit
//! per earlier year, scaled by its GDP deflator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use fu_core::{ensure_finite, format_sig};
use serde::Deserialize;
use tracing::info;

use crate::error::{GenerateError, GenerateResult};
use crate::{FILE_HEADER, write_file};

/// Earliest year that gets a deflated unit.
pub const FIRST_YEAR: i32 = 2005;

const FACTOR_DIGITS: usize = 6;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CurrencyDataset {
    /// Defaults to two years before the current one.
    #[serde(default)]
    pub base_year: Option<i32>,
    pub currencies: Vec<CurrencySeries>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CurrencySeries {
    pub code: String,
    /// ISO3 country whose price level deflates this currency.
    pub country: String,
    /// Value of one unit in the base currency, in the base year.
    #[serde(default)]
    pub exchange_rate: Option<f64>,
    /// GDP deflator index by year.
    pub deflator_index: BTreeMap<i32, f64>,
}

pub fn default_base_year() -> i32 {
    chrono::Local::now().year() - 2
}

pub fn load_dataset(path: &Path) -> GenerateResult<CurrencyDataset> {
    let content = std::fs::read_to_string(path).map_err(GenerateError::io(path))?;
    serde_yaml::from_str(&content).map_err(|source| GenerateError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

impl CurrencyDataset {
    pub fn base_year(&self) -> i32 {
        self.base_year.unwrap_or_else(default_base_year)
    }

    pub fn base(&self) -> GenerateResult<&CurrencySeries> {
        self.currencies
            .first()
            .ok_or_else(|| GenerateError::dataset("currency dataset is empty"))
    }

    pub fn codes(&self) -> Vec<&str> {
        self.currencies.iter().map(|c| c.code.as_str()).collect()
    }
}

/// Contents of `<CODE>.txt` for `series`.
pub fn render_currency(dataset: &CurrencyDataset, series: &CurrencySeries) -> GenerateResult<String> {
    let base_year = dataset.base_year();
    let base = dataset.base()?;
    let mut out = String::from(FILE_HEADER);

    if series.code == base.code {
        out.push_str(&format!("{}_{base_year} = [currency]\n\n", series.code));
    } else {
        let rate = series.exchange_rate.ok_or_else(|| {
            GenerateError::dataset(format!("{} has no exchange rate", series.code))
        })?;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(GenerateError::dataset(format!(
                "{} has invalid exchange rate {rate}",
                series.code
            )));
        }
        out.push_str(&format!(
            "{}_{base_year} = {}_{base_year} * {}\n\n",
            series.code,
            base.code,
            format_sig(rate, FACTOR_DIGITS)
        ));
    }

    let reference = index(series, base_year)?;
    let lines = series
        .deflator_index
        .keys()
        .filter(|year| (FIRST_YEAR..base_year).contains(*year))
        .map(|&year| -> GenerateResult<String> {
            let factor = ensure_finite(reference / index(series, year)?, "deflator factor")?;
            Ok(format!(
                "{code}_{year} = {code}_{base_year} * {}",
                format_sig(factor, FACTOR_DIGITS),
                code = series.code
            ))
        })
        .collect::<GenerateResult<Vec<String>>>()?;
    if !lines.is_empty() {
        out.push_str(&lines.join("\n"));
        out.push('\n');
    }
    Ok(out)
}

fn index(series: &CurrencySeries, year: i32) -> GenerateResult<f64> {
    match series.deflator_index.get(&year) {
        Some(v) if v.is_finite() && *v > 0.0 => Ok(*v),
        Some(v) => Err(GenerateError::dataset(format!(
            "{} deflator for {year} is invalid: {v}",
            series.code
        ))),
        None => Err(GenerateError::dataset(format!(
            "{} has no deflator for {year}",
            series.code
        ))),
    }
}

/// Write `currencies/currencies.txt` and one file per currency under `out`.
pub fn generate_currencies(dataset: &CurrencyDataset, out: &Path) -> GenerateResult<Vec<PathBuf>> {
    let dir = out.join("currencies");
    std::fs::create_dir_all(&dir).map_err(GenerateError::io(&dir))?;

    let mut written = Vec::new();
    let list = dir.join("currencies.txt");
    write_file(&list, &format!("{}\n", dataset.codes().join("\n")))?;
    written.push(list);

    for series in &dataset.currencies {
        let path = dir.join(format!("{}.txt", series.code));
        write_file(&path, &render_currency(dataset, series)?)?;
        written.push(path);
    }
    info!(
        currencies = dataset.currencies.len(),
        base_year = dataset.base_year(),
        "currency definitions written"
    );
    Ok(written)
}
