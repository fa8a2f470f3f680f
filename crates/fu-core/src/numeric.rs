use crate::{FuError, FuResult};

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// `v` itself, or `NonFinite` naming `what` for NaN and infinities.
pub fn ensure_finite(v: Real, what: &'static str) -> FuResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FuError::NonFinite { what, value: v })
    }
}

/// Format `v` with `digits` significant digits, general notation.
///
/// Mirrors the C `%.Ng` conversion: scientific notation when the decimal
/// exponent is below -4 or at least `digits`, fixed notation otherwise,
/// trailing zeros stripped in both cases. Exponents carry a sign and at
/// least two digits (`1e+06`, `8.34e-06`).
pub fn format_sig(v: Real, digits: usize) -> String {
    let digits = digits.max(1);
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }

    // Let the float formatter do the rounding, then read the exponent back.
    let sci = format!("{:.*e}", digits - 1, v);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, v)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
