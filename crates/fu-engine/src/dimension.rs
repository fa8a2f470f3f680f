//! Dimension vectors over named base dimensions.

use std::collections::BTreeMap;
use std::fmt;

/// Largest absolute exponent a unit token or base dimension may carry.
pub const MAX_EXPONENT: i32 = 1024;

pub(crate) fn bounded(exp: Option<i32>) -> Option<i32> {
    exp.filter(|e| e.unsigned_abs() <= MAX_EXPONENT.unsigned_abs())
}

/// Product of base dimensions raised to integer powers, e.g. `[mass] / [time]`.
///
/// Base dimensions are open-ended: any `[name]` declared by a definition
/// (`[currency]`, `[amount_of_hydrogen]`, ...) becomes a new axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dimension(BTreeMap<String, i32>);

impl Dimension {
    pub fn dimensionless() -> Self {
        Self::default()
    }

    /// Single base dimension, e.g. `Dimension::base("[mass]")`.
    pub fn base(name: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(name.into(), 1);
        Self(map)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.is_empty()
    }

    pub fn exponent(&self, base: &str) -> i32 {
        self.0.get(base).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Saturating product; see [`Dimension::checked_mul`].
    pub fn mul(&self, other: &Dimension) -> Dimension {
        let mut out = self.0.clone();
        for (k, v) in &other.0 {
            let e = out.entry(k.clone()).or_insert(0);
            *e = e.saturating_add(*v);
        }
        out.retain(|_, v| *v != 0);
        Dimension(out)
    }

    pub fn div(&self, other: &Dimension) -> Dimension {
        self.mul(&other.powi(-1))
    }

    pub fn powi(&self, n: i32) -> Dimension {
        let mut out: BTreeMap<String, i32> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.saturating_mul(n)))
            .collect();
        out.retain(|_, v| *v != 0);
        Dimension(out)
    }

    /// Product, or `None` once an exponent leaves `±MAX_EXPONENT`.
    pub fn checked_mul(&self, other: &Dimension) -> Option<Dimension> {
        let mut out = self.0.clone();
        for (k, v) in &other.0 {
            let e = out.entry(k.clone()).or_insert(0);
            *e = bounded(e.checked_add(*v))?;
        }
        out.retain(|_, v| *v != 0);
        Some(Dimension(out))
    }

    pub fn checked_div(&self, other: &Dimension) -> Option<Dimension> {
        self.checked_mul(&other.checked_powi(-1)?)
    }

    pub fn checked_powi(&self, n: i32) -> Option<Dimension> {
        let mut out = self
            .0
            .iter()
            .map(|(k, v)| bounded(v.checked_mul(n)).map(|e| (k.clone(), e)))
            .collect::<Option<BTreeMap<String, i32>>>()?;
        out.retain(|_, v| *v != 0);
        Some(Dimension(out))
    }
}

impl Dimension {
    /// Reduced fraction `num / den` such that `self == other ** (num / den)`.
    pub fn power_ratio(&self, other: &Dimension) -> Option<(i32, i32)> {
        let (name, b) = other.iter().next()?;
        let a = self.exponent(name);
        if a == 0 || a.unsigned_abs().max(b.unsigned_abs()) > MAX_EXPONENT.unsigned_abs() {
            return None;
        }
        let cross = |x: i32, y: i32| i64::from(x) * i64::from(y);
        let consistent = self.iter().all(|(k, e)| cross(e, b) == cross(other.exponent(k), a))
            && other.iter().all(|(k, e)| cross(self.exponent(k), b) == cross(e, a));
        if !consistent {
            return None;
        }
        let g = gcd(a.abs(), b.abs());
        let (num, den) = (a / g, b / g);
        Some(if den < 0 { (-num, -den) } else { (num, den) })
    }
}

fn gcd(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let num: Vec<String> = self
            .0
            .iter()
            .filter(|(_, e)| **e > 0)
            .map(|(k, e)| power_term(k, e.unsigned_abs()))
            .collect();
        let den: Vec<String> = self
            .0
            .iter()
            .filter(|(_, e)| **e < 0)
            .map(|(k, e)| power_term(k, e.unsigned_abs()))
            .collect();
        let head = if num.is_empty() {
            "1".to_string()
        } else {
            num.join(" * ")
        };
        write!(f, "{head}")?;
        for d in den {
            write!(f, " / {d}")?;
        }
        Ok(())
    }
}

fn power_term(name: &str, exp: u32) -> String {
    if exp == 1 {
        name.to_string()
    } else {
        format!("{name} ** {exp}")
    }
}
