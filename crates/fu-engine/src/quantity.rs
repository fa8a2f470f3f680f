//! Quantities: a magnitude times a product of unit tokens.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Div, Mul, Neg};

use crate::dimension::bounded;

/// Product of unit tokens raised to integer powers.
///
/// Tokens are kept as written (`kg`, `MWh_H2_LHV`, `USD_2020`); they were
/// checked against the registry when the container was built, and are
/// resolved again on every conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnitsContainer(BTreeMap<String, i32>);

impl UnitsContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(token: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(token.into(), 1);
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn exponent(&self, token: &str) -> i32 {
        self.0.get(token).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub(crate) fn push(&mut self, token: &str, exp: i32) {
        let e = self.0.entry(token.to_string()).or_insert(0);
        *e = e.saturating_add(exp);
        self.0.retain(|_, v| *v != 0);
    }

    /// Saturating product; the engine builds containers with
    /// [`UnitsContainer::checked_mul`] and friends.
    pub fn mul(&self, other: &UnitsContainer) -> UnitsContainer {
        let mut out = self.clone();
        for (k, v) in &other.0 {
            out.push(k, *v);
        }
        out
    }

    pub fn div(&self, other: &UnitsContainer) -> UnitsContainer {
        self.mul(&other.powi(-1))
    }

    pub fn powi(&self, n: i32) -> UnitsContainer {
        let mut out: BTreeMap<String, i32> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.saturating_mul(n)))
            .collect();
        out.retain(|_, v| *v != 0);
        UnitsContainer(out)
    }

    /// Product, or `None` once an exponent leaves `±MAX_EXPONENT`.
    pub fn checked_mul(&self, other: &UnitsContainer) -> Option<UnitsContainer> {
        let mut out = self.0.clone();
        for (k, v) in &other.0 {
            let e = out.entry(k.clone()).or_insert(0);
            *e = bounded(e.checked_add(*v))?;
        }
        out.retain(|_, v| *v != 0);
        Some(UnitsContainer(out))
    }

    pub fn checked_div(&self, other: &UnitsContainer) -> Option<UnitsContainer> {
        self.checked_mul(&other.checked_powi(-1)?)
    }

    pub fn checked_powi(&self, n: i32) -> Option<UnitsContainer> {
        let mut out = self
            .0
            .iter()
            .map(|(k, v)| bounded(v.checked_mul(n)).map(|e| (k.clone(), e)))
            .collect::<Option<BTreeMap<String, i32>>>()?;
        out.retain(|_, v| *v != 0);
        Some(UnitsContainer(out))
    }

    /// Render with each token passed through `label`, numerator first:
    /// `a * b ** 2 / c`.
    pub fn render(&self, label: impl Fn(&str) -> String) -> String {
        let term = |token: &str, exp: u32| {
            if exp == 1 {
                label(token)
            } else {
                format!("{} ** {}", label(token), exp)
            }
        };
        let num: Vec<String> = self
            .0
            .iter()
            .filter(|(_, e)| **e > 0)
            .map(|(k, e)| term(k, e.unsigned_abs()))
            .collect();
        let den: Vec<String> = self
            .0
            .iter()
            .filter(|(_, e)| **e < 0)
            .map(|(k, e)| term(k, e.unsigned_abs()))
            .collect();

        let mut out = if num.is_empty() {
            "1".to_string()
        } else {
            num.join(" * ")
        };
        for d in den {
            out.push_str(" / ");
            out.push_str(&d);
        }
        out
    }
}

impl fmt::Display for UnitsContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(|t| t.to_string()))
    }
}

/// A magnitude with units.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub magnitude: f64,
    pub units: UnitsContainer,
}

impl Quantity {
    pub fn new(magnitude: f64, units: UnitsContainer) -> Self {
        Self { magnitude, units }
    }

    /// Bare number without units.
    pub fn scalar(magnitude: f64) -> Self {
        Self::new(magnitude, UnitsContainer::new())
    }

    /// One of `token`.
    pub fn unit(token: impl Into<String>) -> Self {
        Self::new(1.0, UnitsContainer::single(token))
    }

    /// True when no unit tokens remain (not the same as dimensionless:
    /// `m / km` has tokens but no dimension).
    pub fn is_unitless(&self) -> bool {
        self.units.is_empty()
    }

    pub fn powi(&self, n: i32) -> Quantity {
        Quantity::new(self.magnitude.powi(n), self.units.powi(n))
    }

    pub fn checked_mul(&self, rhs: &Quantity) -> Option<Quantity> {
        let units = self.units.checked_mul(&rhs.units)?;
        Some(Quantity::new(self.magnitude * rhs.magnitude, units))
    }

    pub fn checked_div(&self, rhs: &Quantity) -> Option<Quantity> {
        let units = self.units.checked_div(&rhs.units)?;
        Some(Quantity::new(self.magnitude / rhs.magnitude, units))
    }

    pub fn checked_powi(&self, n: i32) -> Option<Quantity> {
        let units = self.units.checked_powi(n)?;
        Some(Quantity::new(self.magnitude.powi(n), units))
    }
}

impl Mul for Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.magnitude * rhs.magnitude, self.units.mul(&rhs.units))
    }
}

impl Div for Quantity {
    type Output = Quantity;

    fn div(self, rhs: Quantity) -> Quantity {
        Quantity::new(self.magnitude / rhs.magnitude, self.units.div(&rhs.units))
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity::new(-self.magnitude, self.units)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.units)
        }
    }
}
