//! Monto de token en punto fijo.
//!
//! `TokenAmount` envuelve un `U256` en unidades de 1e-18 (la escala de los
//! tokens ERC-20 on-chain). Toda la aritmética interna es exacta sobre
//! enteros; el redondeo sólo se aplica en los bordes de presentación
//! (`round_dp`, `to_string_dp`).
use alloy_primitives::utils::{format_units, parse_units, ParseUnits};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Dígitos de fracción de la representación interna.
pub const AMOUNT_DECIMALS: u8 = 18;
const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(U256);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(U256::ZERO);

    /// Monto a partir de unidades mínimas (wei).
    pub const fn from_wei(wei: U256) -> Self {
        TokenAmount(wei)
    }

    pub const fn wei(self) -> U256 {
        self.0
    }

    pub fn from_whole(units: u64) -> Self {
        TokenAmount(U256::from(units) * SCALE)
    }

    /// Parsea un decimal como `"2.50"`. Rechaza signos, exponentes y más de
    /// 18 dígitos de fracción.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let s = input.trim();
        let invalid = || DomainError::InvalidAmount(input.to_string());
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) || frac_part.len() > usize::from(AMOUNT_DECIMALS) {
            return Err(invalid());
        }
        match parse_units(s, AMOUNT_DECIMALS).map_err(|_| invalid())? {
            ParseUnits::U256(wei) => Ok(TokenAmount(wei)),
            ParseUnits::I256(_) => Err(invalid()),
        }
    }

    /// Convierte un `f64` (sliders de recursos) pasando por su forma decimal
    /// con 9 dígitos, suficiente para valores redondeados a 1 decimal.
    pub fn from_f64(value: f64) -> Result<Self, DomainError> {
        if !value.is_finite() || value < 0.0 {
            return Err(DomainError::InvalidAmount(value.to_string()));
        }
        Self::parse(&format!("{value:.9}"))
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: TokenAmount) -> Result<TokenAmount, DomainError> {
        self.0.checked_add(other.0).map(TokenAmount).ok_or(DomainError::Overflow("add"))
    }

    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }

    pub fn saturating_sub(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_sub(other.0))
    }

    /// Producto en punto fijo; trunca por debajo de 1e-18.
    pub fn checked_mul(self, other: TokenAmount) -> Result<TokenAmount, DomainError> {
        self.0
            .checked_mul(other.0)
            .map(|v| TokenAmount(v / SCALE))
            .ok_or(DomainError::Overflow("mul"))
    }

    /// `self × rate / 100`, con `rate` expresado en porcentaje (`1` = 1%).
    pub fn percent(self, rate: TokenAmount) -> Result<TokenAmount, DomainError> {
        Ok(TokenAmount(self.checked_mul(rate)?.0 / U256::from(100u64)))
    }

    /// Redondeo half-up a `dp` dígitos de fracción.
    pub fn round_dp(self, dp: u32) -> TokenAmount {
        let decimals = u32::from(AMOUNT_DECIMALS);
        if dp >= decimals {
            return self;
        }
        let unit = U256::from(10u128.pow(decimals - dp));
        let rem = self.0 % unit;
        let base = self.0 - rem;
        if rem >= unit - rem {
            TokenAmount(base.saturating_add(unit))
        } else {
            TokenAmount(base)
        }
    }

    /// Representación para UI: redondea una sola vez y elimina ceros finales.
    pub fn to_string_dp(self, dp: u32) -> String {
        self.round_dp(dp).to_string()
    }

    pub fn sum<I>(iter: I) -> Result<TokenAmount, DomainError>
        where I: IntoIterator<Item = TokenAmount>
    {
        iter.into_iter().try_fold(TokenAmount::ZERO, |acc, v| acc.checked_add(v))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = format_units(self.0, AMOUNT_DECIMALS).map_err(|_| fmt::Error)?;
        match full.split_once('.') {
            Some((int, frac)) if frac.bytes().any(|b| b != b'0') => write!(f, "{int}.{}", frac.trim_end_matches('0')),
            Some((int, _)) => f.write_str(int),
            None => f.write_str(&full),
        }
    }
}

impl FromStr for TokenAmount {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenAmount::parse(s)
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = DomainError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenAmount::parse(&value)
    }
}

impl From<TokenAmount> for String {
    fn from(value: TokenAmount) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> TokenAmount {
        TokenAmount::parse(s).unwrap()
    }

    #[test]
    fn parse_and_display_trim_trailing_zeros() {
        assert_eq!(amt("2.50").to_string(), "2.5");
        assert_eq!(amt("0").to_string(), "0");
        assert_eq!(amt("10").to_string(), "10");
        assert_eq!(amt("0.000000000000000001").wei(), U256::from(1u64));
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "-5", "1e3", "abc", ".5", "1.2.3", "0.0000000000000000001"] {
            assert!(TokenAmount::parse(s).is_err(), "{s} debería rechazarse");
        }
    }

    #[test]
    fn percent_of_price_is_exact() {
        let fee = amt("4.25").percent(amt("1")).unwrap();
        assert_eq!(fee, amt("0.0425"));
    }

    #[test]
    fn mul_handles_large_operands() {
        let big = amt("1000000");
        let rate = amt("2500.5");
        assert_eq!(big.checked_mul(rate).unwrap(), amt("2500500000"));
        // el producto intermedio no cabe en u128
        let huge = amt("100000000000000000000");
        assert_eq!(huge.checked_mul(huge).unwrap().to_string(), format!("1{}", "0".repeat(40)));
    }

    #[test]
    fn round_half_up() {
        assert_eq!(amt("1.005").round_dp(2), amt("1.01"));
        assert_eq!(amt("1.004").round_dp(2), amt("1"));
        assert_eq!(amt("4.2925").to_string_dp(2), "4.29");
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&amt("0.75")).unwrap();
        assert_eq!(json, "\"0.75\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amt("0.75"));
    }
}
