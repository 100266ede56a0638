//! Asset amounts and display/raw conversion
//!
//! Amounts travel through the gateway in the chain's smallest unit (wei,
//! lamports, satoshi) and are converted to human-readable strings only at
//! the edges. Decimal precision comes from per-chain asset configuration.

use crate::config::AssetConfig;
use crate::error::{GatewayError, GatewayResult};

use serde::Serialize;

/// Decimal convention for one asset on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub decimals: u8,
}

impl AssetSpec {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }
}

impl From<&AssetConfig> for AssetSpec {
    fn from(config: &AssetConfig) -> Self {
        Self::new(config.symbol.clone(), config.decimals)
    }
}

/// An asset quantity in smallest units, tagged with its spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetAmount {
    pub raw: u128,
    pub spec: AssetSpec,
}

impl AssetAmount {
    /// Wrap a raw smallest-unit magnitude
    pub fn from_raw(raw: u128, spec: AssetSpec) -> Self {
        Self { raw, spec }
    }

    /// Parse a human-readable amount (e.g. "1.5") into smallest units.
    ///
    /// Rejects negative amounts, non-numeric input, and more fractional
    /// digits than the asset's decimal precision.
    pub fn parse(display: &str, spec: &AssetSpec) -> GatewayResult<Self> {
        let input = display.trim();

        if input.is_empty() {
            return Err(malformed(display, "empty amount"));
        }
        if input.starts_with('-') {
            return Err(malformed(display, "amount must not be negative"));
        }

        let parts: Vec<&str> = input.split('.').collect();
        if parts.len() > 2 {
            return Err(malformed(display, "invalid amount format"));
        }

        let whole = parts[0]
            .parse::<u128>()
            .map_err(|_| malformed(display, "invalid whole number"))?;

        let fractional = if parts.len() == 2 {
            let frac_str = parts[1];
            if frac_str.len() > spec.decimals as usize {
                return Err(malformed(
                    display,
                    &format!("too many decimal places (max {})", spec.decimals),
                ));
            }
            // Pad with zeros to match decimals
            let padded = format!("{:0<width$}", frac_str, width = spec.decimals as usize);
            if padded.is_empty() {
                0u128
            } else {
                padded
                    .parse::<u128>()
                    .map_err(|_| malformed(display, "invalid fractional part"))?
            }
        } else {
            0u128
        };

        let multiplier = 10u128.pow(u32::from(spec.decimals));
        let raw = whole
            .checked_mul(multiplier)
            .and_then(|w| w.checked_add(fractional))
            .ok_or_else(|| malformed(display, "amount out of range"))?;

        Ok(Self {
            raw,
            spec: spec.clone(),
        })
    }

    /// Render the canonical human-readable form (trailing zeros stripped)
    pub fn display(&self) -> String {
        if self.spec.decimals == 0 || self.raw == 0 {
            return self.raw.to_string();
        }

        let divisor = 10u128.pow(u32::from(self.spec.decimals));
        let whole = self.raw / divisor;
        let remainder = self.raw % divisor;

        if remainder == 0 {
            whole.to_string()
        } else {
            let frac = format!("{:0>width$}", remainder, width = self.spec.decimals as usize);
            format!("{}.{}", whole, frac.trim_end_matches('0'))
        }
    }
}

impl std::fmt::Display for AssetAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.display(), self.spec.symbol)
    }
}

fn malformed(amount: &str, message: &str) -> GatewayError {
    GatewayError::MalformedAmount {
        amount: amount.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth() -> AssetSpec {
        AssetSpec::new("ETH", 18)
    }

    fn usdc() -> AssetSpec {
        AssetSpec::new("USDC", 6)
    }

    #[test]
    fn test_parse_whole_number() {
        let amount = AssetAmount::parse("1", &eth()).unwrap();
        assert_eq!(amount.raw, 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_parse_fractional() {
        let amount = AssetAmount::parse("1.5", &eth()).unwrap();
        assert_eq!(amount.raw, 1_500_000_000_000_000_000);

        let amount = AssetAmount::parse("0.000001", &usdc()).unwrap();
        assert_eq!(amount.raw, 1);
    }

    #[test]
    fn test_parse_rejects_negative() {
        let err = AssetAmount::parse("-1", &eth()).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        let err = AssetAmount::parse("1.0000001", &usdc()).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        for input in ["abc", "1.2.3", "1,5", "", "  ", "1e18"] {
            let err = AssetAmount::parse(input, &eth()).unwrap_err();
            assert!(matches!(err, GatewayError::MalformedAmount { .. }), "{input}");
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let err = AssetAmount::parse("340282366920938463464", &eth()).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
    }

    #[test]
    fn test_display_strips_trailing_zeros() {
        let amount = AssetAmount::from_raw(1_500_000_000_000_000_000, eth());
        assert_eq!(amount.display(), "1.5");

        let amount = AssetAmount::from_raw(1_000_000, usdc());
        assert_eq!(amount.display(), "1");

        let amount = AssetAmount::from_raw(0, eth());
        assert_eq!(amount.display(), "0");
    }

    #[test]
    fn test_display_pads_leading_zeros() {
        let amount = AssetAmount::from_raw(1, eth());
        assert_eq!(amount.display(), "0.000000000000000001");
    }

    #[test]
    fn test_round_trip_canonical_forms() {
        for input in ["0", "1", "1.5", "0.05", "12.345678", "1234.000001"] {
            let amount = AssetAmount::parse(input, &usdc()).unwrap();
            assert_eq!(amount.display(), input, "{input}");
        }
    }

    #[test]
    fn test_non_canonical_input_canonicalized() {
        let amount = AssetAmount::parse("1.50", &eth()).unwrap();
        assert_eq!(amount.display(), "1.5");

        let amount = AssetAmount::parse("01.5", &eth()).unwrap();
        assert_eq!(amount.display(), "1.5");
    }

    #[test]
    fn test_display_includes_symbol() {
        let amount = AssetAmount::from_raw(1_230_000, usdc());
        assert_eq!(amount.to_string(), "1.23 USDC");
    }

    #[test]
    fn test_zero_decimals() {
        let spec = AssetSpec::new("UNIT", 0);
        let amount = AssetAmount::parse("42", &spec).unwrap();
        assert_eq!(amount.raw, 42);
        assert_eq!(amount.display(), "42");

        let err = AssetAmount::parse("1.5", &spec).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedAmount { .. }));
    }
}
