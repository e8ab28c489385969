//! Value objects for the order domain.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Identifier of the purchasing user. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    pub fn new(value: i64) -> Result<Self, OrderError> {
        if value <= 0 {
            return Err(OrderError::validation(
                "user id",
                format!("{value} is not a positive integer"),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for UserId {
    type Error = OrderError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the purchased product. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ProductId(i64);

impl ProductId {
    pub fn new(value: i64) -> Result<Self, OrderError> {
        if value <= 0 {
            return Err(OrderError::validation(
                "product id",
                format!("{value} is not a positive integer"),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ProductId {
    type Error = OrderError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductId> for i64 {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative money amount with two decimal places, held as integer cents.
///
/// Decimal input is normalized to cents with half-up rounding, so `19.995`
/// becomes `20.00` and `0.004` becomes `0.00`. Serializes as a decimal string
/// (`"20.00"`) so no precision is lost in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Result<Self, OrderError> {
        if cents < 0 {
            return Err(Self::negative(format!("{cents} cents")));
        }
        Ok(Self { cents })
    }

    /// Creates an amount from a floating point value such as a JSON number.
    ///
    /// The value is rounded through its shortest decimal representation, the
    /// same digits a person would type, so `19.995` rounds up even though the
    /// nearest binary double is slightly below it.
    pub fn from_decimal(amount: f64) -> Result<Self, OrderError> {
        if !amount.is_finite() {
            return Err(OrderError::validation(
                "amount",
                format!("{amount} is not a finite number"),
            ));
        }
        if amount < 0.0 {
            return Err(Self::negative(amount.to_string()));
        }
        format!("{}", amount.abs()).parse::<Money>()
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Lossy conversion for wire formats that carry amounts as JSON numbers.
    pub fn to_f64(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    fn negative(amount: String) -> OrderError {
        OrderError::validation("amount", format!("{amount} is negative"))
    }

    fn malformed(input: &str) -> OrderError {
        OrderError::validation("amount", format!("'{input}' is not a decimal number"))
    }

    fn too_large(input: &str) -> OrderError {
        OrderError::validation("amount", format!("{input} is too large"))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Money {
    type Err = OrderError;

    /// Parses a plain decimal string such as `"12"` or `"12.505"`, rounding
    /// half away from zero to whole cents.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(input.trim()).map_err(|_| Self::malformed(input))?;
        if amount < Decimal::ZERO {
            return Err(Self::negative(input.trim().to_string()));
        }

        let mut cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        cents.rescale(2);
        let cents = i64::try_from(cents.mantissa()).map_err(|_| Self::too_large(input))?;

        Ok(Self { cents })
    }
}

impl TryFrom<String> for Money {
    type Error = OrderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.to_string()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}
