////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    error::Error as StdError,
    fmt::{Debug, Display, Formatter},
};

use crate::runtime::{
    coercion::{coerce, type_mismatch},
    ops::Operator,
    HostType,
    Invocation,
    NumberCastCause,
    RuntimeError,
    RuntimeResult,
    Signature,
    TypeBuilder,
    TypeHint,
    Upcast,
    Value,
};

/// The number of fractional decimal digits of [Decimal].
pub const FRACTIONAL_DIGITS: u32 = 9;

const SCALE: i128 = 10i128.pow(FRACTIONAL_DIGITS);

/// A fixed-point decimal number with [FRACTIONAL_DIGITS] fractional digits.
///
/// Decimal is a host value type. Guest integers and numbers coerce to it
/// wherever a Decimal is expected, so `price + 1` and `price * 0.5` work
/// through the type's operator overloads.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(i128);

impl Debug for Decimal {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Decimal {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let sign = match self.0 < 0 {
            true => "-",
            false => "",
        };

        let magnitude = self.0.unsigned_abs();
        let scale = SCALE as u128;
        let integer = magnitude / scale;
        let fraction = magnitude % scale;

        if fraction == 0 {
            return formatter.write_fmt(format_args!("{sign}{integer}"));
        }

        let digits = format!("{fraction:0width$}", width = FRACTIONAL_DIGITS as usize);

        formatter.write_fmt(format_args!(
            "{sign}{integer}.{}",
            digits.trim_end_matches('0')
        ))
    }
}

impl Decimal {
    pub const ZERO: Self = Self(0);

    pub const ONE: Self = Self(SCALE);

    /// Converts an integer. Every 64-bit integer is representable.
    #[inline(always)]
    pub fn from_integer(value: i64) -> Self {
        Self(value as i128 * SCALE)
    }

    /// Converts a floating-point number, rounding it to the nearest
    /// representable Decimal.
    pub fn from_number(value: f64) -> RuntimeResult<Self> {
        let cause = match value {
            _ if value.is_nan() => Some(NumberCastCause::NAN),
            _ if value.is_infinite() => Some(NumberCastCause::Infinite),
            _ => None,
        };

        let scaled = (value * SCALE as f64).round();

        let cause = cause.or_else(|| match scaled {
            _ if scaled >= i128::MAX as f64 => Some(NumberCastCause::Overflow),
            _ if scaled <= i128::MIN as f64 => Some(NumberCastCause::Underflow),
            _ => None,
        });

        match cause {
            None => Ok(Self(scaled as i128)),

            Some(cause) => Err(RuntimeError::NumberCast {
                from: "number",
                to: "Decimal",
                cause,
                value: value.to_string(),
            }),
        }
    }

    /// Constructs a Decimal from its scaled integer representation.
    #[inline(always)]
    pub fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// The scaled integer representation: the value multiplied by
    /// 10^[FRACTIONAL_DIGITS].
    #[inline(always)]
    pub fn raw(&self) -> i128 {
        self.0
    }

    /// The nearest floating-point number.
    #[inline(always)]
    pub fn to_number(&self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// Returns the integer part if the value has no fractional part and fits
    /// 64 bits.
    #[inline]
    pub fn to_integer(&self) -> Option<i64> {
        if self.0 % SCALE != 0 {
            return None;
        }

        i64::try_from(self.0 / SCALE).ok()
    }

    #[inline]
    pub fn checked_add(self, other: Self) -> Result<Self, DecimalError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(DecimalError::Overflow)
    }

    #[inline]
    pub fn checked_sub(self, other: Self) -> Result<Self, DecimalError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(DecimalError::Overflow)
    }

    pub fn checked_mul(self, other: Self) -> Result<Self, DecimalError> {
        let product = self.0.checked_mul(other.0).ok_or(DecimalError::Overflow)?;

        Ok(Self(product / SCALE))
    }

    pub fn checked_div(self, other: Self) -> Result<Self, DecimalError> {
        if other.0 == 0 {
            return Err(DecimalError::DivisionByZero);
        }

        let dividend = self.0.checked_mul(SCALE).ok_or(DecimalError::Overflow)?;

        Ok(Self(dividend / other.0))
    }

    pub fn checked_rem(self, other: Self) -> Result<Self, DecimalError> {
        if other.0 == 0 {
            return Err(DecimalError::DivisionByZero);
        }

        Ok(Self(self.0 % other.0))
    }

    #[inline]
    pub fn checked_neg(self) -> Result<Self, DecimalError> {
        self.0.checked_neg().map(Self).ok_or(DecimalError::Overflow)
    }
}

/// An arithmetic failure of [Decimal] operators.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecimalError {
    Overflow,
    DivisionByZero,
}

impl Display for DecimalError {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overflow => formatter.write_str("decimal overflow"),
            Self::DivisionByZero => formatter.write_str("decimal division by zero"),
        }
    }
}

impl StdError for DecimalError {}

impl HostType for Decimal {
    const NAME: &'static str = "Decimal";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.value_type();

        let _ = ty.constructor(
            Signature::new().param_hint("value", TypeHint::Decimal),
            |invocation| Ok(invocation.value(0)),
        );

        let _ = ty.getter("Number", |this: &Decimal| this.to_number());

        let _ = ty.getter("Integer", |this: &Decimal| this.to_integer());

        let _ = ty.constant("Zero", || Decimal::ZERO);

        let _ = ty.constant("One", || Decimal::ONE);

        let binary = Signature::new()
            .param_hint("lhs", TypeHint::Decimal)
            .param_hint("rhs", TypeHint::Decimal)
            .returns::<Decimal>();

        let comparison = Signature::new()
            .param_hint("lhs", TypeHint::Decimal)
            .param_hint("rhs", TypeHint::Decimal)
            .returns::<bool>();

        let _ = ty.operator(Operator::Addition, binary.clone(), |invocation| {
            arithmetic(invocation, Decimal::checked_add)
        });

        let _ = ty.operator(Operator::Subtraction, binary.clone(), |invocation| {
            arithmetic(invocation, Decimal::checked_sub)
        });

        let _ = ty.operator(Operator::Multiply, binary.clone(), |invocation| {
            arithmetic(invocation, Decimal::checked_mul)
        });

        let _ = ty.operator(Operator::Division, binary.clone(), |invocation| {
            arithmetic(invocation, Decimal::checked_div)
        });

        let _ = ty.operator(Operator::Modulus, binary, |invocation| {
            arithmetic(invocation, Decimal::checked_rem)
        });

        let _ = ty.operator(
            Operator::UnaryNegation,
            Signature::new()
                .param_hint("operand", TypeHint::Decimal)
                .returns::<Decimal>(),
            |invocation| {
                let operand = invocation.argument::<Decimal>(0)?;

                operand.checked_neg().map_err(RuntimeError::host)?.upcast()
            },
        );

        let _ = ty.operator(Operator::Equality, comparison.clone(), |invocation| {
            compare(invocation, |lhs, rhs| lhs == rhs)
        });

        let _ = ty.operator(Operator::LessThan, comparison.clone(), |invocation| {
            compare(invocation, |lhs, rhs| lhs < rhs)
        });

        let _ = ty.operator(Operator::LessThanOrEqual, comparison, |invocation| {
            compare(invocation, |lhs, rhs| lhs <= rhs)
        });

        let _ = ty.display(|this| this.to_string());
    }
}

impl crate::runtime::Downcast for Decimal {
    fn downcast(value: Value) -> RuntimeResult<Self> {
        let Some(decimal) = coerce(&value, &TypeHint::Decimal) else {
            return Err(type_mismatch(&TypeHint::Decimal, &value));
        };

        match decimal.as_object() {
            Some(object) => object.get::<Decimal>(),
            None => Err(type_mismatch(&TypeHint::Decimal, &value)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Decimal
    }
}

impl Upcast for Decimal {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::host(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Decimal
    }
}

fn arithmetic(
    invocation: &mut Invocation<'_>,
    operation: fn(Decimal, Decimal) -> Result<Decimal, DecimalError>,
) -> RuntimeResult<Value> {
    let lhs = invocation.argument::<Decimal>(0)?;
    let rhs = invocation.argument::<Decimal>(1)?;

    operation(lhs, rhs).map_err(RuntimeError::host)?.upcast()
}

fn compare(
    invocation: &mut Invocation<'_>,
    predicate: fn(&Decimal, &Decimal) -> bool,
) -> RuntimeResult<Value> {
    let lhs = invocation.argument::<Decimal>(0)?;
    let rhs = invocation.argument::<Decimal>(1)?;

    Ok(Value::Boolean(predicate(&lhs, &rhs)))
}

#[cfg(test)]
mod tests {
    use crate::exports::{Decimal, DecimalError};

    #[test]
    fn test_decimal_display() {
        assert_eq!(Decimal::from_integer(-3).to_string(), "-3");
        assert_eq!(Decimal::from_number(1.5).unwrap().to_string(), "1.5");
        assert_eq!(Decimal::from_number(-0.25).unwrap().to_string(), "-0.25");
        assert_eq!(Decimal::ZERO.to_string(), "0");
    }

    #[test]
    fn test_decimal_arithmetic() {
        let half = Decimal::from_number(0.5).unwrap();
        let three = Decimal::from_integer(3);

        assert_eq!(three.checked_mul(half).unwrap(), Decimal::from_number(1.5).unwrap());
        assert_eq!(three.checked_div(half).unwrap(), Decimal::from_integer(6));
        assert_eq!(three.checked_rem(Decimal::from_integer(2)).unwrap(), Decimal::ONE);
        assert_eq!(three.checked_div(Decimal::ZERO), Err(DecimalError::DivisionByZero));
        assert_eq!(Decimal::from_integer(6).to_integer(), Some(6));
        assert_eq!(half.to_integer(), None);
    }

    #[test]
    fn test_decimal_from_number() {
        assert!(Decimal::from_number(f64::NAN).is_err());
        assert!(Decimal::from_number(f64::INFINITY).is_err());
        assert!(Decimal::from_number(1e40).is_err());
    }
}
