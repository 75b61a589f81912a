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

use std::fmt::{Debug, Formatter};

use crate::{
    exports::Decimal,
    runtime::{
        coercion::{coerce, type_mismatch},
        HostType,
        NumberCastCause,
        RuntimeError,
        RuntimeResult,
        Signature,
        TypeBuilder,
        TypeHint,
        TypeKey,
        Upcast,
        Value,
    },
};

/// The largest total number of elements of an array created with
/// [HostArray::new].
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// A host-side array of [Value]s with a fixed element type.
///
/// Arrays are created by the host (for example, by returning a `Vec<T>`
/// from a member body), by the overload resolution when it packs the
/// trailing arguments of a variadic call, and by the guest through the
/// `Array.create(elementType, dimensions...)` static method.
///
/// An array may have several dimensions. The guest indexes it with
/// zero-based integer keys: `array[i]` for one-dimensional arrays, and
/// `array[{i, j}]` for arrays of rank two and more. Every element stored in
/// the array is coerced to the element type first.
#[derive(Clone)]
pub struct HostArray {
    element: TypeHint,
    dimensions: Vec<usize>,
    elements: Vec<Value>,
}

impl Debug for HostArray {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HostArray")
            .field("element", &self.element)
            .field("dimensions", &self.dimensions)
            .field("elements", &self.elements)
            .finish()
    }
}

impl HostArray {
    /// Creates a one-dimensional array of the elements.
    ///
    /// The elements are expected to be canonical values of the `element`
    /// type already.
    #[inline]
    pub fn from_values(element: TypeHint, elements: Vec<Value>) -> Self {
        Self {
            element,
            dimensions: vec![elements.len()],
            elements,
        }
    }

    /// Creates an array of the specified dimensions filled with the default
    /// values of the element type.
    ///
    /// Numeric elements default to zero, boolean elements to false, and
    /// everything else to nil.
    ///
    /// Fails with [RuntimeError::ArrayTooLarge] if the total length
    /// overflows or exceeds [MAX_ARRAY_LENGTH].
    pub fn new(element: TypeHint, dimensions: Vec<usize>) -> RuntimeResult<Self> {
        let length = dimensions
            .iter()
            .try_fold(1usize, |length, dimension| length.checked_mul(*dimension))
            .filter(|length| *length <= MAX_ARRAY_LENGTH);

        let Some(length) = length else {
            return Err(RuntimeError::ArrayTooLarge {
                dimensions,
                limit: MAX_ARRAY_LENGTH,
            });
        };

        let default = default_of(&element);

        Ok(Self {
            element,
            dimensions,
            elements: vec![default; length],
        })
    }

    /// The element type.
    #[inline(always)]
    pub fn element(&self) -> &TypeHint {
        &self.element
    }

    /// All elements in row-major order.
    #[inline(always)]
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    #[inline(always)]
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// The number of dimensions.
    #[inline(always)]
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// The total number of elements.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the element at the zero-based coordinates.
    pub fn get(&self, coordinates: &[i64]) -> RuntimeResult<Value> {
        let offset = self.offset(coordinates)?;

        Ok(self.elements.get(offset).cloned().unwrap_or_default())
    }

    /// Replaces the element at the zero-based coordinates.
    ///
    /// The value is coerced to the element type.
    pub fn set(&mut self, coordinates: &[i64], value: Value) -> RuntimeResult<()> {
        let offset = self.offset(coordinates)?;

        let Some(value) = coerce(&value, &self.element) else {
            return Err(type_mismatch(&self.element, &value));
        };

        if let Some(slot) = self.elements.get_mut(offset) {
            *slot = value;
        }

        Ok(())
    }

    fn offset(&self, coordinates: &[i64]) -> RuntimeResult<usize> {
        if coordinates.len() != self.dimensions.len() {
            return Err(RuntimeError::RankMismatch {
                expected: self.dimensions.len(),
                actual: coordinates.len(),
            });
        }

        let mut offset = 0;

        for (index, length) in coordinates.iter().zip(&self.dimensions) {
            let position = match usize::try_from(*index) {
                Ok(position) if position < *length => position,

                _ => {
                    return Err(RuntimeError::OutOfBounds {
                        index: *index,
                        length: *length,
                    })
                }
            };

            offset = offset * length + position;
        }

        Ok(offset)
    }
}

impl HostType for HostArray {
    const NAME: &'static str = "Array";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.getter("Length", |this: &HostArray| this.len());

        let _ = ty.getter("Rank", |this: &HostArray| this.rank());

        let _ = ty.method(
            "GetLength",
            Signature::new().param::<usize>("dimension").returns::<usize>(),
            |invocation| {
                let dimension = invocation.argument::<usize>(0)?;

                let length = invocation.with_receiver(|this: &HostArray| {
                    this.dimensions.get(dimension).copied()
                })?;

                match length {
                    Some(length) => length.upcast(),

                    None => Err(RuntimeError::OutOfBounds {
                        index: dimension as i64,
                        length: invocation.with_receiver(|this: &HostArray| this.rank())?,
                    }),
                }
            },
        );

        let _ = ty.static_method(
            "create",
            Signature::new()
                .param::<TypeKey>("elementType")
                .variadic::<i64>("dimensions")
                .returns::<HostArray>(),
            |invocation| {
                let element = invocation.argument::<TypeKey>(0)?;
                let lengths = invocation.argument::<Vec<i64>>(1)?;

                let mut dimensions = Vec::with_capacity(lengths.len());

                for length in lengths {
                    match cast::usize(length) {
                        Ok(length) => dimensions.push(length),

                        Err(error) => {
                            return Err(RuntimeError::NumberCast {
                                from: "integer",
                                to: "usize",
                                cause: NumberCastCause::from(error),
                                value: length.to_string(),
                            })
                        }
                    }
                }

                if dimensions.is_empty() {
                    dimensions.push(0);
                }

                Ok(Value::host(HostArray::new(element.hint(), dimensions)?))
            },
        );

        let _ = ty.display(|this| {
            let dimensions = this
                .dimensions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");

            format!("[{}; {dimensions}]", this.element)
        });
    }
}

impl Upcast for HostArray {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::host(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Array(Box::new(TypeHint::Any))
    }
}

fn default_of(element: &TypeHint) -> Value {
    match element {
        TypeHint::Bool => Value::Boolean(false),
        TypeHint::F32 | TypeHint::F64 => Value::Number(0.0),
        TypeHint::Decimal => Value::host(Decimal::ZERO),
        hint if hint.is_integer() => Value::Integer(0),
        _ => Value::Nil,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exports::{HostArray, MAX_ARRAY_LENGTH},
        runtime::{RuntimeError, TypeHint, Value},
    };

    #[test]
    fn test_array_defaults() {
        let array = HostArray::new(TypeHint::I32, vec![2, 3]).unwrap();

        assert_eq!(array.len(), 6);
        assert_eq!(array.rank(), 2);
        assert_eq!(array.get(&[1, 2]).unwrap(), Value::Integer(0));

        let array = HostArray::new(TypeHint::String, vec![1]).unwrap();

        assert_eq!(array.get(&[0]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_array_row_major() {
        let mut array = HostArray::new(TypeHint::I64, vec![2, 3]).unwrap();

        array.set(&[1, 0], Value::Integer(7)).unwrap();

        assert_eq!(array.elements()[3], Value::Integer(7));
        assert_eq!(array.get(&[1, 0]).unwrap(), Value::Integer(7));
    }

    #[test]
    fn test_array_bounds() {
        let mut array = HostArray::from_values(TypeHint::I64, vec![Value::Integer(1)]);

        assert!(matches!(
            array.get(&[1]),
            Err(RuntimeError::OutOfBounds { index: 1, length: 1 }),
        ));

        assert!(matches!(
            array.get(&[-1]),
            Err(RuntimeError::OutOfBounds { index: -1, length: 1 }),
        ));

        assert!(matches!(
            array.get(&[0, 0]),
            Err(RuntimeError::RankMismatch { expected: 1, actual: 2 }),
        ));

        assert!(matches!(
            array.set(&[0], Value::from("text")),
            Err(RuntimeError::TypeMismatch { .. }),
        ));
    }

    #[test]
    fn test_array_element_coercion() {
        let mut array = HostArray::new(TypeHint::F64, vec![1]).unwrap();

        array.set(&[0], Value::Integer(2)).unwrap();

        assert_eq!(array.get(&[0]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_array_length_limit() {
        let array = HostArray::new(TypeHint::I64, vec![0, usize::MAX]).unwrap();

        assert!(array.is_empty());

        assert!(matches!(
            HostArray::new(TypeHint::I64, vec![1 << 33, 1 << 33]),
            Err(RuntimeError::ArrayTooLarge { .. }),
        ));

        assert!(matches!(
            HostArray::new(TypeHint::I64, vec![usize::MAX, 2]),
            Err(RuntimeError::ArrayTooLarge { .. }),
        ));

        assert!(matches!(
            HostArray::new(TypeHint::Bool, vec![MAX_ARRAY_LENGTH + 1]),
            Err(RuntimeError::ArrayTooLarge { limit: MAX_ARRAY_LENGTH, .. }),
        ));
    }
}
