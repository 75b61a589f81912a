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
    any::TypeId,
    fmt::{Debug, Display, Formatter},
};

use crate::{
    exports::{Decimal, HostArray},
    runtime::TypeKey,
};

/// A coercion target: the declared type of a parameter, field, property or
/// return value.
///
/// Overload resolution checks every supplied argument against the
/// corresponding parameter's TypeHint, and the marshaling layer uses the same
/// hints to convert guest values into the exact representation the host
/// member expects.
///
/// The [Display] implementation prints the type the way it appears in error
/// messages and signatures (e.g., `"u8"`, `"Point?"`, `"[i32]"`).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeHint {
    /// Accepts any value, including nil.
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Decimal,
    /// A string of exactly one character.
    Char,
    String,
    /// An opaque pointer-sized token.
    Light,
    Table,
    Function,
    Thread,
    /// A reference to a host type itself (a static scope object).
    Type,
    /// An instance of the host type or of any of its descendants.
    Host(TypeKey),
    /// The inner type, or nil.
    Nullable(Box<TypeHint>),
    /// A [HostArray] whose elements have the inner type.
    Array(Box<TypeHint>),
}

impl Display for TypeHint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nullable(inner) => formatter.write_fmt(format_args!("{inner}?")),
            Self::Array(element) => formatter.write_fmt(format_args!("[{element}]")),
            Self::Host(key) => formatter.write_str(key.name()),
            other => formatter.write_str(other.primitive_name()),
        }
    }
}

impl From<TypeKey> for TypeHint {
    #[inline(always)]
    fn from(value: TypeKey) -> Self {
        Self::of_type(value)
    }
}

impl TypeHint {
    /// Returns the hint accepting values of the `key` type.
    ///
    /// Rust primitives map to their dedicated variants, so a primitive type
    /// key passed as a generic type argument coerces the same way a
    /// statically declared parameter does.
    pub fn of_type(key: TypeKey) -> Self {
        let id = key.id();

        let primitives = [
            (TypeId::of::<bool>(), Self::Bool),
            (TypeId::of::<i8>(), Self::I8),
            (TypeId::of::<i16>(), Self::I16),
            (TypeId::of::<i32>(), Self::I32),
            (TypeId::of::<i64>(), Self::I64),
            (TypeId::of::<isize>(), Self::Isize),
            (TypeId::of::<u8>(), Self::U8),
            (TypeId::of::<u16>(), Self::U16),
            (TypeId::of::<u32>(), Self::U32),
            (TypeId::of::<u64>(), Self::U64),
            (TypeId::of::<usize>(), Self::Usize),
            (TypeId::of::<f32>(), Self::F32),
            (TypeId::of::<f64>(), Self::F64),
            (TypeId::of::<char>(), Self::Char),
            (TypeId::of::<String>(), Self::String),
            (TypeId::of::<Decimal>(), Self::Decimal),
        ];

        for (primitive, hint) in primitives {
            if primitive == id {
                return hint;
            }
        }

        if id == TypeId::of::<HostArray>() {
            return Self::Array(Box::new(Self::Any));
        }

        Self::Host(key)
    }

    /// Wraps this hint into [TypeHint::Nullable] unless it already accepts
    /// nil.
    #[inline]
    pub fn nullable(self) -> Self {
        match self {
            Self::Any | Self::Nullable(_) => self,
            other => Self::Nullable(Box::new(other)),
        }
    }

    /// Returns true for integer and floating-point targets, and Decimal.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::F32 | Self::F64 | Self::Decimal)
    }

    /// Returns true for integer targets.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::Isize
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::Usize
        )
    }

    fn primitive_name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "Decimal",
            Self::Char => "char",
            Self::String => "String",
            Self::Light => "light",
            Self::Table => "table",
            Self::Function => "function",
            Self::Thread => "thread",
            Self::Type => "type",
            Self::Host(_) | Self::Nullable(_) | Self::Array(_) => "",
        }
    }
}
