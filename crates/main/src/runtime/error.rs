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
    result::Result as StdResult,
    sync::Arc,
};

use compact_str::CompactString;

use mlua::Error as LuaError;

use crate::runtime::{ops::Operator, thunk::Scope, EngineId, GuestKind};

/// A result of a runtime API call, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// A broad classification of [RuntimeError] variants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ErrorCategory {
    /// A member, overload, index or generic instantiation cannot be
    /// resolved.
    Resolution,

    /// A value is incompatible with the target type.
    Coercion,

    /// The host member itself failed.
    Invocation,

    /// A guest object wrapper was used outside of its engine instance or
    /// after release.
    Lifetime,
}

/// Kind of access that failed to borrow host object data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Access {
    Read,
    Write,
}

/// Represents any error that may occur while the guest runtime interacts with
/// host types and objects.
///
/// Errors raised inside guest-initiated operations are delivered to the guest
/// as external [mlua::Error]s whose message is this object's [Display]
/// output. Converting such an error back into a RuntimeError recovers the
/// original object, even if the error passed through guest frames.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The guest accesses a member name that the type does not declare.
    UnknownMember {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// Whether the access targets the type or its instance.
        scope: Scope,

        /// The requested name.
        member: CompactString,

        /// The closest declared name, if any is similar enough.
        suggestion: Option<CompactString>,
    },

    /// None of the overloads accept the supplied arguments.
    NoMatchingOverload {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The name of the callee. Empty for constructors.
        member: CompactString,

        /// Type names of the supplied arguments.
        arguments: Vec<&'static str>,
    },

    /// The key type cannot address anything in the receiver.
    InvalidKey {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The type name of the key.
        key: &'static str,
    },

    /// An array index is out of bounds.
    OutOfBounds {
        /// The requested index.
        index: i64,

        /// The length of the indexed dimension.
        length: usize,
    },

    /// The total length of a new array overflows or exceeds the limit.
    ArrayTooLarge {
        /// The requested dimensions.
        dimensions: Vec<usize>,

        /// The largest allowed total length.
        limit: usize,
    },

    /// A multi-dimensional array is indexed with a wrong number of
    /// coordinates.
    RankMismatch {
        /// The number of array dimensions.
        expected: usize,

        /// The number of supplied coordinates.
        actual: usize,
    },

    /// The guest writes a member that does not provide write access.
    ReadOnly {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The name of the member.
        member: CompactString,
    },

    /// The guest reads a property that only provides write access.
    WriteOnly {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The name of the member.
        member: CompactString,
    },

    /// The guest assigns to a member that is not a storage location.
    NotAssignable {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The name of the member.
        member: CompactString,

        /// The kind of the member.
        kind: &'static str,
    },

    /// The guest calls an object that does not support invocation.
    NotCallable {
        /// The name of the receiver type.
        receiver_type: &'static str,
    },

    /// A generic type definition is called with a wrong number of type
    /// arguments.
    GenericArity {
        /// The name of the generic type.
        receiver_type: &'static str,

        /// The number of type parameters.
        expected: usize,

        /// The number of supplied arguments.
        actual: usize,
    },

    /// A generic type definition does not accept the supplied type arguments.
    GenericInstantiation {
        /// The name of the generic type.
        receiver_type: &'static str,

        /// Names of the supplied type arguments.
        arguments: Vec<&'static str>,
    },

    /// The receiver type does not overload the operator.
    UndefinedOperator {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The operator.
        operator: Operator,
    },

    /// A value cannot be converted into the expected type.
    TypeMismatch {
        /// A description of the expected type.
        expected: String,

        /// The type name of the provided value.
        actual: &'static str,
    },

    /// A number cannot be represented by the target numeric type.
    NumberCast {
        /// The source type name.
        from: &'static str,

        /// The destination type name.
        to: &'static str,

        /// The cause of the failure.
        cause: NumberCastCause,

        /// The source value, formatted.
        value: String,
    },

    /// Host object data is already borrowed in a conflicting way.
    BorrowConflict {
        /// The name of the object's type.
        receiver_type: &'static str,

        /// The access that failed.
        access: Access,
    },

    /// A host member panicked.
    HostPanic {
        /// The name of the receiver type.
        receiver_type: &'static str,

        /// The name of the member.
        member: CompactString,

        /// The panic message, if it was a string.
        message: String,
    },

    /// A host member returned an explicit error.
    Host {
        /// The error returned by the host.
        cause: Arc<dyn StdError + Send + Sync + 'static>,
    },

    /// A guest function called by the host raised an error.
    Guest {
        /// The guest error message.
        message: String,
    },

    /// A guest object wrapper is used with an engine instance that did not
    /// create it.
    ForeignEngine {
        /// The engine that created the wrapper.
        owner: EngineId,

        /// The engine the wrapper was used with.
        current: EngineId,
    },

    /// A guest object wrapper is used after it was explicitly released.
    Released {
        /// The kind of the released object.
        kind: GuestKind,
    },

    /// The guest state is not attached to an engine instance.
    Detached,

    /// The guest value has no host representation.
    UnsupportedValue {
        /// The guest type name of the value.
        type_name: &'static str,
    },
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMember {
                receiver_type,
                scope,
                member,
                suggestion,
            } => {
                let scope = match scope {
                    Scope::Instance => "",
                    Scope::Static => "static ",
                };

                formatter.write_fmt(format_args!(
                    "type '{receiver_type}' does not have {scope}member '{member}'"
                ))?;

                match suggestion {
                    Some(suggestion) => {
                        formatter.write_fmt(format_args!(", did you mean '{suggestion}'?"))
                    }
                    None => Ok(()),
                }
            }

            Self::NoMatchingOverload {
                receiver_type,
                member,
                arguments,
            } => {
                let arguments = arguments.join(", ");

                match member.is_empty() {
                    true => formatter.write_fmt(format_args!(
                        "type '{receiver_type}' has no constructor matching arguments \
                        ({arguments})"
                    )),

                    false => formatter.write_fmt(format_args!(
                        "type '{receiver_type}' has no overload of '{member}' matching \
                        arguments ({arguments})"
                    )),
                }
            }

            Self::InvalidKey { receiver_type, key } => formatter.write_fmt(format_args!(
                "type '{receiver_type}' cannot be indexed by a {key} key"
            )),

            Self::OutOfBounds { index, length } => {
                formatter.write_fmt(format_args!("index {index} out of 0..{length} bounds"))
            }

            Self::ArrayTooLarge { dimensions, limit } => formatter.write_fmt(format_args!(
                "array dimensions {dimensions:?} exceed the limit of {limit} elements"
            )),

            Self::RankMismatch { expected, actual } => formatter.write_fmt(format_args!(
                "the array has {expected} dimensions, but {actual} indices provided"
            )),

            Self::ReadOnly {
                receiver_type,
                member,
            } => formatter.write_fmt(format_args!(
                "member '{member}' of type '{receiver_type}' is read-only"
            )),

            Self::WriteOnly {
                receiver_type,
                member,
            } => formatter.write_fmt(format_args!(
                "member '{member}' of type '{receiver_type}' is write-only"
            )),

            Self::NotAssignable {
                receiver_type,
                member,
                kind,
            } => formatter.write_fmt(format_args!(
                "cannot assign to {kind} '{member}' of type '{receiver_type}'"
            )),

            Self::NotCallable { receiver_type } => formatter.write_fmt(format_args!(
                "objects of type '{receiver_type}' are not callable"
            )),

            Self::GenericArity {
                receiver_type,
                expected,
                actual,
            } => formatter.write_fmt(format_args!(
                "generic type '{receiver_type}' requires {expected} type arguments, but \
                {actual} provided"
            )),

            Self::GenericInstantiation {
                receiver_type,
                arguments,
            } => {
                let arguments = arguments.join(", ");

                formatter.write_fmt(format_args!(
                    "generic type '{receiver_type}' cannot be instantiated with ({arguments})"
                ))
            }

            Self::UndefinedOperator {
                receiver_type,
                operator,
            } => formatter.write_fmt(format_args!(
                "type '{receiver_type}' does not implement {operator}"
            )),

            Self::TypeMismatch { expected, actual } => formatter.write_fmt(format_args!(
                "expected '{expected}', but '{actual}' data type provided"
            )),

            Self::NumberCast {
                from,
                to,
                cause,
                value,
            } => {
                use NumberCastCause::*;

                match cause {
                    Infinite => formatter.write_fmt(format_args!(
                        "cannot cast infinity value of {from} type to {to}"
                    )),

                    NAN => formatter
                        .write_fmt(format_args!("cannot cast NAN value of {from} type to {to}")),

                    Overflow | Underflow => formatter
                        .write_fmt(format_args!("cannot cast {value} {from} to {to} type")),
                }
            }

            Self::BorrowConflict {
                receiver_type,
                access,
            } => match access {
                Access::Read => formatter.write_fmt(format_args!(
                    "cannot read '{receiver_type}' object while it is being written"
                )),

                Access::Write => formatter.write_fmt(format_args!(
                    "cannot write '{receiver_type}' object while it is being accessed"
                )),
            },

            Self::HostPanic {
                receiver_type,
                member,
                message,
            } => formatter.write_fmt(format_args!(
                "'{receiver_type}.{member}' panicked: {message}"
            )),

            Self::Host { cause } => Display::fmt(cause, formatter),

            Self::Guest { message } => formatter.write_str(message),

            Self::ForeignEngine { owner, current } => formatter.write_fmt(format_args!(
                "guest object of engine {owner} used with engine {current}"
            )),

            Self::Released { kind } => {
                formatter.write_fmt(format_args!("guest {kind} wrapper has been released"))
            }

            Self::Detached => formatter.write_str("guest state is not attached to an engine"),

            Self::UnsupportedValue { type_name } => formatter.write_fmt(format_args!(
                "guest {type_name} value has no host representation"
            )),
        }
    }
}

impl StdError for RuntimeError {
    #[inline]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Host { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<RuntimeError> for LuaError {
    #[inline(always)]
    fn from(error: RuntimeError) -> Self {
        LuaError::external(error)
    }
}

impl From<LuaError> for RuntimeError {
    fn from(error: LuaError) -> Self {
        match error {
            LuaError::ExternalError(cause) => match cause.downcast_ref::<RuntimeError>() {
                Some(original) => original.clone(),
                None => Self::Host { cause },
            },

            LuaError::CallbackError { cause, .. } => Self::from(cause.as_ref().clone()),

            LuaError::RuntimeError(message) => Self::Guest { message },

            other => Self::Guest {
                message: other.to_string(),
            },
        }
    }
}

impl RuntimeError {
    /// Wraps an arbitrary host error.
    #[inline(always)]
    pub fn host(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Host {
            cause: Arc::new(cause),
        }
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownMember { .. }
            | Self::NoMatchingOverload { .. }
            | Self::InvalidKey { .. }
            | Self::OutOfBounds { .. }
            | Self::ArrayTooLarge { .. }
            | Self::RankMismatch { .. }
            | Self::ReadOnly { .. }
            | Self::WriteOnly { .. }
            | Self::NotAssignable { .. }
            | Self::NotCallable { .. }
            | Self::GenericArity { .. }
            | Self::GenericInstantiation { .. }
            | Self::UndefinedOperator { .. } => ErrorCategory::Resolution,

            Self::TypeMismatch { .. } | Self::NumberCast { .. } => ErrorCategory::Coercion,

            Self::BorrowConflict { .. }
            | Self::HostPanic { .. }
            | Self::Host { .. }
            | Self::Guest { .. } => ErrorCategory::Invocation,

            Self::ForeignEngine { .. }
            | Self::Released { .. }
            | Self::Detached
            | Self::UnsupportedValue { .. } => ErrorCategory::Lifetime,
        }
    }

    /// Returns true if this error reports an invalid use of a guest object
    /// wrapper.
    #[inline(always)]
    pub fn is_lifetime(&self) -> bool {
        self.category() == ErrorCategory::Lifetime
    }
}

/// A type of the [RuntimeError::NumberCast] error.
///
/// This object describes the reason why the source numeric value cannot be
/// converted into the destination numeric value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumberCastCause {
    /// The target type does not support representation of infinite numbers.
    Infinite,

    /// The target type does not support representation of NaN numbers.
    NAN,

    /// The source numeric value is too large for the range of the target type.
    Overflow,

    /// The source numeric value is too small for the range of the target type.
    Underflow,
}

impl From<cast::Error> for NumberCastCause {
    #[inline]
    fn from(error: cast::Error) -> Self {
        match error {
            cast::Error::Infinite => Self::Infinite,
            cast::Error::NaN => Self::NAN,
            cast::Error::Overflow => Self::Overflow,
            cast::Error::Underflow => Self::Underflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use compact_str::CompactString;
    use mlua::Error as LuaError;

    use crate::runtime::{ErrorCategory, GuestKind, RuntimeError, Scope};

    #[test]
    fn test_error_categories() {
        let unknown = RuntimeError::UnknownMember {
            receiver_type: "Counter",
            scope: Scope::Instance,
            member: CompactString::from("vaule"),
            suggestion: Some(CompactString::from("value")),
        };

        assert_eq!(unknown.category(), ErrorCategory::Resolution);
        assert_eq!(
            unknown.to_string(),
            "type 'Counter' does not have member 'vaule', did you mean 'value'?",
        );

        let released = RuntimeError::Released {
            kind: GuestKind::Table,
        };

        assert!(released.is_lifetime());
        assert_eq!(released.to_string(), "guest table wrapper has been released");
    }

    #[test]
    fn test_guest_error_round_trip() {
        let original = RuntimeError::NotCallable {
            receiver_type: "Counter",
        };

        let guest = LuaError::from(original);

        assert!(matches!(
            RuntimeError::from(guest),
            RuntimeError::NotCallable {
                receiver_type: "Counter",
            },
        ));

        let nested = LuaError::CallbackError {
            traceback: String::from("stack traceback:"),
            cause: Arc::new(LuaError::from(RuntimeError::Released {
                kind: GuestKind::Thread,
            })),
        };

        assert!(matches!(
            RuntimeError::from(nested),
            RuntimeError::Released {
                kind: GuestKind::Thread,
            },
        ));

        let plain = RuntimeError::from(LuaError::RuntimeError(String::from("boom")));

        assert!(matches!(plain, RuntimeError::Guest { ref message } if message == "boom"));
        assert_eq!(plain.category(), ErrorCategory::Invocation);

        let foreign = RuntimeError::from(LuaError::external(std::fmt::Error));

        assert!(matches!(foreign, RuntimeError::Host { .. }));
    }
}
