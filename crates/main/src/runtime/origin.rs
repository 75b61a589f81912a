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
    fmt::{Debug, Display, Formatter},
    panic::Location,
};

/// A pointer to the Rust source code that declared a host type member.
///
/// Type registration is performed by Rust code, and a malformed registration
/// (for example, two members of different kinds sharing the same name) is a
/// defect of that code rather than a recoverable runtime error. In such cases
/// the registry panics through [RustOrigin::blame], so the panic message
/// points to the declaration that caused it.
///
/// You don't need to construct this object manually: registration functions
/// are `#[track_caller]` and capture the caller's location automatically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RustOrigin {
    /// The path of the Rust file relative to the crate root.
    pub file: &'static str,

    /// The one-based line number.
    pub line: u32,

    /// The one-based column number.
    pub column: u32,
}

impl Debug for RustOrigin {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for RustOrigin {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}:{}:{}", self.file, self.line, self.column))
    }
}

impl RustOrigin {
    /// Returns the location of the caller. If the caller is itself marked
    /// with `#[track_caller]`, the location of its caller is returned, and so
    /// on.
    #[inline(always)]
    #[track_caller]
    pub fn here() -> Self {
        let location = Location::caller();

        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    /// Panics with the provided `message` prefixed by this origin.
    ///
    /// This function is guaranteed to panic.
    #[inline(never)]
    pub fn blame<T>(&self, message: &str) -> T {
        panic!("{self}: {message}")
    }
}
