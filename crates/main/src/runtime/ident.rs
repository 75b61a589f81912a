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
    borrow::Borrow,
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use ahash::AHashSet;
use lady_deirdre::sync::Lazy;

static INTERNER: Lazy<Mutex<AHashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(AHashSet::new()));

/// An interned member name.
///
/// Every distinct string is stored once per process, so two identifiers are
/// equal exactly when they point to the same allocation. The Hash
/// implementation hashes the string content, which allows looking up
/// identifier-keyed maps by `&str` through the [Borrow] implementation.
///
/// The [Display], [Debug], and [AsRef<str>](AsRef) implementations expose the
/// underlying string.
#[derive(Clone)]
pub struct Ident(Arc<str>);

impl Debug for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.as_str(), formatter)
    }
}

impl Display for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.as_str(), formatter)
    }
}

impl AsRef<str> for Ident {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for Ident {
    #[inline(always)]
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for Ident {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Ident {}

impl Hash for Ident {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl PartialOrd for Ident {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ident {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl<'a> From<&'a str> for Ident {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self::new(value)
    }
}

impl Ident {
    /// Interns the string and returns its identifier.
    pub fn new(string: &str) -> Self {
        let mut interner = INTERNER
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if let Some(interned) = interner.get(string) {
            return Self(interned.clone());
        }

        let interned = Arc::<str>::from(string);
        let _ = interner.insert(interned.clone());

        Self(interned)
    }

    /// Returns the identifier of the string if it has been interned before.
    ///
    /// A string that has never been interned cannot name any declared
    /// member, so lookups can fail early without growing the interner.
    pub fn find(string: &str) -> Option<Self> {
        let interner = INTERNER
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        interner.get(string).map(|interned| Self(interned.clone()))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// The address of the interned allocation, a stable per-process key
    /// usable for pointer-ordered lookups.
    #[inline(always)]
    pub(crate) fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Ident;

    #[test]
    fn test_interning() {
        let first = Ident::new("interning_sample");
        let second = Ident::new(&String::from("interning_sample"));

        assert_eq!(first, second);
        assert_eq!(first.address(), second.address());
        assert_eq!(Ident::find("interning_sample"), Some(first));
        assert!(Ident::find("never_interned_anywhere").is_none());
    }
}
