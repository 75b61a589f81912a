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
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
};

use strsim::normalized_damerau_levenshtein;

const EPSILON: f32 = 0.0001;

/// The minimum closeness of a declared member name to a misspelled one for
/// the former to be suggested in an error message.
pub const SUGGESTION_THRESHOLD: Closeness = Closeness(0.6);

/// A score representing the distance between two strings.
///
/// "100%" indicates that the estimated string exactly matches the pattern
/// string, while "0%" indicates they are completely distinct.
#[repr(transparent)]
#[derive(Clone, Copy, Default)]
pub struct Closeness(f32);

impl Debug for Closeness {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Closeness {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}%", self.percents()))
    }
}

impl PartialEq for Closeness {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.normalized().eq(&other.normalized())
    }
}

impl Eq for Closeness {}

impl PartialOrd for Closeness {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Closeness {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl Closeness {
    /// Estimates how close `candidate` is to `pattern`.
    ///
    /// The comparison is case-insensitive.
    pub fn estimate(pattern: &str, candidate: &str) -> Self {
        let pattern = pattern.to_lowercase();
        let candidate = candidate.to_lowercase();

        Self(normalized_damerau_levenshtein(&pattern, &candidate) as f32)
    }

    /// Returns the underlying percentage value rounded to the nearest integer.
    #[inline(always)]
    pub fn percents(self) -> u16 {
        ((self.0 * 1000.0).round() / 10.0) as u16
    }

    #[inline(always)]
    fn normalized(self) -> u32 {
        (self.0 / EPSILON) as u32
    }
}

/// Picks the candidate closest to `pattern`, if any reaches the
/// [SUGGESTION_THRESHOLD]. Among equally close candidates the first one wins.
pub fn suggest<'a>(
    pattern: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    let mut best: Option<(Closeness, &'a str)> = None;

    for candidate in candidates {
        let closeness = Closeness::estimate(pattern, candidate);

        if closeness < SUGGESTION_THRESHOLD {
            continue;
        }

        match &best {
            Some((score, _)) if *score >= closeness => (),
            _ => best = Some((closeness, candidate)),
        }
    }

    best.map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use crate::runtime::closeness::suggest;

    #[test]
    fn test_suggestion() {
        assert_eq!(suggest("vaule", ["value", "increment"]), Some("value"));
        assert_eq!(suggest("Increment", ["value", "increment"]), Some("increment"));
        assert_eq!(suggest("xyz", ["value", "increment"]), None);
    }
}
