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

//! Overload scoring.
//!
//! A candidate signature is matched against the supplied arguments from left
//! to right. Each consumed argument must coerce to its parameter's type, each
//! missing argument must have a default, and every supplied argument must be
//! consumed. The accumulated score measures how well the candidate fits:
//! explicit matches earn [EXPLICIT_MATCH], defaults cost [IMPLICIT_MATCH],
//! and packing trailing arguments into a variadic array costs
//! [IMPLICIT_ARRAY].

use crate::{
    exports::HostArray,
    runtime::{
        builder::{ParamMode, Signature},
        coercion::coerce,
        TypeHint,
        Value,
    },
};

/// The score of a rejected candidate.
pub const IMPOSSIBLE: i32 = i32::MIN;

/// The bonus of an argument that coerces to its parameter.
pub const EXPLICIT_MATCH: i32 = 10;

/// The penalty of a parameter that takes its default value.
pub const IMPLICIT_MATCH: i32 = -1;

/// The penalty of the implicit variadic array packing.
pub const IMPLICIT_ARRAY: i32 = -2;

/// The coerced arguments of an accepted candidate.
///
/// The arguments are aligned with the candidate's parameters: output
/// parameters are represented by nil placeholders, and the variadic
/// parameter by a single [HostArray] object.
#[derive(Debug)]
pub struct Resolution {
    pub arguments: Vec<Value>,
    pub score: i32,
}

/// Matches `arguments` against the `signature`.
///
/// Returns None if the candidate is not applicable.
pub fn score(signature: &Signature, arguments: &[Value]) -> Option<Resolution> {
    let mut coerced = Vec::with_capacity(signature.params.len());
    let mut cursor = 0;
    let mut score = 0i32;

    for param in &signature.params {
        if param.mode == ParamMode::Out {
            coerced.push(Value::Nil);
            continue;
        }

        let remaining = &arguments[cursor.min(arguments.len())..];

        if param.variadic {
            if let [single] = remaining {
                let array_hint = TypeHint::Array(Box::new(param.hint.clone()));

                if !single.is_nil() {
                    if let Some(array) = coerce(single, &array_hint) {
                        coerced.push(array);

                        return Some(Resolution {
                            arguments: coerced,
                            score: score.saturating_add(EXPLICIT_MATCH),
                        });
                    }
                }
            }

            let mut elements = Vec::with_capacity(remaining.len());

            for argument in remaining {
                elements.push(coerce(argument, &param.hint)?);
            }

            coerced.push(Value::host(HostArray::from_values(
                param.hint.clone(),
                elements,
            )));

            return Some(Resolution {
                arguments: coerced,
                score: score.saturating_add(IMPLICIT_ARRAY),
            });
        }

        match remaining.first() {
            Some(argument) => {
                coerced.push(coerce(argument, &param.hint)?);
                cursor += 1;
                score = score.saturating_add(EXPLICIT_MATCH);
            }

            None => {
                let default = param.default?;

                coerced.push(default());
                score = score.saturating_add(IMPLICIT_MATCH);
            }
        }
    }

    if cursor < arguments.len() {
        return None;
    }

    Some(Resolution {
        arguments: coerced,
        score,
    })
}

/// Selects the best candidate among `signatures`.
///
/// Returns the index of the winner in the iteration order and its
/// resolution. The candidate with the strictly highest score wins; among
/// equally scored candidates, the first one wins.
pub fn select<'a>(
    signatures: impl IntoIterator<Item = &'a Signature>,
    arguments: &[Value],
) -> Option<(usize, Resolution)> {
    let mut best: Option<(usize, Resolution)> = None;

    for (index, signature) in signatures.into_iter().enumerate() {
        let Some(resolution) = score(signature, arguments) else {
            continue;
        };

        let better = match &best {
            None => true,
            Some((_, current)) => resolution.score > current.score,
        };

        if better {
            best = Some((index, resolution));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use crate::{
        exports::HostArray,
        runtime::{
            builder::Signature,
            resolve::{score, select, EXPLICIT_MATCH, IMPLICIT_ARRAY, IMPLICIT_MATCH},
            Value,
        },
    };

    #[test]
    fn test_explicit_and_default() {
        let signature = Signature::new()
            .param::<i64>("x")
            .optional::<i64>("y", || Value::Integer(7));

        let resolution = score(&signature, &[Value::Integer(1)]).unwrap();

        assert_eq!(resolution.score, EXPLICIT_MATCH + IMPLICIT_MATCH);
        assert_eq!(resolution.arguments, vec![Value::Integer(1), Value::Integer(7)]);

        let resolution = score(&signature, &[Value::Integer(1), Value::Integer(2)]).unwrap();

        assert_eq!(resolution.score, 2 * EXPLICIT_MATCH);
        assert!(score(&signature, &[]).is_none());
        assert!(score(&signature, &[Value::from("foo")]).is_none());
    }

    #[test]
    fn test_leftover_arguments() {
        let signature = Signature::new().param::<i64>("x");

        assert!(score(&signature, &[Value::Integer(1), Value::Integer(2)]).is_none());
    }

    #[test]
    fn test_output_parameters() {
        let signature = Signature::new().param::<i64>("x").out::<i64>("y");

        let resolution = score(&signature, &[Value::Integer(3)]).unwrap();

        assert_eq!(resolution.score, EXPLICIT_MATCH);
        assert_eq!(resolution.arguments, vec![Value::Integer(3), Value::Nil]);
    }

    #[test]
    fn test_variadic_packing() {
        let signature = Signature::new().variadic::<i64>("items");

        for count in [0usize, 1, 5] {
            let arguments = (0..count as i64).map(Value::Integer).collect::<Vec<_>>();
            let resolution = score(&signature, &arguments).unwrap();

            assert_eq!(resolution.score, IMPLICIT_ARRAY);

            let length = resolution.arguments[0]
                .as_object()
                .unwrap()
                .read(|array: &HostArray| array.len())
                .unwrap();

            assert_eq!(length, count);
        }

        assert!(score(&signature, &[Value::Integer(1), Value::from("foo")]).is_none());
    }

    #[test]
    fn test_explicit_array() {
        let signature = Signature::new().variadic::<i64>("items");

        let array = Value::host(HostArray::from_values(
            crate::runtime::TypeHint::I64,
            vec![Value::Integer(1), Value::Integer(2)],
        ));

        let resolution = score(&signature, &[array.clone()]).unwrap();

        assert_eq!(resolution.score, EXPLICIT_MATCH);
        assert_eq!(resolution.arguments, vec![array]);
    }

    #[test]
    fn test_selection_order() {
        let by_integer = Signature::new().param::<i64>("x");
        let by_number = Signature::new().param::<f64>("x");
        let with_default = Signature::new()
            .param::<i64>("x")
            .optional::<bool>("flag", || Value::Boolean(false));

        let candidates = [&with_default, &by_number, &by_integer];

        let (index, _) = select(candidates, &[Value::Integer(1)]).unwrap();

        assert_eq!(index, 1);

        let (index, _) = select(candidates, &[Value::Number(1.5)]).unwrap();

        assert_eq!(index, 1);

        let (index, _) = select(candidates, &[Value::Integer(1), Value::Boolean(true)]).unwrap();

        assert_eq!(index, 0);

        assert!(select(candidates, &[Value::from("foo")]).is_none());
    }
}
