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

use std::thread;

use moonbridge::runtime::{
    HostType,
    Operation,
    Scope,
    SearchStrategy,
    Signature,
    Thunk,
    TypeBinding,
    TypeBuilder,
    Value,
    LINEAR_SEARCH_LIMIT,
};

struct Small;

impl HostType for Small {
    const NAME: &'static str = "Small";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.method("first", Signature::new(), |_| Ok(Value::Nil));
        let _ = ty.method("second", Signature::new(), |_| Ok(Value::Nil));
    }
}

struct Large;

impl HostType for Large {
    const NAME: &'static str = "Large";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let names = [
            "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
            "lambda", "mu",
        ];

        for name in names {
            let _ = ty.method(name, Signature::new(), |_| Ok(Value::Nil));
        }
    }
}

struct Contended;

impl HostType for Contended {
    const NAME: &'static str = "Contended";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.method("run", Signature::new(), |_| Ok(Value::Nil));
    }
}

#[test]
fn test_concurrent_binding() {
    let addresses = thread::scope(|scope| {
        let workers = (0..8)
            .map(|_| scope.spawn(|| Contended::binding() as *const TypeBinding as usize))
            .collect::<Vec<_>>();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect::<Vec<_>>()
    });

    let expected = Contended::binding() as *const TypeBinding as usize;

    assert!(addresses.iter().all(|address| *address == expected));
    assert!(Contended::binding().instance_member("run").is_some());
}

#[test]
fn test_concurrent_thunk() {
    let key = Contended::type_key();

    let addresses = thread::scope(|scope| {
        let workers = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    Thunk::get(key, Scope::Instance, Operation::Call) as *const Thunk as usize
                })
            })
            .collect::<Vec<_>>();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .collect::<Vec<_>>()
    });

    let expected = Thunk::get(key, Scope::Instance, Operation::Call) as *const Thunk as usize;

    assert!(addresses.iter().all(|address| *address == expected));

    let other = Thunk::get(key, Scope::Static, Operation::Call);

    assert_ne!(other as *const Thunk as usize, expected);
    assert_eq!(other.scope(), Scope::Static);
}

#[test]
fn test_search_strategies() {
    let small = Thunk::get(Small::type_key(), Scope::Instance, Operation::Read);

    assert_eq!(small.strategy(), SearchStrategy::Linear);
    assert!(small.lookup("second").is_some());
    assert!(small.lookup("third").is_none());

    let large = Thunk::get(Large::type_key(), Scope::Instance, Operation::Read);

    assert!(Large::binding().instance_member("mu").is_some());
    assert!(Large::binding().member_count(Scope::Instance) > LINEAR_SEARCH_LIMIT);
    assert_eq!(large.strategy(), SearchStrategy::Binary);

    for name in ["alpha", "kappa", "mu"] {
        assert!(large.lookup(name).is_some());
    }

    assert!(large.lookup("omega").is_none());
    assert!(large.lookup("").is_none());
}
