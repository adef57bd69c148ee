//! Function adapter scenarios: direct and indirect conventions, plus a
//! full native-to-guest-and-back loop through the host and service
//! factories.

use std::collections::HashMap;
use std::sync::Arc;

use canon_abi::prelude::*;
use canon_abi::CanonicalAbiError;

fn opts() -> CanonOptions {
    CanonOptions::default()
}

#[test]
fn three_params_pass_directly() -> anyhow::Result<()> {
    let func = FunctionType::new(
        "add3",
        "test:calc/add3",
        vec![
            ("a".to_owned(), ValType::U32),
            ("b".to_owned(), ValType::U32),
            ("c".to_owned(), ValType::U32),
        ],
        Some(ValType::U32),
    );
    assert_eq!(func.param_flat_count(), 3);
    assert_eq!(func.return_flat_count(), 1);

    let mut mem = LinearMemory::new();
    let result = func.call_wasm(
        &mut mem,
        &[Value::U32(1), Value::U32(2), Value::U32(3)],
        &opts(),
        &mut |_mem: &mut LinearMemory, flat: &[FlatValue]| {
            assert_eq!(
                flat,
                &[FlatValue::I32(1), FlatValue::I32(2), FlatValue::I32(3)]
            );
            Ok(Some(FlatValue::I32(6)))
        },
    )?;
    assert_eq!(result, Some(Value::U32(6)));
    Ok(())
}

#[test]
fn twenty_params_go_through_a_tuple_pointer() -> anyhow::Result<()> {
    let params: Vec<(String, ValType)> =
        (0..20).map(|i| (format!("p{i}"), ValType::U32)).collect();
    let func = FunctionType::new("sum20", "test:calc/sum20", params, Some(ValType::U32));
    assert_eq!(func.param_flat_count(), 20);

    let args: Vec<Value> = (0..20).map(Value::U32).collect();
    let mut mem = LinearMemory::new();
    let result = func.call_wasm(
        &mut mem,
        &args,
        &opts(),
        &mut |mem: &mut LinearMemory, flat: &[FlatValue]| {
            // One i32 slot: the pointer to a 20-field tuple, 4-aligned,
            // 80 bytes, parameters stored contiguously.
            let [FlatValue::I32(ptr)] = flat[..] else {
                panic!("expected a single pointer slot, got {flat:?}");
            };
            let ptr = ptr as u32;
            assert_eq!(ptr % 4, 0);
            let mut sum = 0u32;
            for i in 0..20 {
                let bytes: [u8; 4] = mem.read(ptr + i * 4, 4)?.try_into().unwrap();
                sum += u32::from_le_bytes(bytes);
            }
            Ok(Some(FlatValue::I32(sum as i32)))
        },
    )?;
    assert_eq!(result, Some(Value::U32(190)));
    Ok(())
}

#[test]
fn wide_return_goes_through_an_out_pointer() -> anyhow::Result<()> {
    let ret = ValType::tuple([ValType::U32, ValType::U32, ValType::U32]);
    let func = FunctionType::new(
        "triple",
        "test:calc/triple",
        vec![("seed".to_owned(), ValType::U32)],
        Some(ret.clone()),
    );
    assert_eq!(func.return_flat_count(), 3);

    let mut mem = LinearMemory::new();
    let result = func.call_wasm(
        &mut mem,
        &[Value::U32(4)],
        &opts(),
        &mut |mem: &mut LinearMemory, flat: &[FlatValue]| {
            let [FlatValue::I32(seed), FlatValue::I32(out)] = flat[..] else {
                panic!("expected seed plus out-pointer, got {flat:?}");
            };
            let seed = seed as u32;
            let out = out as u32;
            for i in 0..3u32 {
                mem.write(out + i * 4, &(seed * (i + 1)).to_le_bytes())?;
            }
            Ok(None)
        },
    )?;
    assert_eq!(
        result,
        Some(Value::Tuple(vec![
            Value::U32(4),
            Value::U32(8),
            Value::U32(12)
        ]))
    );
    Ok(())
}

#[test]
fn service_call_lifts_params_and_lowers_result() -> anyhow::Result<()> {
    let func = FunctionType::new(
        "scale",
        "test:calc/scale",
        vec![
            ("values".to_owned(), ValType::list(ValType::U32)),
            ("by".to_owned(), ValType::U32),
        ],
        Some(ValType::U32),
    );

    let mut mem = LinearMemory::new();
    // Stand in for the guest: lower the arguments to flat values.
    let mut flat = Vec::new();
    ValType::list(ValType::U32).lower(
        &mut mem,
        &Value::List(vec![Value::U32(2), Value::U32(3)]),
        &mut flat,
        &opts(),
    )?;
    ValType::U32.lower(&mut mem, &Value::U32(10), &mut flat, &opts())?;

    let result = func.call_service(&mut mem, &flat, &opts(), &mut |args| {
        let values = args[0].expect_list()?;
        let by = args[1].expect_u32()?;
        let sum: u32 = values
            .iter()
            .map(|v| v.expect_u32())
            .collect::<canon_abi::Result<Vec<_>>>()?
            .iter()
            .sum();
        Ok(Some(Value::U32(sum * by)))
    })?;
    assert_eq!(result, Some(FlatValue::I32(50)));
    Ok(())
}

#[test]
fn service_call_indirect_return_stores_through_out_pointer() -> anyhow::Result<()> {
    let ret = ValType::record([("label", ValType::String), ("total", ValType::U32)]);
    let func = FunctionType::new(
        "describe",
        "test:calc/describe",
        vec![("n".to_owned(), ValType::U32)],
        Some(ret.clone()),
    );
    assert!(func.return_flat_count() > MAX_FLAT_RESULTS);

    let mut mem = LinearMemory::new();
    let out = mem.alloc(ret.alignment(), ret.byte_size());
    let flat = [FlatValue::I32(3), FlatValue::I32(out as i32)];
    let result = func.call_service(&mut mem, &flat, &opts(), &mut |args| {
        let n = args[0].expect_u32()?;
        Ok(Some(Value::Record(vec![
            ("label".to_owned(), Value::String("total".to_owned())),
            ("total".to_owned(), Value::U32(n * 2)),
        ])))
    })?;
    assert_eq!(result, None);
    assert_eq!(
        ret.load(&mem, out, &opts())?,
        Value::Record(vec![
            ("label".to_owned(), Value::String("total".to_owned())),
            ("total".to_owned(), Value::U32(6)),
        ])
    );
    Ok(())
}

#[test]
fn arity_and_out_pointer_violations_are_rejected() {
    let func = FunctionType::new(
        "pair",
        "test:calc/pair",
        vec![("n".to_owned(), ValType::U32)],
        Some(ValType::tuple([ValType::U32, ValType::U32])),
    );

    let mut mem = LinearMemory::new();
    // Missing the out-pointer slot.
    let err = func
        .call_service(&mut mem, &[FlatValue::I32(1)], &opts(), &mut |_| {
            Ok(Some(Value::Tuple(vec![Value::U32(0), Value::U32(0)])))
        })
        .unwrap_err();
    assert!(matches!(err, CanonicalAbiError::AbiViolation(_)));

    // Out-pointer slot has the wrong machine type.
    let err = func
        .call_service(
            &mut mem,
            &[FlatValue::I32(1), FlatValue::F32(0.0)],
            &opts(),
            &mut |_| Ok(Some(Value::Tuple(vec![Value::U32(0), Value::U32(0)]))),
        )
        .unwrap_err();
    assert!(matches!(err, CanonicalAbiError::AbiViolation(_)));

    // Native argument count mismatch on the wasm side.
    let err = func
        .call_wasm(&mut mem, &[], &opts(), &mut |_: &mut LinearMemory,
                                                 _: &[FlatValue]| {
            Ok(None)
        })
        .unwrap_err();
    assert!(matches!(err, CanonicalAbiError::AbiViolation(_)));
}

/// The native side of the end-to-end loop.
struct CalcService {
    counter: CounterService,
}

#[derive(Default)]
struct CounterService {
    totals: HashMap<u32, u32>,
}

impl Service for CalcService {
    fn invoke(&mut self, function: &str, args: Vec<Value>) -> canon_abi::Result<Option<Value>> {
        match function {
            "add" => {
                let a = args[0].expect_u32()?;
                let b = args[1].expect_u32()?;
                Ok(Some(Value::U32(a + b)))
            }
            "concat" => {
                let a = args[0].expect_str()?;
                let b = args[1].expect_str()?;
                Ok(Some(Value::String(format!("{a}{b}"))))
            }
            other => Err(CanonicalAbiError::abi(format!("unknown function `{other}`"))),
        }
    }

    fn resource(&mut self, name: &str) -> Option<&mut dyn Service> {
        if name == "counter" {
            Some(&mut self.counter)
        } else {
            None
        }
    }
}

impl Service for CounterService {
    fn invoke(&mut self, function: &str, args: Vec<Value>) -> canon_abi::Result<Option<Value>> {
        match function {
            "increment" => {
                let handle = args[0].expect_resource()?;
                let by = args[1].expect_u32()?;
                let total = self.totals.entry(handle).or_insert(0);
                *total += by;
                Ok(Some(Value::U32(*total)))
            }
            other => Err(CanonicalAbiError::abi(format!("unknown method `{other}`"))),
        }
    }
}

#[test]
fn host_and_service_factories_close_the_loop() -> anyhow::Result<()> {
    let counter = ResourceType::new("counter", "test:calc/counter");
    counter.define_functions(vec![Arc::new(FunctionType::new(
        "increment",
        "test:calc/[method]counter.increment",
        vec![
            ("self".to_owned(), ValType::borrow(counter.clone())),
            ("by".to_owned(), ValType::U32),
        ],
        Some(ValType::U32),
    ))])?;

    let functions = vec![
        Arc::new(FunctionType::new(
            "add",
            "test:calc/add",
            vec![
                ("a".to_owned(), ValType::U32),
                ("b".to_owned(), ValType::U32),
            ],
            Some(ValType::U32),
        )),
        Arc::new(FunctionType::new(
            "concat",
            "test:calc/concat",
            vec![
                ("a".to_owned(), ValType::String),
                ("b".to_owned(), ValType::String),
            ],
            Some(ValType::String),
        )),
    ];
    let resources = vec![counter];

    let host = Host::create(&functions, &resources)?;
    assert!(host.contains("test:calc/add"));
    assert!(host.contains("test:calc/[method]counter.increment"));

    let binding = ServiceBinding::create(&functions, &resources)?;
    let mut service = CalcService {
        counter: CounterService::default(),
    };
    let mut mem = LinearMemory::new();
    let copts = opts();

    // The "guest" is the host table itself: every wire call loops back
    // into the native service.
    let mut wire = |mem: &mut LinearMemory, name: &str, params: &[FlatValue]| {
        host.dispatch(name, mem, params, &copts, &mut service)
    };

    let sum = binding.call(
        "add",
        &mut mem,
        &mut wire,
        &[Value::U32(40), Value::U32(2)],
        &copts,
    )?;
    assert_eq!(sum, Some(Value::U32(42)));

    let joined = binding.call(
        "concat",
        &mut mem,
        &mut wire,
        &[
            Value::String("héllo ".to_owned()),
            Value::String("wörld".to_owned()),
        ],
        &copts,
    )?;
    assert_eq!(joined, Some(Value::String("héllo wörld".to_owned())));

    let first = binding.call(
        "counter.increment",
        &mut mem,
        &mut wire,
        &[Value::Resource(7), Value::U32(5)],
        &copts,
    )?;
    assert_eq!(first, Some(Value::U32(5)));
    let second = binding.call(
        "counter.increment",
        &mut mem,
        &mut wire,
        &[Value::Resource(7), Value::U32(5)],
        &copts,
    )?;
    assert_eq!(second, Some(Value::U32(10)));

    let unknown = binding.call("missing", &mut mem, &mut wire, &[], &copts);
    assert!(unknown.is_err());
    Ok(())
}
