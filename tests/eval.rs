//! Constant evaluation over reflected modules.
mod common;

use common::*;
use spirv_probe::{ConstantValue, Error, EvalValue, ReflectConfig};

// Sub-opcodes folded by `OpSpecConstantOp`.
const OP_VECTOR_SHUFFLE: u32 = 79;
const OP_COMPOSITE_EXTRACT: u32 = 81;
const OP_COMPOSITE_INSERT: u32 = 82;
const OP_SELECT: u32 = 169;
const OP_IADD: u32 = 128;
const OP_IMUL: u32 = 132;
const OP_UDIV: u32 = 134;
const OP_SCONVERT: u32 = 114;

fn scalar(value: EvalValue) -> ConstantValue {
    match value {
        EvalValue::Scalar(lane) => {
            assert!(!lane.undef);
            lane.value
        }
        x => panic!("expected a defined scalar, got {:?}", x),
    }
}

#[test]
fn folds_spec_constant_expressions() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[3]);
    b.ty_int(3, 32, 0);
    b.spec_constant(3, 4, &[4]);
    b.constant(3, 5, &[10]);
    b.spec_constant_op(3, 6, OP_IMUL, &[4, 5]);
    b.spec_constant_op(3, 7, OP_IADD, &[6, 5]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();

    assert_eq!(scalar(evaluator.evaluate(7).unwrap()), ConstantValue::U32(50));
    evaluator.set_spec_constant(3, ConstantValue::U32(7)).unwrap();
    assert_eq!(scalar(evaluator.evaluate(7).unwrap()), ConstantValue::U32(80));
    assert!(evaluator.is_related_to_spec_id(7, 3));
    assert!(!evaluator.is_related_to_spec_id(5, 3));
}

#[test]
fn spec_sized_array_length_resolves_after_binding() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[0]);
    b.decorate(7, DECO_ARRAY_STRIDE, &[4]);
    b.ty_int(3, 32, 0);
    b.spec_constant(3, 4, &[4]);
    b.constant(3, 5, &[2]);
    b.spec_constant_op(3, 6, OP_IMUL, &[4, 5]);
    b.ty_array(7, 3, 6);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();

    // The array dimension defers to the spec-constant expression.
    let ty = module.type_description(7).unwrap().clone();
    let traits = ty.array_traits().unwrap();
    assert_eq!(traits.dims, vec![!0u32]);
    assert_eq!(traits.spec_constant_op_ids, vec![6]);

    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(scalar(evaluator.evaluate(6).unwrap()), ConstantValue::U32(8));
    evaluator.set_spec_constant(0, ConstantValue::U32(16)).unwrap();
    assert_eq!(scalar(evaluator.evaluate(6).unwrap()), ConstantValue::U32(32));
}

#[test]
fn division_by_bound_zero_turns_undefined() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[1]);
    b.ty_int(3, 32, 0);
    b.spec_constant(3, 4, &[2]);
    b.constant(3, 5, &[100]);
    b.spec_constant_op(3, 6, OP_UDIV, &[5, 4]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(scalar(evaluator.evaluate(6).unwrap()), ConstantValue::U32(50));

    evaluator.set_spec_constant(1, ConstantValue::U32(0)).unwrap();
    match evaluator.evaluate(6).unwrap() {
        EvalValue::Scalar(lane) => assert!(lane.undef),
        x => panic!("expected scalar, got {:?}", x),
    }
}

#[test]
fn composite_round_trips() {
    let mut b = ModuleBuilder::new();
    b.ty_int(3, 32, 0);
    b.constant(3, 4, &[1]);
    b.constant(3, 5, &[2]);
    b.ty_vector(6, 3, 2);
    b.constant_composite(6, 7, &[4, 5]);
    b.constant_composite(6, 8, &[5, 4]);
    b.ty_vector(9, 3, 4);
    b.spec_constant_op(9, 10, OP_VECTOR_SHUFFLE, &[7, 8, 0, 1, 2, 3]);
    b.spec_constant_op(3, 11, OP_COMPOSITE_EXTRACT, &[7, 1]);
    b.spec_constant_op(6, 12, OP_COMPOSITE_INSERT, &[4, 8, 0]);
    b.spec_constant_op(3, 13, OP_COMPOSITE_EXTRACT, &[12, 0]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();

    match evaluator.evaluate(10).unwrap() {
        EvalValue::Vector(lanes) => {
            let values: Vec<_> = lanes.into_iter().map(|x| x.value).collect();
            assert_eq!(
                values,
                vec![
                    ConstantValue::U32(1),
                    ConstantValue::U32(2),
                    ConstantValue::U32(2),
                    ConstantValue::U32(1),
                ]
            );
        }
        x => panic!("expected vector, got {:?}", x),
    }
    assert_eq!(scalar(evaluator.evaluate(11).unwrap()), ConstantValue::U32(2));
    // Insert-then-extract returns the inserted object.
    assert_eq!(scalar(evaluator.evaluate(13).unwrap()), ConstantValue::U32(1));
}

#[test]
fn select_follows_a_bound_condition() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[0]);
    b.ty_bool(2);
    b.ty_int(3, 32, 0);
    b.spec_constant_bool(2, 4, true);
    b.constant(3, 5, &[11]);
    b.constant(3, 6, &[22]);
    b.spec_constant_op(3, 7, OP_SELECT, &[4, 5, 6]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(scalar(evaluator.evaluate(7).unwrap()), ConstantValue::U32(11));
    evaluator
        .set_spec_constant(0, ConstantValue::Bool(false))
        .unwrap();
    assert_eq!(scalar(evaluator.evaluate(7).unwrap()), ConstantValue::U32(22));
}

#[test]
fn sign_extension_across_widths() {
    let mut b = ModuleBuilder::new();
    b.ty_int(3, 32, 1);
    b.ty_int(4, 64, 1);
    b.constant(3, 5, &[0xFFFF_FFFF]); // -1_i32
    b.spec_constant_op(4, 6, OP_SCONVERT, &[5]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(scalar(evaluator.evaluate(6).unwrap()), ConstantValue::S64(-1));
}

#[test]
fn specialization_info_packs_in_module_order() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[5]);
    b.decorate(5, DECO_SPEC_ID, &[2]);
    b.decorate(7, DECO_SPEC_ID, &[9]);
    b.ty_int(3, 32, 0);
    b.spec_constant(3, 4, &[100]);
    b.spec_constant(3, 5, &[200]);
    b.ty_bool(6);
    b.spec_constant_bool(6, 7, true);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();
    evaluator.set_spec_constant(2, ConstantValue::U32(42)).unwrap();

    let (entries, data) = evaluator.specialization_info().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries.iter().map(|x| x.constant_id).collect::<Vec<_>>(),
        vec![5, 2, 9]
    );
    assert_eq!(
        entries.iter().map(|x| (x.offset, x.size)).collect::<Vec<_>>(),
        vec![(0, 4), (4, 4), (8, 4)]
    );
    assert_eq!(data.len(), 12);
    assert_eq!(&data[0..4], &100u32.to_le_bytes());
    assert_eq!(&data[4..8], &42u32.to_le_bytes());
    // Booleans widen to a full word.
    assert_eq!(&data[8..12], &1u32.to_le_bytes());
}

#[test]
fn evaluator_is_opt_in() {
    let mut b = ModuleBuilder::new();
    b.ty_int(3, 32, 0);
    b.constant(3, 4, &[7]);
    let module = ReflectConfig::new().spv(b.build()).reflect().unwrap();
    assert!(module.evaluator().is_none());

    let module = ReflectConfig::new()
        .spv({
            let mut b = ModuleBuilder::new();
            b.ty_int(3, 32, 0);
            b.constant(3, 4, &[7]);
            b.build()
        })
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    assert!(module.evaluator().is_some());
}

#[test]
fn what_if_evaluation_on_a_duplicate() {
    let mut b = ModuleBuilder::new();
    b.decorate(4, DECO_SPEC_ID, &[0]);
    b.ty_int(3, 32, 0);
    b.spec_constant(3, 4, &[3]);
    b.constant(3, 5, &[2]);
    b.spec_constant_op(3, 6, OP_IMUL, &[4, 5]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();

    let mut what_if = module.evaluator().unwrap().clone();
    what_if.set_spec_constant(0, ConstantValue::U32(10)).unwrap();
    assert_eq!(scalar(what_if.evaluate(6).unwrap()), ConstantValue::U32(20));
    // The module's own evaluator still sees the encoded default.
    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(scalar(evaluator.evaluate(6).unwrap()), ConstantValue::U32(6));
}

#[test]
fn missing_spec_id_is_not_found() {
    let mut b = ModuleBuilder::new();
    b.ty_int(3, 32, 0);
    b.constant(3, 4, &[7]);
    let mut module = ReflectConfig::new()
        .spv(b.build())
        .evaluate_constants(true)
        .reflect()
        .unwrap();
    let evaluator = module.evaluator_mut().unwrap();
    assert_eq!(
        evaluator.set_spec_constant(0, ConstantValue::U32(1)),
        Err(Error::ElementNotFound)
    );
}
