//! In-place edit invariants: every edit rewrites decorated words only and
//! preserves the module byte length.
mod common;

use common::*;
use spirv_probe::{
    Error, ReflectConfig, BINDING_NUMBER_DONT_CHANGE, SET_NUMBER_DONT_CHANGE,
};

fn two_set_module() -> Vec<u32> {
    let mut b = ModuleBuilder::new();
    b.name(6, "a");
    b.name(8, "b");
    b.decorate(4, DECO_BLOCK, &[]);
    b.member_decorate(4, 0, DECO_OFFSET, &[0]);
    b.decorate(6, DECO_DESCRIPTOR_SET, &[0]);
    b.decorate(6, DECO_BINDING, &[0]);
    b.decorate(8, DECO_DESCRIPTOR_SET, &[2]);
    b.decorate(8, DECO_BINDING, &[3]);
    b.ty_float(3, 32);
    b.ty_struct(4, &[3]);
    b.ty_pointer(5, SC_UNIFORM, 4);
    b.variable(5, 6, SC_UNIFORM);
    b.variable(5, 8, SC_UNIFORM);
    b.build()
}

#[test]
fn change_binding_number() {
    let words = two_set_module();
    let len = words.len();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();
    let set_count = module.descriptor_sets().len();

    module
        .change_descriptor_binding_numbers(0, 0, 5, SET_NUMBER_DONT_CHANGE)
        .unwrap();
    assert_eq!(module.code().len(), len);
    assert_eq!(module.descriptor_sets().len(), set_count);
    assert_eq!(module.descriptor_binding(0, 5).unwrap().binding, 5);
    assert_eq!(module.descriptor_binding(0, 0), Err(Error::ElementNotFound));

    // The rewrite survives re-reflection of the edited words.
    let edited = module.code().to_vec();
    let module = ReflectConfig::new().spv(edited).reflect().unwrap();
    assert_eq!(module.descriptor_binding(0, 5).unwrap().spirv_id, 6);
}

#[test]
fn change_binding_set_too() {
    let words = two_set_module();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();
    module.change_descriptor_binding_numbers(0, 0, 7, 4).unwrap();
    assert_eq!(module.descriptor_binding(4, 7).unwrap().spirv_id, 6);
    let sets: Vec<u32> = module.descriptor_sets().iter().map(|x| x.set).collect();
    assert_eq!(sets, vec![2, 4]);

    let edited = module.code().to_vec();
    let module = ReflectConfig::new().spv(edited).reflect().unwrap();
    assert_eq!(module.descriptor_binding(4, 7).unwrap().spirv_id, 6);
}

#[test]
fn change_set_number() {
    let words = two_set_module();
    let len = words.len();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();
    let binding_count = module.descriptor_set(2).unwrap().binding_indices.len();

    module.change_descriptor_set_number(2, 7).unwrap();
    assert_eq!(module.code().len(), len);
    let sets: Vec<u32> = module.descriptor_sets().iter().map(|x| x.set).collect();
    assert_eq!(sets, vec![0, 7]);
    assert_eq!(
        module.descriptor_set(7).unwrap().binding_indices.len(),
        binding_count
    );
    assert_eq!(module.descriptor_set(2), Err(Error::ElementNotFound));

    let edited = module.code().to_vec();
    let module = ReflectConfig::new().spv(edited).reflect().unwrap();
    let sets: Vec<u32> = module.descriptor_sets().iter().map(|x| x.set).collect();
    assert_eq!(sets, vec![0, 7]);

    // Keeping the set number is a no-op.
    let words = two_set_module();
    let mut module = ReflectConfig::new().spv(words.clone()).reflect().unwrap();
    module
        .change_descriptor_set_number(2, SET_NUMBER_DONT_CHANGE)
        .unwrap();
    assert_eq!(module.code(), words.as_slice());
}

#[test]
fn unknown_binding_is_reported() {
    let words = two_set_module();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();
    assert_eq!(
        module.change_descriptor_binding_numbers(9, 9, 1, SET_NUMBER_DONT_CHANGE),
        Err(Error::ElementNotFound)
    );
    assert_eq!(
        module.change_descriptor_set_number(9, 1),
        Err(Error::ElementNotFound)
    );
    // Nothing changes binding-wise when both components are kept.
    module
        .change_descriptor_binding_numbers(0, 0, BINDING_NUMBER_DONT_CHANGE, SET_NUMBER_DONT_CHANGE)
        .unwrap();
    assert!(module.descriptor_binding(0, 0).is_ok());
}

fn io_module() -> Vec<u32> {
    let mut b = ModuleBuilder::new();
    b.entry_point(EM_FRAGMENT, 9, "main", &[6, 8]);
    b.decorate(6, DECO_LOCATION, &[3]);
    b.decorate(8, DECO_LOCATION, &[0]);
    b.ty_void(1);
    b.ty_fn(2, 1);
    b.ty_float(3, 32);
    b.ty_vector(4, 3, 4);
    b.ty_pointer(5, SC_INPUT, 4);
    b.variable(5, 6, SC_INPUT);
    b.ty_pointer(7, SC_OUTPUT, 4);
    b.variable(7, 8, SC_OUTPUT);
    b.func_begin(1, 9, 2, 10);
    b.func_end();
    b.build()
}

#[test]
fn change_input_variable_location() {
    let words = io_module();
    let len = words.len();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();

    module.change_input_variable_location(3, 11).unwrap();
    assert_eq!(module.code().len(), len);
    assert_eq!(module.input_variable_by_location(11).unwrap().spirv_id, 6);
    assert_eq!(
        module.input_variable_by_location(3),
        Err(Error::ElementNotFound)
    );

    let edited = module.code().to_vec();
    let module = ReflectConfig::new().spv(edited).reflect().unwrap();
    assert_eq!(module.input_variable_by_location(11).unwrap().spirv_id, 6);
}

#[test]
fn change_output_variable_location() {
    let words = io_module();
    let mut module = ReflectConfig::new().spv(words).reflect().unwrap();
    module.change_output_variable_location(0, 2).unwrap();
    assert_eq!(module.output_variable_by_location(2).unwrap().spirv_id, 8);
    assert_eq!(
        module.change_output_variable_location(0, 1),
        Err(Error::ElementNotFound)
    );
}
