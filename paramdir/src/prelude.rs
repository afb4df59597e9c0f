//! Commonly used types, importable with `use paramdir::prelude::*;`.

pub use crate::{
    ArrayElement, DataType, ExtendedFloat, Format, ParameterArchive, ParameterDirectory,
    ParameterError, ParameterStore, PersistenceConfig, TypedBuffer, VERSION, Variable,
    VariableRef,
    codec::{ContainerCodec, ParameterCodec, ProtoCodec},
    compare_parameters, load_parameters, load_parameters_h5, load_parameters_into,
    load_parameters_pb, parameters_equal, save_parameters, save_parameters_h5,
    save_parameters_pb,
};
