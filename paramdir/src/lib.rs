pub mod archive;
pub mod codec;
pub mod compare;
pub mod config;

pub mod data_type;
pub use data_type::{ArrayElement, DataType};

pub mod directory;
pub mod env_utils;
pub mod error;
pub mod extended_float;
pub mod persistence;
pub mod prelude;
pub mod protos;
pub mod typed_buffer;
pub mod variable;

pub use archive::ParameterArchive;
pub use compare::{ParameterMismatch, compare_parameters, parameters_equal};
pub use config::PersistenceConfig;
pub use directory::ParameterDirectory;
pub use error::ParameterError;
pub use extended_float::ExtendedFloat;
pub use persistence::{
    Format, ParameterStore, load_parameters, load_parameters_h5, load_parameters_into,
    load_parameters_pb, save_parameters, save_parameters_h5, save_parameters_pb,
};
pub use typed_buffer::TypedBuffer;
pub use variable::{Variable, VariableRef};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
