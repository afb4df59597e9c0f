include!(concat!(env!("OUT_DIR"), "/parameter-protos/mod.rs"));

pub use parameter::{Parameter, ParameterProto, Shape};
