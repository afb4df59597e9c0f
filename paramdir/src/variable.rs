use std::{cell::RefCell, rc::Rc};

use crate::{ParameterError, TypedBuffer};

/// Persisted state of a graph variable: its data and whether it is trained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    data: TypedBuffer,
    need_grad: bool,
}

/// Shared handle to a variable held by a [`crate::ParameterDirectory`].
pub type VariableRef = Rc<RefCell<Variable>>;

impl Variable {
    pub fn new(
        data: TypedBuffer,
        need_grad: bool,
    ) -> Self {
        Self {
            data,
            need_grad,
        }
    }

    /// A trainable parameter.
    pub fn parameter(data: TypedBuffer) -> Self {
        Self::new(data, true)
    }

    pub fn data(&self) -> &TypedBuffer {
        &self.data
    }

    /// Mutable payload; shape and dtype stay fixed.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_bytes_mut()
    }

    /// Overwrites the payload with `other`, which must match dtype and size.
    pub fn copy_from(
        &mut self,
        other: &TypedBuffer,
    ) -> Result<(), ParameterError> {
        self.data.copy_from(other)
    }

    pub fn into_data(self) -> TypedBuffer {
        self.data
    }

    pub fn need_grad(&self) -> bool {
        self.need_grad
    }

    pub fn set_need_grad(
        &mut self,
        need_grad: bool,
    ) {
        self.need_grad = need_grad;
    }

    pub fn into_ref(self) -> VariableRef {
        Rc::new(RefCell::new(self))
    }
}

impl From<TypedBuffer> for Variable {
    fn from(data: TypedBuffer) -> Self {
        Self::parameter(data)
    }
}
