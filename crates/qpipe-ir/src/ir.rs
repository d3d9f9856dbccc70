//! The IR container: an ordered list of kernels.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::function::Function;

/// An ordered collection of kernels. Names need not be unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ir {
    kernels: Vec<Function>,
}

impl Ir {
    /// Create an empty IR.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a kernel.
    pub fn add_kernel(&mut self, kernel: Function) {
        self.kernels.push(kernel);
    }

    /// All kernels in order.
    pub fn kernels(&self) -> &[Function] {
        &self.kernels
    }

    /// Mutable kernels.
    pub fn kernels_mut(&mut self) -> &mut [Function] {
        &mut self.kernels
    }

    /// Consume into the kernel list.
    pub fn into_kernels(self) -> Vec<Function> {
        self.kernels
    }

    /// Kernel at `index`.
    pub fn kernel(&self, index: usize) -> IrResult<&Function> {
        self.kernels.get(index).ok_or(IrError::IndexOutOfRange {
            index,
            len: self.kernels.len(),
            context: "ir".into(),
        })
    }

    /// First kernel named `name`.
    pub fn kernel_by_name(&self, name: &str) -> Option<&Function> {
        self.kernels.iter().find(|k| k.name() == name)
    }

    /// Number of kernels.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// True if there are no kernels.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Apply `map` to every kernel. Kernels before a failing one stay mapped.
    pub fn map_bits(&mut self, map: &[usize]) -> IrResult<()> {
        self.kernels.iter_mut().try_for_each(|k| k.map_bits(map))
    }

    /// Write the IR as JSON.
    pub fn persist<W: Write>(&self, writer: W) -> IrResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read an IR written by [`Ir::persist`].
    pub fn load<R: Read>(reader: R) -> IrResult<Ir> {
        Ok(serde_json::from_reader(reader)?)
    }
}

impl From<Vec<Function>> for Ir {
    fn from(kernels: Vec<Function>) -> Self {
        Self { kernels }
    }
}

impl FromIterator<Function> for Ir {
    fn from_iter<I: IntoIterator<Item = Function>>(iter: I) -> Self {
        Self {
            kernels: iter.into_iter().collect(),
        }
    }
}
