//! Pre-order traversal of instruction trees.

use std::slice;

use crate::function::Function;
use crate::instruction::Instruction;

/// Read-only, restartable pre-order walk over a [`Function`].
///
/// A composite instruction is yielded first, then its nested instructions,
/// then the next sibling.
#[derive(Debug, Clone)]
pub struct InstructionIterator<'a> {
    root: &'a Function,
    stack: Vec<slice::Iter<'a, Instruction>>,
}

impl<'a> InstructionIterator<'a> {
    /// Start a walk at the first instruction of `root`.
    pub fn new(root: &'a Function) -> Self {
        Self {
            root,
            stack: vec![root.instructions().iter()],
        }
    }

    /// True if another instruction remains.
    pub fn has_next(&self) -> bool {
        self.stack.iter().any(|it| !it.as_slice().is_empty())
    }

    /// Rewind to the beginning.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(self.root.instructions().iter());
    }
}

impl<'a> Iterator for InstructionIterator<'a> {
    type Item = &'a Instruction;

    fn next(&mut self) -> Option<&'a Instruction> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                Some(inst) => {
                    if let Instruction::Composite(f) = inst {
                        self.stack.push(f.instructions().iter());
                    }
                    return Some(inst);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Function {
        let mut inner = Function::new("inner");
        inner.add_instruction(Instruction::op("X", [1], []));
        inner.add_instruction(Instruction::op("Y", [2], []));

        let mut f = Function::new("outer");
        f.add_instruction(Instruction::op("H", [0], []));
        f.add_instruction(inner);
        f.add_instruction(Instruction::op("Z", [0], []));
        f
    }

    #[test]
    fn test_preorder() {
        let f = nested();
        let names: Vec<&str> = f.iter().map(Instruction::name).collect();
        assert_eq!(names, vec!["H", "inner", "X", "Y", "Z"]);
    }

    #[test]
    fn test_restart() {
        let f = nested();
        let mut it = f.iter();
        assert!(it.has_next());
        let first: Vec<&str> = it.by_ref().map(Instruction::name).collect();
        assert!(!it.has_next());
        it.reset();
        let second: Vec<&str> = it.map(Instruction::name).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty() {
        let f = Function::new("empty");
        let mut it = f.iter();
        assert!(!it.has_next());
        assert!(it.next().is_none());
    }
}
