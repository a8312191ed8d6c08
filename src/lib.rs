//! AMD64 machine-code encoder for the Quill compiler backend.
//!
//! Takes one architecture-level assembly instruction at a time (mnemonic
//! plus typed operands, produced after register allocation) and emits the
//! exact bytes of its x86-64 encoding: legacy prefix, REX or VEX, opcode,
//! ModR/M, SIB, displacement and immediate.
//!
//! The pipeline is `AsmInst -> select -> fill -> serialize`:
//!
//! 1. [`OpcodeTable::select`] walks a trie keyed by mnemonic and
//!    `(operand kind, size)` pairs and picks the single best matching
//!    [`InstForm`] from the catalog.
//! 2. `fill` materializes the form's extensions and the instruction's
//!    operands into a [`BinaryFormat`] record, applying the addressing
//!    special cases (RBP/R13 bases, RSP/R12 SIB escapes, RIP-relative,
//!    fs/gs absolute offsets).
//! 3. [`BinaryFormat::to_bytes`] serializes the record in canonical field
//!    order.
//!
//! The table is built once and immutable afterwards; encoding itself is a
//! pure function and callers may encode from any number of threads. The
//! returned [`FormId`] identifies the chosen catalog entry so the object
//! writer can derive relocation types for branch and RIP-relative fix-ups.
//!
//! ```
//! use quill_amd64::{encode, register, AsmInst, AsmOperand, OpcodeTable};
//!
//! let table = OpcodeTable::global();
//! let inst = AsmInst::new(
//!     "mov",
//!     vec![
//!         AsmOperand::Reg(register::RAX),
//!         AsmOperand::Reg(register::RBX),
//!     ],
//! );
//! let encoded = encode(table, &inst).unwrap();
//! assert_eq!(encoded.bytes, [0x48, 0x89, 0xD8]);
//! ```

mod catalog;
mod encode;
mod error;
mod form;
mod format;
mod operand;
pub mod register;
mod select;

pub use encode::{encode, EncodedInst};
pub use error::EncodeError;
pub use form::{FormId, FormOperand, InstForm, OpcodeExt, OperandEncoding, OperandKind};
pub use format::{BinaryFormat, ModRm, RexPrefix, Sib, VexMap, VexPrefix};
pub use operand::{AsmInst, AsmOperand, AsmOperandKind, Segment};
pub use register::Register;
pub use select::OpcodeTable;
