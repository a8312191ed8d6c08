//! Encoder error types.
//!
//! Every variant is a programming error somewhere upstream: either the form
//! catalog is malformed or the backend emitted an operand shape the catalog
//! does not support. The enclosing toolchain aborts the function being
//! emitted; there is no recovery at this level.

use crate::form::OperandEncoding;
use crate::operand::AsmOperandKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The mnemonic has no entry in the form lookup trie.
    #[error("unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { mnemonic: String },

    /// The instruction's operand shape has no usable form. Either trie
    /// descent failed at operand `slot`, or the whole shape matched but the
    /// post-filter candidate set came up empty (high-byte registers
    /// excluding every remaining REX form); the latter reports
    /// `slot == operand count` and the last operand's kind/size.
    #[error(
        "no `{mnemonic}` form takes {kind:?} of {size} byte(s) at operand {slot} \
         (high-byte reg: {has_high_byte_reg}, rex required: {needs_rex})"
    )]
    UnmatchedOperands {
        mnemonic: String,
        slot: usize,
        kind: AsmOperandKind,
        size: u8,
        has_high_byte_reg: bool,
        needs_rex: bool,
    },

    /// A form declared an operand role that cannot consume the supplied
    /// high-level operand kind.
    #[error("form `{form}` cannot encode a {kind:?} operand as {encoding:?}")]
    UnsupportedEncoding {
        form: &'static str,
        encoding: OperandEncoding,
        kind: AsmOperandKind,
    },
}
