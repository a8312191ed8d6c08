//! Form lookup: a keyed trie over mnemonic and operand shapes.
//!
//! The trie is built once from the catalog and never mutated again: root ->
//! mnemonic group -> one `(high-level kind, size)` key per operand slot ->
//! leaf holding every form that accepts that shape. A low-level slot kind
//! expands to several keys (an `rm64` slot is reachable from a register, an
//! indirect access, a displacement, RIP-relative and SIB operands), so one
//! form is registered under every path it can serve.

use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;

use crate::catalog::catalog;
use crate::error::EncodeError;
use crate::form::{FormId, InstForm};
use crate::operand::{AsmInst, AsmOperandKind};

#[derive(Default)]
struct TrieNode {
    forms: Vec<FormId>,
    succs: HashMap<(AsmOperandKind, u8), TrieNode>,
}

/// The process-lifetime form table: catalog plus lookup trie.
///
/// Build it once with [`OpcodeTable::build`] (tests may build their own) or
/// share the process-wide instance from [`OpcodeTable::global`]. After the
/// build the table is immutable and safe to use from any number of threads.
pub struct OpcodeTable {
    forms: Vec<InstForm>,
    root: HashMap<&'static str, TrieNode>,
}

/// Outcome of form selection, fed to the fill phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selection {
    pub form: FormId,
    pub needs_rex: bool,
}

impl OpcodeTable {
    /// Builds the table from the full catalog.
    pub fn build() -> OpcodeTable {
        let forms = catalog();
        let mut root: HashMap<&'static str, TrieNode> = HashMap::new();
        for (index, form) in forms.iter().enumerate() {
            let node = root.entry(form.group).or_default();
            insert(node, form, FormId(index as u16), 0);
        }
        OpcodeTable { forms, root }
    }

    /// Returns the shared process-wide table, building it on first use.
    pub fn global() -> &'static OpcodeTable {
        static GLOBAL: OnceLock<OpcodeTable> = OnceLock::new();
        GLOBAL.get_or_init(OpcodeTable::build)
    }

    /// Looks a chosen form back up by its id.
    pub fn form(&self, id: FormId) -> &InstForm {
        &self.forms[id.index()]
    }

    /// Iterates over every catalog entry with its id.
    pub fn forms(&self) -> impl Iterator<Item = (FormId, &InstForm)> {
        self.forms
            .iter()
            .enumerate()
            .map(|(index, form)| (FormId(index as u16), form))
    }

    /// Picks the single form that will encode `inst`.
    ///
    /// Descends the trie by mnemonic and operand keys, filters out REX forms
    /// when a high-byte register is present (they cannot coexist), then
    /// stable-sorts the survivors by the first operand's low-level kind and
    /// takes the smallest. Ties beyond that keep catalog registration order.
    pub(crate) fn select(&self, inst: &AsmInst) -> Result<Selection, EncodeError> {
        let mut needs_rex = false;
        let mut has_high_byte_reg = false;
        for operand in &inst.operands {
            for reg in operand.registers() {
                needs_rex |= reg.requires_rex();
                has_high_byte_reg |= reg.is_high_byte();
            }
        }

        let mut node = self
            .root
            .get(inst.mnemonic)
            .ok_or_else(|| EncodeError::UnknownMnemonic {
                mnemonic: inst.mnemonic.to_string(),
            })?;

        for (slot, operand) in inst.operands.iter().enumerate() {
            let key = (operand.kind(), operand.size());
            node = node
                .succs
                .get(&key)
                .ok_or_else(|| EncodeError::UnmatchedOperands {
                    mnemonic: inst.mnemonic.to_string(),
                    slot,
                    kind: operand.kind(),
                    size: operand.size(),
                    has_high_byte_reg,
                    needs_rex,
                })?;
        }

        let mut candidates: Vec<FormId> = node
            .forms
            .iter()
            .copied()
            .filter(|&id| !(has_high_byte_reg && self.form(id).has_rex_ext()))
            .collect();

        if candidates.is_empty() {
            // the whole shape matched but no form survived filtering (or the
            // group has no form of this arity); reported as an unmatched
            // shape with slot = operand count and the last operand's key
            let last = inst.operands.last();
            return Err(EncodeError::UnmatchedOperands {
                mnemonic: inst.mnemonic.to_string(),
                slot: inst.operands.len(),
                kind: last.map_or(AsmOperandKind::Uint, |op| op.kind()),
                size: last.map_or(0, |op| op.size()),
                has_high_byte_reg,
                needs_rex,
            });
        }

        candidates.sort_by_key(|&id| self.form(id).operands.first().map(|op| op.kind));
        let form = candidates[0];
        debug!(
            "selected `{}` form {:?} for {}/{} operand(s)",
            self.form(form).name,
            form,
            inst.mnemonic,
            inst.operands.len()
        );
        Ok(Selection { form, needs_rex })
    }
}

fn insert(node: &mut TrieNode, form: &InstForm, id: FormId, slot: usize) {
    if slot == form.operands.len() {
        node.forms.push(id);
        return;
    }
    for key in form.operands[slot].kind.expand() {
        insert(node.succs.entry(key).or_default(), form, id, slot + 1);
    }
}
