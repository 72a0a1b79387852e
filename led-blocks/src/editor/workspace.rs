use std::collections::BTreeMap;

use crate::error::SinkError;
use crate::ir::BlockKind;

use super::{BlockSink, BlockSource, FieldValue};

/// Handle of a block inside a [`Workspace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef(usize);

#[derive(Debug, Clone)]
pub struct BlockData {
    pub id: String,
    pub kind: BlockKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub inputs: BTreeMap<String, BlockRef>,
    pub next: Option<BlockRef>,
    pub parent: Option<BlockRef>,
}

/// In-memory block editor: an arena of blocks and their connections
#[derive(Debug, Default)]
pub struct Workspace {
    blocks: Vec<BlockData>,
    id_counter: usize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, block: BlockRef) -> Option<&BlockData> {
        self.blocks.get(block.0)
    }

    pub fn block_by_id(&self, id: &str) -> Option<BlockRef> {
        self.blocks.iter().position(|data| data.id == id).map(BlockRef)
    }

    /// Creates a detached block with a fresh id (`b1`, `b2`, ...)
    pub fn add_block(&mut self, kind: BlockKind) -> BlockRef {
        self.id_counter += 1;
        self.blocks.push(BlockData {
            id: format!("b{}", self.id_counter),
            kind,
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            next: None,
            parent: None,
        });
        BlockRef(self.blocks.len() - 1)
    }

    pub fn blocks_of_kind(&self, kind: BlockKind) -> Vec<BlockRef> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, data)| data.kind == kind)
            .map(|(index, _)| BlockRef(index))
            .collect()
    }

    fn data(&self, block: BlockRef) -> Result<&BlockData, SinkError> {
        self.blocks.get(block.0).ok_or(SinkError::UnknownBlock)
    }

    fn data_mut(&mut self, block: BlockRef) -> Result<&mut BlockData, SinkError> {
        self.blocks.get_mut(block.0).ok_or(SinkError::UnknownBlock)
    }

    /// Отсоединяет блок от прежнего родителя (вход или next)
    fn detach(&mut self, child: BlockRef) -> Result<(), SinkError> {
        let Some(parent) = self.data(child)?.parent else {
            return Ok(());
        };
        let parent_data = self.data_mut(parent)?;
        if parent_data.next == Some(child) {
            parent_data.next = None;
        }
        parent_data.inputs.retain(|_, connected| *connected != child);
        self.data_mut(child)?.parent = None;
        Ok(())
    }

    fn is_ancestor(&self, candidate: BlockRef, block: BlockRef) -> bool {
        let mut cursor = Some(block);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.blocks.get(current.0).and_then(|data| data.parent);
        }
        false
    }

    fn connect_input(
        &mut self,
        parent: BlockRef,
        input: &str,
        child: BlockRef,
    ) -> Result<(), SinkError> {
        let parent_kind = self.data(parent)?.kind;
        let child_kind = self.data(child)?.kind;
        if self.is_ancestor(child, parent) {
            return Err(SinkError::Connection {
                parent: parent_kind,
                child: child_kind,
                message: "connection would create a cycle".to_string(),
            });
        }

        self.detach(child)?;
        // Занятый вход освобождаем: прежний блок становится верхним
        if let Some(previous) = self.data(parent)?.inputs.get(input).copied() {
            self.detach(previous)?;
        }
        self.data_mut(parent)?.inputs.insert(input.to_string(), child);
        self.data_mut(child)?.parent = Some(parent);
        Ok(())
    }
}

impl BlockSource for Workspace {
    type Block = BlockRef;

    fn top_blocks(&self) -> Vec<BlockRef> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, data)| data.parent.is_none())
            .map(|(index, _)| BlockRef(index))
            .collect()
    }

    fn kind(&self, block: BlockRef) -> Option<&str> {
        self.block(block).map(|data| data.kind.name())
    }

    fn block_id(&self, block: BlockRef) -> Option<&str> {
        self.block(block).map(|data| data.id.as_str())
    }

    fn field(&self, block: BlockRef, name: &str) -> Option<FieldValue> {
        self.block(block)?.fields.get(name).cloned()
    }

    fn child_statement(&self, block: BlockRef, input: &str) -> Option<BlockRef> {
        let data = self.block(block)?;
        if !data.kind.statement_inputs().contains(&input) {
            return None;
        }
        data.inputs.get(input).copied()
    }

    fn child_expression(&self, block: BlockRef, input: &str) -> Option<BlockRef> {
        let data = self.block(block)?;
        if !data.kind.value_inputs().contains(&input) {
            return None;
        }
        data.inputs.get(input).copied()
    }

    fn next_block(&self, block: BlockRef) -> Option<BlockRef> {
        self.block(block)?.next
    }
}

impl BlockSink for Workspace {
    type Block = BlockRef;

    fn allocate(&mut self, kind: BlockKind) -> Result<BlockRef, SinkError> {
        Ok(self.add_block(kind))
    }

    fn set_field(&mut self, block: BlockRef, name: &str, value: FieldValue) -> Result<(), SinkError> {
        let data = self.data_mut(block)?;
        if !data.kind.fields().contains(&name) {
            return Err(SinkError::MissingField {
                kind: data.kind,
                field: name.to_string(),
            });
        }
        data.fields.insert(name.to_string(), value);
        Ok(())
    }

    fn connect_statement(
        &mut self,
        parent: BlockRef,
        input: &str,
        child: BlockRef,
    ) -> Result<(), SinkError> {
        let parent_kind = self.data(parent)?.kind;
        let child_kind = self.data(child)?.kind;
        if !parent_kind.statement_inputs().contains(&input) {
            return Err(SinkError::MissingInput {
                kind: parent_kind,
                input: input.to_string(),
            });
        }
        if !child_kind.has_previous_connection() {
            return Err(SinkError::Connection {
                parent: parent_kind,
                child: child_kind,
                message: "block has no previous connection".to_string(),
            });
        }
        self.connect_input(parent, input, child)
    }

    fn connect_expression(
        &mut self,
        parent: BlockRef,
        input: &str,
        child: BlockRef,
    ) -> Result<(), SinkError> {
        let parent_kind = self.data(parent)?.kind;
        let child_kind = self.data(child)?.kind;
        if !parent_kind.value_inputs().contains(&input) {
            return Err(SinkError::MissingInput {
                kind: parent_kind,
                input: input.to_string(),
            });
        }
        if !child_kind.is_expression() {
            return Err(SinkError::Connection {
                parent: parent_kind,
                child: child_kind,
                message: "block has no output connection".to_string(),
            });
        }
        self.connect_input(parent, input, child)
    }

    fn connect_next(&mut self, previous: BlockRef, next: BlockRef) -> Result<(), SinkError> {
        let previous_kind = self.data(previous)?.kind;
        let next_kind = self.data(next)?.kind;
        if !previous_kind.has_next_connection() || !next_kind.has_previous_connection() {
            return Err(SinkError::Connection {
                parent: previous_kind,
                child: next_kind,
                message: "blocks cannot be chained".to_string(),
            });
        }
        if self.is_ancestor(next, previous) {
            return Err(SinkError::Connection {
                parent: previous_kind,
                child: next_kind,
                message: "connection would create a cycle".to_string(),
            });
        }

        self.detach(next)?;
        if let Some(bumped) = self.data(previous)?.next {
            self.detach(bumped)?;
        }
        self.data_mut(previous)?.next = Some(next);
        self.data_mut(next)?.parent = Some(previous);
        Ok(())
    }
}
