use crate::jvm::class_file::{ClassConstantIndex, ConstantsPool, Serialize};
use crate::jvm::code::{Edge, EdgeKind, Label, LabelArena, OBJECT_FRAME_TYPE};
use crate::jvm::Error;
use byteorder::WriteBytesExt;

/// One `try`/`catch` (or `finally`) region of a method body
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// First block of the protected range (inclusive)
    pub start: Label,

    /// Block just past the protected range (exclusive)
    pub end: Label,

    /// Block the handler starts at
    pub handler: Label,

    /// Internal name of the class caught, `None` for a catch-all
    pub catch_descriptor: Option<String>,

    /// Pool index of the caught class, `CATCH_ALL` for a catch-all
    pub catch_type: ClassConstantIndex,
}

/// Exception table of one method body under construction
///
/// Handlers accumulate while the body is built; once every block is linked
/// into layout order the table can flow exception edges into the control flow
/// graph and serialize itself into the `Code` attribute.
#[derive(Debug, Default)]
pub struct ExceptionHandling {
    handlers: Vec<ExceptionHandler>,
}

impl ExceptionHandling {
    pub fn new() -> ExceptionHandling {
        ExceptionHandling { handlers: vec![] }
    }

    /// Record a handler, interning the caught class into the pool
    pub fn add_handler(
        &mut self,
        pool: &mut ConstantsPool,
        start: Label,
        end: Label,
        handler: Label,
        catch_class: Option<&str>,
    ) -> Result<(), Error> {
        let catch_type = match catch_class {
            Some(name) => pool.get_class(name)?,
            None => ClassConstantIndex::CATCH_ALL,
        };
        self.handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_descriptor: catch_class.map(str::to_owned),
            catch_type,
        });
        Ok(())
    }

    pub fn handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    /// Add an exception edge from every block of each protected range to its
    /// handler
    ///
    /// Used when the class version does not require stack map frames.
    pub fn complete_control_flow_graph(&self, labels: &mut LabelArena) -> Result<(), Error> {
        for handler in &self.handlers {
            flow_range(labels, handler, EdgeKind::Exception)?;
        }
        Ok(())
    }

    /// Like [`ExceptionHandling::complete_control_flow_graph`], but each edge
    /// carries the verification frame type of the caught class and every
    /// handler block is marked as a jump target
    ///
    /// A catch-all handler receives `java/lang/Throwable` on the stack.
    pub fn complete_control_flow_graph_with_frames(
        &self,
        labels: &mut LabelArena,
        pool: &mut ConstantsPool,
    ) -> Result<(), Error> {
        for handler in &self.handlers {
            let caught = handler
                .catch_descriptor
                .as_deref()
                .unwrap_or("java/lang/Throwable");
            let class_index = pool.get_class(caught)?;
            let kind = EdgeKind::TypedException(OBJECT_FRAME_TYPE | class_index.0 .0 as u32);

            labels.mark_target(handler.handler);
            flow_range(labels, handler, kind)?;
        }
        Ok(())
    }

    /// Serialize the exception table: entry count, then start, end, handler
    /// offsets and the catch type of each handler
    pub fn put<W: WriteBytesExt>(&self, labels: &LabelArena, writer: &mut W) -> Result<(), Error> {
        (self.handlers.len() as u16).serialize(writer)?;
        for handler in &self.handlers {
            labels.offset(handler.start)?.serialize(writer)?;
            labels.offset(handler.end)?.serialize(writer)?;
            labels.offset(handler.handler)?.serialize(writer)?;
            handler.catch_type.serialize(writer)?;
        }
        Ok(())
    }
}

/// Walk the blocks of `handler`'s protected range in layout order, adding one
/// edge to the handler per block
///
/// Every step canonicalizes, so ranges whose boundary labels were merged are
/// walked exactly once per surviving block. A range whose blocks are not
/// linked through to its end is a hard error rather than an endless walk.
fn flow_range(
    labels: &mut LabelArena,
    handler: &ExceptionHandler,
    kind: EdgeKind,
) -> Result<(), Error> {
    let target = labels.canonical(handler.handler);
    let end = labels.canonical(handler.end);
    let mut current = labels.canonical(handler.start);

    while current != end {
        labels.add_edge(current, Edge { kind, target });
        let next = labels
            .next(current)
            .ok_or(Error::BrokenHandlerRange { reached: current })?;
        current = labels.canonical(next);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Chain `count` fresh blocks in layout order
    fn block_chain(arena: &mut LabelArena, count: usize) -> Vec<Label> {
        let blocks: Vec<Label> = (0..count).map(|_| arena.fresh_label()).collect();
        for pair in blocks.windows(2) {
            arena.link(pair[0], pair[1]);
        }
        blocks
    }

    fn exception_edges(arena: &LabelArena, block: Label) -> Vec<Edge> {
        arena.successors(block).to_vec()
    }

    #[test]
    fn every_block_in_range_gains_a_handler_edge() {
        let mut arena = LabelArena::new();
        let blocks = block_chain(&mut arena, 4);
        let handler_block = arena.fresh_label();

        let mut pool = ConstantsPool::new();
        let mut handling = ExceptionHandling::new();
        handling
            .add_handler(
                &mut pool,
                blocks[0],
                blocks[2],
                handler_block,
                Some("java/io/IOException"),
            )
            .unwrap();
        handling.complete_control_flow_graph(&mut arena).unwrap();

        for covered in &blocks[..2] {
            let edges = exception_edges(&arena, *covered);
            assert_eq!(edges.len(), 1);
            assert_eq!(edges[0].kind, EdgeKind::Exception);
            assert_eq!(edges[0].target, handler_block);
        }
        assert!(exception_edges(&arena, blocks[2]).is_empty());
        assert!(exception_edges(&arena, blocks[3]).is_empty());
    }

    #[test]
    fn merged_range_boundaries_walk_each_block_once() {
        let mut arena = LabelArena::new();
        let blocks = block_chain(&mut arena, 3);
        let handler_block = arena.fresh_label();

        // an alias of the first block, as left behind by a peephole merge
        let alias = arena.fresh_label();
        arena.merge(alias, blocks[0]);

        let mut pool = ConstantsPool::new();
        let mut handling = ExceptionHandling::new();
        handling
            .add_handler(&mut pool, alias, blocks[2], handler_block, None)
            .unwrap();
        handling.complete_control_flow_graph(&mut arena).unwrap();

        assert_eq!(exception_edges(&arena, blocks[0]).len(), 1);
        assert_eq!(exception_edges(&arena, blocks[1]).len(), 1);
        assert!(exception_edges(&arena, blocks[2]).is_empty());
    }

    #[test]
    fn unlinked_range_is_a_hard_error() {
        let mut arena = LabelArena::new();
        let start = arena.fresh_label();
        let end = arena.fresh_label();
        let handler_block = arena.fresh_label();

        let mut pool = ConstantsPool::new();
        let mut handling = ExceptionHandling::new();
        handling
            .add_handler(&mut pool, start, end, handler_block, None)
            .unwrap();

        match handling.complete_control_flow_graph(&mut arena) {
            Err(Error::BrokenHandlerRange { reached }) => assert_eq!(reached, start),
            other => panic!("expected broken range, got {:?}", other.ok()),
        }
    }

    #[test]
    fn frame_edges_carry_the_caught_class() {
        let mut arena = LabelArena::new();
        let blocks = block_chain(&mut arena, 2);
        let handler_block = arena.fresh_label();

        let mut pool = ConstantsPool::new();
        let mut handling = ExceptionHandling::new();
        handling
            .add_handler(&mut pool, blocks[0], blocks[1], handler_block, None)
            .unwrap();
        handling
            .complete_control_flow_graph_with_frames(&mut arena, &mut pool)
            .unwrap();

        let throwable = pool.get_class("java/lang/Throwable").unwrap();
        let edges = exception_edges(&arena, blocks[0]);
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0].kind,
            EdgeKind::TypedException(OBJECT_FRAME_TYPE | throwable.0 .0 as u32)
        );
        assert!(arena.is_target(handler_block));
    }

    #[test]
    fn serialized_table_uses_placed_offsets() {
        let mut arena = LabelArena::new();
        let blocks = block_chain(&mut arena, 2);
        let handler_block = arena.fresh_label();
        arena.place(blocks[0], 0);
        arena.place(blocks[1], 12);
        arena.place(handler_block, 20);

        let mut pool = ConstantsPool::new();
        let mut handling = ExceptionHandling::new();
        handling
            .add_handler(&mut pool, blocks[0], blocks[1], handler_block, None)
            .unwrap();

        let mut bytes = vec![];
        handling.put(&arena, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 1, 0, 0, 0, 12, 0, 20, 0, 0]);
    }
}
