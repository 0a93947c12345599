use crate::constants::MODBUS_MAX_REGISTERS;
use crate::error::SunSpecError;
use crate::model::point::Point;
use crate::model::schema::{BlockDef, BlockKind};

/// One contiguous register write produced from dirty points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRun {
    pub addr: u16,
    pub data: Vec<u8>,
}

impl WriteRun {
    /// Length in registers.
    pub fn registers(&self) -> usize {
        self.data.len() / 2
    }

    fn end_addr(&self) -> usize {
        usize::from(self.addr) + self.registers()
    }
}

/// Instance of a block definition at an absolute address.
#[derive(Debug, Clone)]
pub struct Block {
    kind: BlockKind,
    index: usize,
    addr: u16,
    len: u16,
    pub(crate) points: Vec<Point>,
}

impl Block {
    /// Instantiate `def` at `addr`. Points that do not fit within `len`
    /// are left out.
    pub(crate) fn new(def: &BlockDef, index: usize, addr: u16, len: u16) -> Result<Block, SunSpecError> {
        let points = def
            .points
            .iter()
            .filter(|p| u32::from(p.offset) + u32::from(p.len) <= u32::from(len))
            .map(|p| Point::new(p.clone(), addr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Block {
            kind: def.kind,
            index,
            addr,
            len,
            points,
        })
    }

    /// Placeholder fixed block for models defined without one.
    pub(crate) fn empty(addr: u16) -> Block {
        Block {
            kind: BlockKind::Fixed,
            index: 0,
            addr,
            len: 0,
            points: Vec::new(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// 0 for the fixed block, 1.. for repeating blocks.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// Length in registers.
    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point(&self, id: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.id() == id)
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.points.iter().position(|p| p.id() == id)
    }

    /// Update every point from the block's register bytes.
    pub(crate) fn decode(&mut self, buf: &[u8]) {
        let base = self.addr;
        for point in &mut self.points {
            let start = usize::from(point.addr() - base) * 2;
            point.decode(buf.get(start..).unwrap_or(&[]));
        }
    }

    /// Collect dirty points into contiguous runs and clear their flags.
    ///
    /// A clean point, an address gap or the per-transaction register limit
    /// ends a run.
    pub(crate) fn take_dirty_runs(&mut self) -> Vec<WriteRun> {
        let mut runs = Vec::new();
        let mut current: Option<WriteRun> = None;

        for point in &mut self.points {
            if !point.is_dirty() {
                runs.extend(current.take());
                continue;
            }
            point.clear_dirty();

            let extends = current.as_ref().is_some_and(|run| {
                run.end_addr() == usize::from(point.addr())
                    && run.registers() + usize::from(point.len()) <= usize::from(MODBUS_MAX_REGISTERS)
            });
            if !extends {
                runs.extend(current.take());
            }
            let run = current.get_or_insert_with(|| WriteRun {
                addr: point.addr(),
                data: Vec::new(),
            });
            point.value().encode(&mut run.data);
        }
        runs.extend(current);
        runs
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.points.iter_mut().for_each(Point::clear_dirty);
    }

    /// Compare point values with another instance of the same block.
    pub fn values_eq(&self, other: &Block) -> bool {
        self.points.len() == other.points.len()
            && self.points.iter().zip(&other.points).all(|(a, b)| a.value_eq(b))
    }
}
