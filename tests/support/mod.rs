//! Shared helpers for building simulated SunSpec register maps.

#![allow(dead_code)]

use sunspec_rs::SimTransport;

/// Registers spelling "SunS".
pub const MAGIC: [u16; 2] = [0x5375, 0x6E53];

/// Builds the register image of a SunSpec device: marker, model records
/// and the end marker.
pub struct MapBuilder {
    base: u16,
    regs: Vec<u16>,
}

impl MapBuilder {
    pub fn new(base: u16) -> Self {
        MapBuilder {
            base,
            regs: MAGIC.to_vec(),
        }
    }

    /// A model record with the given payload; its length is the payload length.
    pub fn model(mut self, id: u16, payload: &[u16]) -> Self {
        self.regs.push(id);
        self.regs.push(payload.len() as u16);
        self.regs.extend_from_slice(payload);
        self
    }

    /// A model record of `len` zeroed registers.
    pub fn zeroed(self, id: u16, len: u16) -> Self {
        self.model(id, &vec![0; usize::from(len)])
    }

    /// A header with an arbitrary length and no payload behind it.
    pub fn header(mut self, id: u16, len: u16) -> Self {
        self.regs.push(id);
        self.regs.push(len);
        self
    }

    pub fn end(mut self) -> Self {
        self.regs.push(0xFFFF);
        self.regs.push(0);
        self
    }

    pub fn registers(&self) -> &[u16] {
        &self.regs
    }

    pub fn sim(self) -> SimTransport {
        SimTransport::with_registers(self.base, self.regs)
    }
}

/// Pack `text` into `len` registers, NUL padded.
pub fn string_regs(text: &str, len: usize) -> Vec<u16> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(len * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// Common model payload (66 registers) with manufacturer, model and serial set.
pub fn common_payload(mn: &str, md: &str, sn: &str) -> Vec<u16> {
    let mut regs = Vec::with_capacity(66);
    regs.extend(string_regs(mn, 16));
    regs.extend(string_regs(md, 16));
    regs.extend(string_regs("", 8));
    regs.extend(string_regs("1.0", 8));
    regs.extend(string_regs(sn, 16));
    regs.push(1);
    regs.push(0x8000);
    regs
}
