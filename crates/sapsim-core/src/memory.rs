//! 2 KiB RAM with a memory-address register and a read latch.

use crate::clocked::{Clocked, Wires};
use crate::control::Signal;
use crate::fault::SimError;

/// RAM size in bytes.
pub const MEMORY_BYTES: usize = 2048;

const ADDRESS_MASK: u16 = 0x07FF;

/// Memory unit state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    ram: Box<[u8]>,
    mar: u16,
    out: u8,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            ram: vec![0; MEMORY_BYTES].into_boxed_slice(),
            mar: 0,
            out: 0,
        }
    }
}

impl Memory {
    /// Copies a program image to address zero.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ProgramTooLarge`] when the image does not fit; the
    /// memory is left untouched in that case.
    pub fn load(&mut self, image: &[u8]) -> Result<(), SimError> {
        if image.len() > MEMORY_BYTES {
            return Err(SimError::ProgramTooLarge {
                len: image.len(),
                capacity: MEMORY_BYTES,
            });
        }
        self.ram[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Reads one byte. Only the low 11 address bits are decoded.
    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        self.ram[usize::from(address & ADDRESS_MASK)]
    }

    /// Reads a little-endian word at `address`.
    #[must_use]
    pub fn read_word(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.read(address), self.read(address.wrapping_add(1))])
    }

    /// Bytes from `address` up to (not including) the first `terminator`,
    /// wrapping around the address space. Returns `None` if no terminator is
    /// found within one full pass over memory.
    #[must_use]
    pub fn read_until(&self, address: u16, terminator: u8) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut cursor = address;
        for _ in 0..MEMORY_BYTES {
            let byte = self.read(cursor);
            if byte == terminator {
                return Some(bytes);
            }
            bytes.push(byte);
            cursor = cursor.wrapping_add(1);
        }
        None
    }

    /// Whole RAM contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.ram
    }

    /// Memory-address register.
    #[must_use]
    pub const fn mar(&self) -> u16 {
        self.mar
    }

    /// Read latch, refreshed every tock to `ram[MAR]`.
    #[must_use]
    pub const fn out(&self) -> u8 {
        self.out
    }
}

impl Clocked for Memory {
    fn posedge(&mut self, wires: &Wires) -> Result<(), SimError> {
        let mar_we = wires.ctrl.contains(Signal::MemMarWe);
        let we = wires.ctrl.contains(Signal::MemWe);
        if mar_we && we {
            return Err(SimError::MemoryWriteConflict);
        }
        if mar_we {
            self.mar = wires.bus;
        } else if we {
            self.ram[usize::from(self.mar & ADDRESS_MASK)] = wires.bus_byte();
        }
        Ok(())
    }

    fn always(&mut self, _wires: &Wires) -> Result<(), SimError> {
        self.out = self.read(self.mar);
        Ok(())
    }

    fn reset(&mut self) {
        self.ram.fill(0);
        self.mar = 0;
        self.out = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Memory, MEMORY_BYTES};
    use crate::clocked::{Clocked, Wires};
    use crate::control::{ControlWord, Signal};
    use crate::fault::SimError;

    fn edge(memory: &mut Memory, signal: Signal, bus: u16) {
        memory
            .posedge(&Wires {
                ctrl: ControlWord::EMPTY.with(signal),
                bus,
                ..Wires::default()
            })
            .unwrap();
    }

    #[test]
    fn load_places_image_at_address_zero() {
        let mut memory = Memory::default();
        memory.load(&[0x3E, 0x05, 0x76]).unwrap();
        assert_eq!(&memory.bytes()[..4], &[0x3E, 0x05, 0x76, 0x00]);
    }

    #[test]
    fn oversized_image_is_rejected() {
        let mut memory = Memory::default();
        let image = vec![0xAA; MEMORY_BYTES + 1];
        assert_eq!(
            memory.load(&image),
            Err(SimError::ProgramTooLarge {
                len: MEMORY_BYTES + 1,
                capacity: MEMORY_BYTES
            })
        );
        assert!(memory.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn mar_then_write_then_read_back() {
        let mut memory = Memory::default();
        edge(&mut memory, Signal::MemMarWe, 0x0123);
        edge(&mut memory, Signal::MemWe, 0xAB55);
        memory.always(&Wires::default()).unwrap();
        assert_eq!(memory.out(), 0x55);
        assert_eq!(memory.read(0x0123), 0x55);
    }

    #[test]
    fn addresses_decode_modulo_capacity() {
        let mut memory = Memory::default();
        edge(&mut memory, Signal::MemMarWe, 0x0800 + 4);
        edge(&mut memory, Signal::MemWe, 9);
        assert_eq!(memory.read(4), 9);
        assert_eq!(memory.mar(), 0x0804);
    }

    #[test]
    fn address_and_data_write_together_is_rejected() {
        let mut memory = Memory::default();
        let ctrl = ControlWord::EMPTY
            .with(Signal::MemMarWe)
            .with(Signal::MemWe);
        assert_eq!(
            memory.posedge(&Wires {
                ctrl,
                ..Wires::default()
            }),
            Err(SimError::MemoryWriteConflict)
        );
    }

    #[test]
    fn words_are_little_endian_and_strings_stop_at_terminator() {
        let mut memory = Memory::default();
        memory.load(b"\x05\x00hi$").unwrap();
        assert_eq!(memory.read_word(0), 0x0005);
        assert_eq!(memory.read_until(2, b'$'), Some(b"hi".to_vec()));
        assert_eq!(memory.read_until(2, b'#'), None);
    }
}
