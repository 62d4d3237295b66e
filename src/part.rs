//! Static per-chip descriptions and the live state layered on them: named
//! instructions with fixed-width opcodes, named data registers, the boundary
//! scan bit table and signal bindings.  Parts are built from catalog
//! descriptions (the file loader that produces descriptions is a client of
//! this crate, not part of it).

use crate::error::{Error, Result};
use crate::idcode::IdCode;
use crate::register::BitRegister;

/// Mandatory 1-bit bypass register, present on every part.
pub const BYPASS_REGISTER: &str = "BYPASS";
/// The boundary-scan register, created when boundary bits are described.
pub const BSR_REGISTER: &str = "BSR";
/// The 32-bit device identification register, created when an IDCODE is
/// known.
pub const DIR_REGISTER: &str = "DIR";
/// The mandatory BYPASS instruction (all-ones opcode per 1149.1).
pub const BYPASS_INSTRUCTION: &str = "BYPASS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BsBitKind {
    /// Captures a pin; cannot be driven.
    Input,
    /// Drives a pin.
    Output,
    /// Drives an output-enable or similar control cell.
    Control,
    /// Not connected to any pin.
    Internal,
}

/// One cell of the boundary-scan register.  `position` is the bit index in
/// the BSR and is unique within a part.
#[derive(Clone, Debug)]
pub struct BoundaryBit {
    pub position: usize,
    pub name: String,
    pub kind: BsBitKind,
    /// Signal this cell observes or drives, if any.
    pub signal: Option<String>,
    /// Value that keeps the pin inert (loaded into the BSR at build time).
    pub safe: bool,
    /// `(controlling cell position, value that enables the driver)`.
    pub control: Option<(usize, bool)>,
}

/// A named shift register on the part.  `value` is both the pattern shifted
/// in on the next DR scan and the capture from the last one; `previous`
/// holds the capture before that, for change detection.
#[derive(Clone, Debug)]
pub struct DataRegister {
    name: String,
    pub value: BitRegister,
    pub previous: BitRegister,
}

impl DataRegister {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            value: BitRegister::new(len),
            previous: BitRegister::new(len),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Did the last capture differ from the one before it?
    pub fn changed(&self) -> bool {
        self.value != self.previous
    }
}

#[derive(Clone, Debug)]
pub struct Instruction {
    name: String,
    opcode: BitRegister,
    data_register: Option<String>,
}

impl Instruction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn opcode(&self) -> &BitRegister {
        &self.opcode
    }

    /// Name of the data register this instruction places between TDI and
    /// TDO, if it addresses one.
    pub fn data_register_name(&self) -> Option<&str> {
        self.data_register.as_deref()
    }
}

/// Everything needed to instantiate a `Part`, as loaded from a part
/// description file by an external parser.  Instruction opcodes are given in
/// register string form (`0`/`1`/`x`, bit 0 first) and must match
/// `ir_length`.  The BYPASS register/instruction pair, the BSR and the DIR
/// are created automatically and may be referenced by name.
#[derive(Clone, Debug, Default)]
pub struct PartDescription {
    pub manufacturer: String,
    pub part_number: String,
    pub stepping: String,
    pub idcode: Option<u32>,
    pub ir_length: usize,
    pub signals: Vec<String>,
    /// `(name, opcode, bound data register)`
    pub instructions: Vec<(String, String, Option<String>)>,
    /// `(name, length)` registers beyond the automatic ones.
    pub data_registers: Vec<(String, usize)>,
    pub boundary: Vec<BoundaryBit>,
}

/// One chip on the scan chain.
pub struct Part {
    manufacturer: String,
    part_number: String,
    stepping: String,
    idcode: Option<IdCode>,
    ir_length: usize,
    signals: Vec<Signal>,
    instructions: Vec<Instruction>,
    active: usize,
    data_registers: Vec<DataRegister>,
    boundary: Vec<BoundaryBit>,
    /// Bits captured from the instruction column on the last IR shift, for
    /// read-back verification.
    ir_capture: BitRegister,
}

impl Part {
    pub fn from_description(desc: &PartDescription) -> Result<Self> {
        let mut data_registers = Vec::new();
        data_registers.push(DataRegister::new(BYPASS_REGISTER, 1));
        if !desc.boundary.is_empty() {
            // Cell positions must form a dense, unique 0..len range and any
            // control relation must point inside it; descriptions come from
            // external parsers and cannot be trusted.
            let len = desc.boundary.len();
            let mut seen = vec![false; len];
            for bit in &desc.boundary {
                let control_oob = bit.control.is_some_and(|(ctrl, _)| ctrl >= len);
                if bit.position >= len || seen[bit.position] || control_oob {
                    return Err(Error::InvalidBoundary {
                        cell: bit.name.clone(),
                        len,
                    });
                }
                seen[bit.position] = true;
            }
            let mut bsr = DataRegister::new(BSR_REGISTER, len);
            for bit in &desc.boundary {
                bsr.value.set(bit.position, bit.safe);
            }
            data_registers.push(bsr);
        }
        if let Some(code) = desc.idcode {
            let mut dir = DataRegister::new(DIR_REGISTER, 32);
            for i in 0..32 {
                dir.value.set(i, (code >> i) & 1 == 1);
            }
            data_registers.push(dir);
        }
        for (name, len) in &desc.data_registers {
            data_registers.push(DataRegister::new(name.clone(), *len));
        }

        let mut bypass_opcode = BitRegister::new(desc.ir_length);
        bypass_opcode.fill(true);
        let mut instructions = vec![Instruction {
            name: BYPASS_INSTRUCTION.to_string(),
            opcode: bypass_opcode,
            data_register: Some(BYPASS_REGISTER.to_string()),
        }];
        for (name, opcode, reg) in &desc.instructions {
            let mut bits = BitRegister::new(desc.ir_length);
            bits.set_from_str(opcode)?;
            if let Some(reg) = reg {
                if !data_registers.iter().any(|r| r.name() == reg) {
                    return Err(Error::UnknownDataRegister(reg.clone()));
                }
            }
            instructions.push(Instruction {
                name: name.clone(),
                opcode: bits,
                data_register: reg.clone(),
            });
        }

        Ok(Self {
            manufacturer: desc.manufacturer.clone(),
            part_number: desc.part_number.clone(),
            stepping: desc.stepping.clone(),
            idcode: desc.idcode.map(IdCode::new),
            ir_length: desc.ir_length,
            signals: desc
                .signals
                .iter()
                .map(|name| Signal { name: name.clone() })
                .collect(),
            instructions,
            // BYPASS is the defined reset instruction.
            active: 0,
            data_registers,
            boundary: desc.boundary.clone(),
            ir_capture: BitRegister::new(desc.ir_length),
        })
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn stepping(&self) -> &str {
        &self.stepping
    }

    pub fn idcode(&self) -> Option<IdCode> {
        self.idcode
    }

    pub fn ir_length(&self) -> usize {
        self.ir_length
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn boundary(&self) -> &[BoundaryBit] {
        &self.boundary
    }

    /// Soft lookup; callers routinely probe for optional instructions.
    pub fn instruction(&self, name: &str) -> Option<&Instruction> {
        self.instructions.iter().find(|i| i.name() == name)
    }

    /// Soft lookup by register name.
    pub fn data_register(&self, name: &str) -> Option<&DataRegister> {
        self.data_registers.iter().find(|r| r.name() == name)
    }

    pub fn data_register_mut(&mut self, name: &str) -> Option<&mut DataRegister> {
        self.data_registers.iter_mut().find(|r| r.name() == name)
    }

    /// Make `name` the active instruction.  Subsequent data register shifts
    /// target the register it binds.
    pub fn set_instruction(&mut self, name: &str) -> Result<()> {
        match self.instructions.iter().position(|i| i.name() == name) {
            Some(index) => {
                self.active = index;
                Ok(())
            }
            None => Err(Error::UnknownInstruction(name.to_string())),
        }
    }

    pub fn active_instruction(&self) -> &Instruction {
        &self.instructions[self.active]
    }

    /// The data register the active instruction addresses, if any.
    pub fn active_data_register(&self) -> Option<&DataRegister> {
        let name = self.active_instruction().data_register_name()?;
        self.data_register(name)
    }

    pub fn active_data_register_mut(&mut self) -> Option<&mut DataRegister> {
        let name = self
            .active_instruction()
            .data_register_name()?
            .to_string();
        self.data_register_mut(&name)
    }

    /// Instruction bits captured on the last chain IR shift.
    pub fn ir_capture(&self) -> &BitRegister {
        &self.ir_capture
    }

    pub(crate) fn ir_capture_mut(&mut self) -> &mut BitRegister {
        &mut self.ir_capture
    }

    fn boundary_bit_for_signal(&self, name: &str, want_input: bool) -> Result<&BoundaryBit> {
        let bound: Vec<&BoundaryBit> = self
            .boundary
            .iter()
            .filter(|b| b.signal.as_deref() == Some(name))
            .collect();
        if bound.is_empty() {
            return Err(Error::UnknownSignal(name.to_string()));
        }
        bound
            .iter()
            .find(|b| (b.kind == BsBitKind::Input) == want_input)
            .copied()
            .ok_or_else(|| Error::DirectionMismatch(name.to_string()))
    }

    /// Read the captured level of a signal from the boundary-scan register.
    /// The value is whatever the last DR scan with the BSR selected sampled.
    pub fn get_signal(&self, name: &str) -> Result<bool> {
        let bit = self.boundary_bit_for_signal(name, true)?;
        let bsr = self
            .data_register(BSR_REGISTER)
            .ok_or_else(|| Error::UnknownDataRegister(BSR_REGISTER.to_string()))?;
        Ok(bsr.value.get(bit.position).unwrap_or(false))
    }

    /// Stage a level onto a driven signal for the next DR scan, enabling its
    /// control cell if the description names one.  Input-direction signals
    /// are captured, not driven, and are rejected.
    pub fn set_signal(&mut self, name: &str, value: bool) -> Result<()> {
        let bit = self.boundary_bit_for_signal(name, false)?;
        let position = bit.position;
        let control = bit.control;
        let bsr = self
            .data_register_mut(BSR_REGISTER)
            .ok_or_else(|| Error::UnknownDataRegister(BSR_REGISTER.to_string()))?;
        bsr.value.set(position, value);
        if let Some((ctrl, active)) = control {
            bsr.value.set(ctrl, active);
        }
        Ok(())
    }

    /// Disable the driver behind a signal by parking its control cell on the
    /// inactive value.  No-op for driven cells without a control relation.
    pub fn release_signal(&mut self, name: &str) -> Result<()> {
        let bit = self.boundary_bit_for_signal(name, false)?;
        let control = bit.control;
        if let Some((ctrl, active)) = control {
            let bsr = self
                .data_register_mut(BSR_REGISTER)
                .ok_or_else(|| Error::UnknownDataRegister(BSR_REGISTER.to_string()))?;
            bsr.value.set(ctrl, !active);
        }
        Ok(())
    }
}
