//! CPU and memory state.
use crate::{
    constants::*,
    devices::KeyState,
    error::{Chip8Error, Chip8Result},
};

/// Execution state of the machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Each step executes one instruction.
    #[default]
    Running,
    /// Suspended by `Fx0A` (`LD Vx, K`) until a key press is delivered.
    ///
    /// Holds the index of the register that will receive the key.
    KeyWait { vx: u8 },
}

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: Address,
    /// Stack pointer, indicating the number of frames on the stack.
    pub(crate) sp: u8,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Switch tracking whether the buzzer should be on or off.
    pub(crate) buzzer_state: bool,
    pub(crate) mode: Mode,
    /// Mirror of the host keyboard.
    pub(crate) keys: KeyState,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn to. One cell per pixel, 0 or 1.
    pub(crate) display: Box<[u8]>,
    pub(crate) display_width: usize,
    pub(crate) display_height: usize,
    /// Set when the display buffer changed since it was last presented.
    pub(crate) must_redraw: bool,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl Chip8Cpu {
    /// Create a machine with a display of the given logical size,
    /// already reset and ready to load a program.
    pub fn new(display_width: usize, display_height: usize) -> Self {
        // Degenerate sizes would make the drawing wrap arithmetic divide by zero.
        let display_width = display_width.max(1);
        let display_height = display_height.max(1);

        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            buzzer_state: false,
            mode: Mode::Running,
            keys: KeyState::new(),

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: vec![0; display_width * display_height].into_boxed_slice(),
            display_width,
            display_height,
            must_redraw: false,
        };
        cpu.reset();
        cpu
    }

    /// Put every register, timer and buffer back to its power-on value,
    /// and install the built-in font.
    pub fn reset(&mut self) {
        self.clear_memory();
        self.load_font();

        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.buzzer_state = false;
        self.mode = Mode::Running;
        self.keys.clear();
        self.must_redraw = false;
    }

    /// Reset the machine, then copy the program into memory at `MEM_START`.
    ///
    /// A program that does not fit is rejected and the machine is left untouched.
    pub fn load_program(&mut self, program: &[u8]) -> Chip8Result<()> {
        if !check_program_size(program) {
            return Err(Chip8Error::ProgramTooLarge {
                size: program.len(),
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.reset();
        self.ram[MEM_START..MEM_START + program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(0);
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    pub fn clear_display(&mut self) {
        self.display.fill(0);
        self.must_redraw = true;
    }

    /// Read a byte, wrapping the address into the 12-bit space.
    #[inline(always)]
    pub fn read(&self, address: usize) -> u8 {
        self.ram[address & ADDRESS_MASK]
    }

    /// Write a byte, wrapping the address into the 12-bit space.
    #[inline(always)]
    pub fn write(&mut self, address: usize, value: u8) {
        self.ram[address & ADDRESS_MASK] = value;
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> [u8; 2] {
        let pc = self.pc as usize;
        [self.read(pc), self.read(pc + 1)]
    }

    /// Instruction at the current program counter, combined big-endian.
    #[inline(always)]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.instr())
    }

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    /// Count down the sound timer.
    #[inline]
    pub fn tick_sound(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Read the pixel at the given coordinate.
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.display[(x % self.display_width) + (y % self.display_height) * self.display_width]
    }
}

/// Checks whether the program fits in memory after the reserved interpreter area.
#[inline]
pub(crate) fn check_program_size(program: &[u8]) -> bool {
    program.len() <= MAX_PROGRAM_SIZE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reset_state() {
        let mut cpu = Chip8Cpu::default();
        cpu.registers[3] = 7;
        cpu.pc = 0x300;
        cpu.sp = 2;
        cpu.stack[1] = 0x204;
        cpu.address = 0x123;
        cpu.delay_timer = 9;
        cpu.sound_timer = 4;
        cpu.display[10] = 1;
        cpu.ram[0x400] = 0xAB;
        cpu.mode = Mode::KeyWait { vx: 1 };

        cpu.reset();

        assert_eq!(cpu.pc, 0x200);
        assert_eq!(cpu.sp, 0);
        assert_eq!(cpu.stack, [0; STACK_SIZE]);
        assert_eq!(cpu.registers, [0; REGISTER_COUNT]);
        assert_eq!(cpu.address, 0);
        assert_eq!(cpu.delay_timer, 0);
        assert_eq!(cpu.sound_timer, 0);
        assert_eq!(cpu.mode, Mode::Running);
        assert!(cpu.display.iter().all(|px| *px == 0));
        assert_eq!(cpu.ram[0x400], 0);
        assert_eq!(&cpu.ram[..FONTSET_DATA_LENGTH], &FONTSET[..]);
    }

    #[test]
    fn test_load_program() {
        let mut cpu = Chip8Cpu::default();
        cpu.load_program(&[0x60, 0x0A, 0x12, 0x00]).unwrap();
        assert_eq!(&cpu.ram[MEM_START..MEM_START + 4], &[0x60, 0x0A, 0x12, 0x00]);
        assert_eq!(cpu.opcode(), 0x600A);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut cpu = Chip8Cpu::default();
        cpu.registers[0] = 42;

        // Largest program fits exactly.
        let program = vec![0xAA; MAX_PROGRAM_SIZE];
        cpu.load_program(&program).unwrap();
        assert_eq!(cpu.ram[MEM_SIZE - 1], 0xAA);

        cpu.registers[0] = 42;
        let program = vec![0xBB; MAX_PROGRAM_SIZE + 1];
        assert_eq!(
            cpu.load_program(&program),
            Err(Chip8Error::ProgramTooLarge {
                size: MAX_PROGRAM_SIZE + 1
            })
        );
        // Rejected load must not reset the machine.
        assert_eq!(cpu.registers[0], 42);
        assert_eq!(cpu.ram[MEM_SIZE - 1], 0xAA);
    }

    #[test]
    fn test_address_wrap() {
        let mut cpu = Chip8Cpu::default();
        cpu.write(MEM_SIZE + 0x10, 0x5A);
        assert_eq!(cpu.ram[0x10], 0x5A);
        assert_eq!(cpu.read(0x10), cpu.read(MEM_SIZE + 0x10));

        cpu.pc = 0xFFF;
        cpu.ram[0xFFF] = 0x12;
        cpu.ram[0x000] = 0x34;
        assert_eq!(cpu.opcode(), 0x1234);
    }

    #[test]
    fn test_timer_floor() {
        let mut cpu = Chip8Cpu::default();
        cpu.delay_timer = 1;
        cpu.tick_delay();
        cpu.tick_delay();
        assert_eq!(cpu.delay_timer, 0);
        cpu.tick_sound();
        assert_eq!(cpu.sound_timer, 0);
    }

    #[test]
    fn test_custom_display_size() {
        let cpu = Chip8Cpu::new(128, 64);
        assert_eq!(cpu.display.len(), 128 * 64);
    }
}
