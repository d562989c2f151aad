//! Virtual machine.
use std::{
    fmt::{self, Write},
    time::Duration,
};

use log::{debug, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    constants::*,
    cpu::{Chip8Cpu, Mode},
    devices::{Buzzer, KeyCode, KeyState, Keypad, Screen},
    error::{Chip8Error, Chip8Result},
    op::Op,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(conf.display_width, conf.display_height),
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Clear all machine state in preparation for a fresh startup.
    ///
    /// Memory is wiped, so a program must be loaded again afterwards.
    pub fn reset(&mut self) {
        debug!("reset");
        self.cpu.reset();
    }

    /// Reset the machine and load a ROM image at `MEM_START`.
    pub fn load_program(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        self.cpu.load_program(bytecode)?;
        debug!("loaded program of {} bytes", bytecode.len());
        Ok(())
    }
}

/// Result of a single step, hinting the driver at what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// The instruction at the program counter is `0000`.
    ///
    /// Zeroed memory is treated as the end of the program. The program
    /// counter is not advanced, so stepping again halts again.
    Halt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    Draw,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
pub struct Chip8Conf {
    /// Number of instructions the driver should execute per second.
    pub clock_frequency: Option<Hz>,
    /// Logical width of the display, in pixels.
    pub display_width: usize,
    /// Logical height of the display, in pixels.
    pub display_height: usize,
    /// Seed for the random number generator used by `RND`.
    ///
    /// When absent, the generator is seeded from the operating system.
    pub seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            clock_frequency: None,
            display_width: DISPLAY_WIDTH,
            display_height: DISPLAY_HEIGHT,
            seed: None,
        }
    }
}

impl Chip8Conf {
    /// Size the display after the given screen.
    pub fn with_screen(mut self, screen: &impl Screen) -> Self {
        self.display_width = screen.width();
        self.display_height = screen.height();
        self
    }

    /// Configured clock frequency, or the default of 500Hz.
    pub fn clock_frequency(&self) -> Hz {
        self.clock_frequency
            .unwrap_or(Hz(DEFAULT_CLOCK_FREQUENCY))
    }
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// State access
impl Chip8Vm {
    #[inline]
    pub fn pc(&self) -> Address {
        self.cpu.pc
    }

    #[inline]
    pub fn sp(&self) -> u8 {
        self.cpu.sp
    }

    #[inline]
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    /// Index register `I`.
    #[inline]
    pub fn address(&self) -> Address {
        self.cpu.address
    }

    #[inline]
    pub fn stack(&self) -> &[Address; STACK_SIZE] {
        &self.cpu.stack
    }

    #[inline]
    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }

    #[inline]
    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    #[inline]
    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    /// Whether the tone should currently be playing.
    #[inline]
    pub fn buzzer_state(&self) -> bool {
        self.cpu.buzzer_state
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.cpu.mode
    }

    /// Whether execution is suspended by `Fx0A` until a key is pressed.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        matches!(self.cpu.mode, Mode::KeyWait { .. })
    }

    /// Framebuffer, one cell per pixel, indexed by `x + y * width`.
    pub fn display_buffer(&self) -> &[u8] {
        &self.cpu.display
    }

    /// Logical `[width, height]` of the framebuffer.
    pub fn display_size(&self) -> [usize; 2] {
        [self.cpu.display_width, self.cpu.display_height]
    }

    /// Read a single pixel. Coordinates wrap around the display edges.
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.cpu.pixel(x, y)
    }

    /// Whether the framebuffer changed since it was last presented.
    #[inline]
    pub fn must_redraw(&self) -> bool {
        self.cpu.must_redraw
    }

    /// Hand the framebuffer to the screen if it changed, then clear the redraw flag.
    ///
    /// A screen of a different size than the display is not drawn to, and the
    /// redraw flag stays set. Returns whether anything was drawn.
    pub fn present(&mut self, screen: &mut impl Screen) -> bool {
        if !self.cpu.must_redraw {
            return false;
        }

        let screen_size = [screen.width(), screen.height()];
        if screen_size != self.display_size() {
            warn!(
                "screen size {screen_size:?} does not match the display {:?}",
                self.display_size()
            );
            return false;
        }

        screen.draw(&self.cpu.display);
        self.cpu.must_redraw = false;
        true
    }

    /// Keyboard state as seen by the machine.
    pub fn keypad(&self) -> &KeyState {
        &self.cpu.keys
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    ///
    /// If the VM is waiting for keyboard input, a press is stored in the
    /// waiting register and execution resumes.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.keys.set(key, pressed);

        if pressed {
            if let Mode::KeyWait { vx } = self.cpu.mode {
                debug!("key {key} resumes execution, stored in V{vx:X}");
                self.cpu.registers[vx as usize] = key.as_u8();
                self.cpu.mode = Mode::Running;
            }
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.keys.clear()
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called by the host at 60Hz. The buzzer is started on the first
    /// tick that finds the sound timer non-zero, and stopped the tick it
    /// reaches zero. A sound timer of 1 sounds for a single tick.
    pub fn tick_timers<B>(&mut self, buzzer: &mut B)
    where
        B: Buzzer + ?Sized,
    {
        if self.cpu.sound_timer > 0 && !self.cpu.buzzer_state {
            self.cpu.buzzer_state = true;
            buzzer.start();
        }

        self.cpu.tick_delay();
        self.cpu.tick_sound();

        if self.cpu.sound_timer == 0 && self.cpu.buzzer_state {
            self.cpu.buzzer_state = false;
            buzzer.stop();
        }
    }

    /// Execute up to `step_count` instructions.
    ///
    /// Returns early when the machine halts or starts waiting for a key.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        for _ in 0..step_count {
            match self.step()? {
                flow @ (Flow::Halt | Flow::KeyWait) => return Ok(flow),
                _ => {}
            }
        }

        Ok(Flow::Ok)
    }

    /// Fetch, decode and execute a single instruction.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if self.is_waiting() {
            return Ok(Flow::KeyWait);
        }

        let address = self.cpu.pc;
        let opcode = self.cpu.opcode();

        if opcode == 0x0000 {
            return Ok(Flow::Halt);
        }

        let op = Op::decode(opcode);
        trace!("{address:03X}: {opcode:04X} {op}");

        // Advance before executing, so jumps are not overwritten.
        self.cpu.pc = wrap_address(self.cpu.pc as usize + 2);

        self.exec(op, address)
    }

    fn exec(&mut self, op: Op, address: Address) -> Chip8Result<Flow> {
        let mut control_flow = Flow::Ok;

        match op {
            // 00E0 (CLS)
            //
            // Clear display
            Op::ClearScreen => {
                self.cpu.clear_display();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Subtract 1 from the stack pointer.
            // Set the program counter to the value at the top of the stack.
            Op::Return => {
                if self.cpu.sp == 0 {
                    self.cpu.pc = address;
                    return Err(Chip8Error::StackUnderflow { address });
                }

                self.cpu.sp -= 1;
                self.cpu.pc = self.cpu.stack[self.cpu.sp as usize];
                control_flow = Flow::Jump;
            }
            // 0nnn (SYS addr)
            //
            // Machine code routines only ran on the COSMAC VIP.
            Op::System { .. } => { /* No Op */ }
            // 1nnn (JP addr)
            //
            // Jump to address.
            Op::Jump { address } => {
                self.cpu.pc = address;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at nnn.
            Op::Call { address: target } => {
                if self.cpu.sp as usize >= STACK_SIZE {
                    self.cpu.pc = address;
                    return Err(Chip8Error::StackOverflow { address });
                }

                self.cpu.stack[self.cpu.sp as usize] = self.cpu.pc;
                self.cpu.sp += 1;
                self.cpu.pc = target;
                control_flow = Flow::Jump;
            }
            // 3xkk (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value KK.
            Op::Skip_Eq_Byte { vx, kk } => {
                if self.cpu.registers[vx as usize] == kk {
                    self.skip();
                }
            }
            // 4xkk (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value KK.
            Op::Skip_NotEq_Byte { vx, kk } => {
                if self.cpu.registers[vx as usize] != kk {
                    self.skip();
                }
            }
            // 5xy0 (SE Vx, Vy)
            Op::Skip_Eq { vx, vy } => {
                if self.cpu.registers[vx as usize] == self.cpu.registers[vy as usize] {
                    self.skip();
                }
            }
            // 6xkk (LD Vx, byte)
            Op::Load_Byte { vx, kk } => {
                self.cpu.registers[vx as usize] = kk;
            }
            // 7xkk (ADD Vx, byte)
            //
            // Add value KK to register VX. Carry flag is not set.
            Op::Add_Byte { vx, kk } => {
                let x = self.cpu.registers[vx as usize];
                self.cpu.registers[vx as usize] = x.wrapping_add(kk);
            }
            // Arithmetic instructions
            Op::Load_Vx_Vy { .. }
            | Op::Or_Vx_Vy { .. }
            | Op::And_Vx_Vy { .. }
            | Op::Xor_Vx_Vy { .. }
            | Op::Add_Vx_Vy { .. }
            | Op::Sub_Vx_Vy { .. }
            | Op::ShiftRight { .. }
            | Op::SubReverse_Vx_Vy { .. }
            | Op::ShiftLeft { .. } => self.exec_math(op),
            // 9xy0 (SNE Vx, Vy)
            Op::Skip_NotEq { vx, vy } => {
                if self.cpu.registers[vx as usize] != self.cpu.registers[vy as usize] {
                    self.skip();
                }
            }
            // Annn (LD I, addr)
            Op::Load_Address { address } => {
                self.cpu.address = address;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to location nnn + V0.
            Op::Jump_V0 { address } => {
                let target = address as usize + self.cpu.registers[0] as usize;
                self.cpu.pc = wrap_address(target);
                control_flow = Flow::Jump;
            }
            // Cxkk (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and KK.
            Op::Random { vx, kk } => {
                self.cpu.registers[vx as usize] = kk & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            Op::Draw { vx, vy, n } => {
                self.draw_sprite(vx, vy, n);
                control_flow = Flow::Draw;
            }
            // Keyboard, timers and memory
            Op::Skip_Pressed { .. }
            | Op::Skip_NotPressed { .. }
            | Op::Load_Vx_Delay { .. }
            | Op::Load_Vx_Key { .. }
            | Op::Load_Delay_Vx { .. }
            | Op::Load_Sound_Vx { .. }
            | Op::Add_Address_Vx { .. }
            | Op::Load_Font_Vx { .. }
            | Op::Load_Bcd_Vx { .. }
            | Op::Store_Registers { .. }
            | Op::Load_Registers { .. } => control_flow = self.exec_misc(op),
            // Unsupported operation.
            Op::Unknown { opcode } => {
                warn!("unknown opcode {opcode:04X} at 0x{address:03X}");
                return Err(Chip8Error::UnknownOpcode { opcode, address });
            }
        }

        Ok(control_flow)
    }

    /// Skip over the next instruction.
    #[inline(always)]
    fn skip(&mut self) {
        self.cpu.pc = wrap_address(self.cpu.pc as usize + 2);
    }

    /// Execute an arithmetic instruction.
    ///
    /// Operands are read before anything is written. The flag register is
    /// written first, so when Vx is VF the result overwrites the flag.
    fn exec_math(&mut self, op: Op) {
        let regs = &mut self.cpu.registers;

        match op {
            // 8xy0 (LD Vx, Vy)
            Op::Load_Vx_Vy { vx, vy } => {
                regs[vx as usize] = regs[vy as usize];
            }
            // 8xy1 (OR Vx, Vy)
            Op::Or_Vx_Vy { vx, vy } => {
                regs[vx as usize] |= regs[vy as usize];
            }
            // 8xy2 (AND Vx, Vy)
            Op::And_Vx_Vy { vx, vy } => {
                regs[vx as usize] &= regs[vy as usize];
            }
            // 8xy3 (XOR Vx, Vy)
            Op::Xor_Vx_Vy { vx, vy } => {
                regs[vx as usize] ^= regs[vy as usize];
            }
            // 8xy4 (ADD Vx, Vy)
            //
            // Overflow is wrapped. If overflow, set VF to 1, else 0.
            Op::Add_Vx_Vy { vx, vy } => {
                let (x, y) = (regs[vx as usize], regs[vy as usize]);
                let (result, carry) = x.overflowing_add(y);
                regs[FLAG_REGISTER] = carry as u8;
                regs[vx as usize] = result;
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (x, y) = (regs[vx as usize], regs[vy as usize]);
                regs[FLAG_REGISTER] = (x >= y) as u8;
                regs[vx as usize] = x.wrapping_sub(y);
            }
            // 8xy6 (SHR Vx)
            //
            // VF receives the bit shifted out.
            Op::ShiftRight { vx } => {
                let x = regs[vx as usize];
                regs[FLAG_REGISTER] = x & 1;
                regs[vx as usize] = x >> 1;
            }
            // 8xy7 (SUBN Vx, Vy)
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (x, y) = (regs[vx as usize], regs[vy as usize]);
                regs[FLAG_REGISTER] = (y >= x) as u8;
                regs[vx as usize] = y.wrapping_sub(x);
            }
            // 8xyE (SHL Vx)
            Op::ShiftLeft { vx } => {
                let x = regs[vx as usize];
                regs[FLAG_REGISTER] = x >> 7;
                regs[vx as usize] = x << 1;
            }
            _ => unreachable!("not an arithmetic instruction: {op:?}"),
        }
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// Pixels drawn outside of the display area wrap around to the other side.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn draw_sprite(&mut self, vx: u8, vy: u8, n: u8) {
        let (width, height) = (self.cpu.display_width, self.cpu.display_height);
        let x = self.cpu.registers[vx as usize] as usize;
        let y = self.cpu.registers[vy as usize] as usize;
        let base = self.cpu.address as usize;
        let mut is_erased = false;

        for r in 0..n as usize {
            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = self.cpu.read(base + r);
            let py = (y + r) % height;

            for c in 0..SPRITE_WIDTH {
                if row & (0x80 >> c) == 0 {
                    continue;
                }

                let px = (x + c) % width;
                let cell = &mut self.cpu.display[px + py * width];

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= *cell == 1;
                *cell ^= 1;
            }
        }

        self.cpu.registers[FLAG_REGISTER] = is_erased as u8;
        self.cpu.must_redraw = true;
    }

    /// Execute a keyboard, timer or memory instruction.
    fn exec_misc(&mut self, op: Op) -> Flow {
        let mut control_flow = Flow::Ok;

        match op {
            // Ex9E (SKP Vx)
            Op::Skip_Pressed { vx } => {
                let key = KeyCode::from_nibble(self.cpu.registers[vx as usize]);
                if self.cpu.keys.is_pressed(key) {
                    self.skip();
                }
            }
            // ExA1 (SKNP Vx)
            Op::Skip_NotPressed { vx } => {
                let key = KeyCode::from_nibble(self.cpu.registers[vx as usize]);
                if !self.cpu.keys.is_pressed(key) {
                    self.skip();
                }
            }
            // Fx07 (LD Vx, DT)
            Op::Load_Vx_Delay { vx } => {
                self.cpu.registers[vx as usize] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed. Keys already held
            // down do not count.
            Op::Load_Vx_Key { vx } => {
                debug!("waiting for key press into V{vx:X}");
                self.cpu.mode = Mode::KeyWait { vx };
                control_flow = Flow::KeyWait;
            }
            // Fx15 (LD DT, Vx)
            Op::Load_Delay_Vx { vx } => {
                self.cpu.delay_timer = self.cpu.registers[vx as usize];
            }
            // Fx18 (LD ST, Vx)
            //
            // The buzzer follows on the next timer tick.
            Op::Load_Sound_Vx { vx } => {
                self.cpu.sound_timer = self.cpu.registers[vx as usize];
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            Op::Add_Address_Vx { vx } => {
                let x = self.cpu.registers[vx as usize] as usize;
                self.cpu.address = wrap_address(self.cpu.address as usize + x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::Load_Font_Vx { vx } => {
                let x = self.cpu.registers[vx as usize] as u16;
                self.cpu.address = FONTSET_START + x * FONTSET_HEIGHT as u16;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Op::Load_Bcd_Vx { vx } => {
                let addr = self.cpu.address as usize;
                let x = self.cpu.registers[vx as usize];
                self.cpu.write(addr,     x / 100 % 10);
                self.cpu.write(addr + 1, x / 10  % 10);
                self.cpu.write(addr + 2, x       % 10);
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            Op::Store_Registers { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    let x = self.cpu.registers[v];
                    self.cpu.write(addr + v, x);
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Op::Load_Registers { vx } => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx as usize {
                    self.cpu.registers[v] = self.cpu.read(addr + v);
                }
            }
            _ => unreachable!("not a misc instruction: {op:?}"),
        }

        control_flow
    }
}

/// Wrap a computed address into the 12-bit address space.
#[inline(always)]
fn wrap_address(address: usize) -> Address {
    (address & ADDRESS_MASK) as Address
}

/// Troubleshooting
impl Chip8Vm {
    /// Returns the contents of the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for i in (MEM_START..(MEM_START + count).min(MEM_SIZE)).step_by(2) {
            let [a, b] = [self.cpu.read(i), self.cpu.read(i + 1)];
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, a, b)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        let [width, height] = self.display_size();

        for y in 0..height {
            for x in 0..width {
                if self.cpu.display[x + y * width] != 0 {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.keys.any() {
            write!(buf, "keys:")?;
            for key in self.cpu.keys.iter() {
                write!(buf, " {key}")?;
            }
        }

        Ok(buf)
    }
}
