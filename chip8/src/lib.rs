//! CHIP-8 virtual machine.
//!
//! The machine is driven from the outside: the host calls [`Chip8Vm::step`]
//! to execute instructions, [`Chip8Vm::tick_timers`] at 60Hz, and plugs in
//! its own display, keyboard and sound through the traits in [`devices`].
mod bytecode;
pub mod constants;
mod cpu;
pub mod devices;
mod error;
mod op;
mod vm;

pub use self::{
    cpu::Mode,
    devices::{Buzzer, InvalidKeyCode, KeyCode, KeyState, Keypad, Mute, Screen},
    error::{Chip8Error, Chip8Result},
    op::Op,
    vm::Hz,
};

pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        devices::{Buzzer, KeyCode, Keypad, Screen},
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
