use std::time::Instant;

use chip8::{constants::DELAY_FREQUENCY, prelude::*, Hz};
use crossterm::event::{self, Event};
use log::info;

use crate::{
    clock::Clock,
    config::AppConfig,
    error::AppError,
    inputmap::{actions::*, InputEvent, InputMap},
    terminal::{translate_key, TerminalBell, TerminalGuard, TerminalScreen},
};

/// Chip8 Application
///
/// Drives the virtual machine from a 60Hz frame clock. Each frame runs a
/// batch of instructions, counts down the timers and presents the display.
pub struct Chip8App {
    screen: TerminalScreen,
    bell: TerminalBell,
    vm: Chip8Vm,
    input_map: InputMap,
    rom: Vec<u8>,
    steps_per_frame: usize,
    halted: bool,
}

impl Chip8App {
    pub fn new(config: &AppConfig, input_map: InputMap) -> Self {
        let screen = TerminalScreen::new();
        let conf = config.chip8_conf(&screen);
        let steps_per_frame = steps_per_frame(conf.clock_frequency());
        info!(
            "clock frequency {}Hz, {steps_per_frame} steps per frame",
            conf.clock_frequency().0
        );

        Self {
            screen,
            bell: TerminalBell::default(),
            vm: Chip8Vm::new(conf),
            input_map,
            rom: vec![],
            steps_per_frame,
            halted: false,
        }
    }

    /// Load ROM file into VM
    pub fn load_rom(&mut self, filepath: &str) -> Result<(), AppError> {
        info!("load rom: {filepath}");

        let bytecode = std::fs::read(filepath)?;
        self.vm.load_program(&bytecode)?;
        self.rom = bytecode;
        self.halted = false;

        Ok(())
    }

    /// Reload the current ROM, starting the program over.
    fn restart(&mut self) -> Result<(), AppError> {
        info!("reset");
        self.vm.load_program(&self.rom)?;
        self.input_map.clear_state();
        self.halted = false;
        Ok(())
    }
}

/// Event Loop.
impl Chip8App {
    pub fn run(&mut self) -> Result<(), AppError> {
        let _guard = TerminalGuard::enter()?;
        let mut clock = Clock::new(Hz(DELAY_FREQUENCY));

        loop {
            // Wait on input until the next frame is due.
            while event::poll(clock.remaining())? {
                if let Event::Key(key_event) = event::read()? {
                    if let Some((key, pressed)) = translate_key(&key_event) {
                        self.input_map.push_key(key, pressed, Instant::now());
                    }
                }
            }

            if !clock.tick() {
                continue;
            }

            self.input_map.expire(Instant::now());
            let events: Vec<InputEvent> = self.input_map.drain_events().collect();
            let key_changed = events
                .iter()
                .any(|event| matches!(event, InputEvent::Chip8 { .. }));
            for event in events {
                match event {
                    InputEvent::Chip8 { key, pressed } => self.vm.set_key(key, pressed),
                    InputEvent::Action(action) if action == EXIT => {
                        info!("exit");
                        return Ok(());
                    }
                    InputEvent::Action(action) if action == RESET => self.restart()?,
                    InputEvent::Action(action) => log::debug!("unhandled action {action}"),
                }
            }

            if key_changed && log::log_enabled!(log::Level::Debug) {
                log::debug!("{}", self.vm.dump_keys()?);
            }

            self.update()?;

            self.vm.tick_timers(&mut self.bell);
            self.vm.present(&mut self.screen);
            let status = self.status();
            self.screen.render(&status)?;
        }
    }

    /// Run one frame worth of instructions.
    fn update(&mut self) -> Result<(), AppError> {
        if self.halted || self.vm.is_waiting() {
            return Ok(());
        }

        match self.vm.run_steps(self.steps_per_frame) {
            Ok(Flow::Halt) => {
                info!("program halted at {:03X}", self.vm.pc());
                self.halted = true;
            }
            Ok(_) => {}
            Err(err) if err.is_recoverable() => log::warn!("{err}"),
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }

    fn status(&self) -> String {
        if self.halted {
            "halted, backspace to restart, esc to exit".to_string()
        } else if self.vm.is_waiting() {
            "waiting for key".to_string()
        } else if self.bell.is_ringing() {
            "beep".to_string()
        } else {
            String::new()
        }
    }
}

/// Number of instructions to execute per 60Hz frame, at least one.
pub fn steps_per_frame(freq: Hz) -> usize {
    ((freq.0 / DELAY_FREQUENCY) as usize).max(1)
}
