use chip8::{constants::*, prelude::*, Mode, Mute};

const MAZE: &[u8] = include_bytes!("../programs/maze");

fn new_vm() -> Chip8Vm {
    Chip8Vm::new(Chip8Conf {
        seed: Some(0x5EED),
        ..Default::default()
    })
}

#[test]
fn test_maze_fills_screen() {
    let mut vm = new_vm();
    vm.load_program(MAZE).unwrap();

    vm.run_steps(2000).unwrap();

    // The program ends in an infinite `JP 218` once every row is drawn.
    assert_eq!(vm.pc(), 0x218);
    assert_eq!(vm.registers()[1], 0x20);

    // 16 x 8 cells of 4 pixels each, none overlapping.
    let lit = vm.display_buffer().iter().filter(|px| **px == 1).count();
    assert_eq!(lit, 16 * 8 * 4);
    assert_eq!(vm.registers()[0xF], 0);
    assert!(vm.must_redraw());

    println!("{}", vm.dump_display().unwrap());
}

#[test]
fn test_reload_does_not_leak_state() {
    let mut vm = new_vm();
    vm.load_program(MAZE).unwrap();
    vm.run_steps(100).unwrap();

    vm.load_program(&[0x60, 0x0A]).unwrap();
    assert_eq!(vm.pc(), MEM_START as u16);
    assert_eq!(vm.registers(), &[0; REGISTER_COUNT]);
    assert!(vm.display_buffer().iter().all(|px| *px == 0));
    // Old program bytes past the new program are erased.
    assert_eq!(vm.ram()[MEM_START + 2], 0);
    assert_eq!(&vm.ram()[..FONTSET_DATA_LENGTH], &FONTSET[..]);

    assert_eq!(vm.step(), Ok(Flow::Ok));
    assert_eq!(vm.registers()[0], 10);
    assert_eq!(vm.step(), Ok(Flow::Halt));
    assert_eq!(vm.pc(), 0x202);
}

#[test]
fn test_program_too_large() {
    let mut vm = new_vm();
    let rom = vec![0x12; MEM_SIZE - MEM_START + 1];
    match vm.load_program(&rom) {
        Err(Chip8Error::ProgramTooLarge { size }) => assert_eq!(size, rom.len()),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
#[rustfmt::skip]
fn test_key_wait_round_trip() {
    let mut vm = new_vm();
    vm.load_program(&[
        0xF3, 0x0A, // LD V3, K
        0xE3, 0x9E, // SKP V3
        0x00, 0x00, // halt when the key is up
        0x64, 0x01, // LD V4, 1
    ]).unwrap();

    assert_eq!(vm.run_steps(10), Ok(Flow::KeyWait));
    assert!(vm.is_waiting());
    assert_eq!(vm.run_steps(10), Ok(Flow::KeyWait));

    vm.set_key(KeyCode::KeyE, true);
    assert_eq!(vm.mode(), Mode::Running);
    assert_eq!(vm.registers()[3], 0xE);

    // Key is still held, so SKP skips over the halt.
    assert_eq!(vm.run_steps(2), Ok(Flow::Ok));
    assert_eq!(vm.registers()[4], 1);
}

#[test]
fn test_sound_timer_drives_buzzer() {
    struct Log(Vec<&'static str>);

    impl Buzzer for Log {
        fn start(&mut self) {
            self.0.push("start");
        }
        fn stop(&mut self) {
            self.0.push("stop");
        }
    }

    let mut vm = new_vm();
    // LD V0, 3 ; LD ST, V0
    vm.load_program(&[0x60, 0x03, 0xF0, 0x18]).unwrap();
    vm.run_steps(2).unwrap();
    assert_eq!(vm.sound_timer(), 3);

    let mut log = Log(vec![]);
    vm.tick_timers(&mut log);
    assert_eq!(log.0, vec!["start"]);
    vm.tick_timers(&mut log);
    vm.tick_timers(&mut log);
    assert_eq!(log.0, vec!["start", "stop"]);
    vm.tick_timers(&mut log);
    vm.tick_timers(&mut log);
    assert_eq!(log.0, vec!["start", "stop"]);
    assert_eq!(vm.sound_timer(), 0);

    vm.tick_timers(&mut Mute);
}

#[test]
fn test_unknown_opcode_is_recoverable() {
    let mut vm = new_vm();
    vm.load_program(&[0xFF, 0xFF, 0x61, 0x07]).unwrap();

    let err = vm.step().unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(err.to_string(), "unknown opcode FFFF at 0x200");

    vm.step().unwrap();
    assert_eq!(vm.registers()[1], 7);
}

#[test]
fn test_stack_fault_is_fatal() {
    let mut vm = new_vm();
    vm.load_program(&[0x00, 0xEE]).unwrap();
    let err = vm.step().unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(vm.step().unwrap_err(), err);
}
