use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chip8::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    {
        let mut vm = Chip8Vm::new(Chip8Conf {
            seed: Some(1),
            ..Default::default()
        });

        c.bench_function("maze bytecode", |b| {
            b.iter(|| {
                vm.load_program(include_bytes!("../programs/maze")).unwrap();
                let step_count = black_box(1000_usize);
                black_box(vm.run_steps(step_count))
            })
        });
    }

    {
        let mut vm = Chip8Vm::new(Chip8Conf::default());
        let mut buzzer = chip8::Mute;

        c.bench_function("tick timers", |b| {
            b.iter(|| {
                for _ in 0..black_box(60) {
                    vm.tick_timers(&mut buzzer);
                }
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
