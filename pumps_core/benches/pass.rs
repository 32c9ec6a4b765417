use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use pumps_config::MemoryRatioStore;
use pumps_core::{CoreCfg, DoserBuilder, DoserCore};
use pumps_hardware::{SimulatedPin, SimulatedStepper};
use pumps_traits::ManualClock;

type SimDoser = DoserCore<SimulatedStepper, SimulatedPin, MemoryRatioStore>;

fn loaded_doser() -> (SimDoser, ManualClock) {
    let clock = ManualClock::new();
    let mut d = DoserBuilder::new()
        .with_steppers(std::array::from_fn(|_| SimulatedStepper::new()))
        .with_enable_pin(SimulatedPin::new("enable"))
        .with_duty_pins([SimulatedPin::new("d1"), SimulatedPin::new("d2")])
        .with_stirrer_pin(SimulatedPin::new("stirrer"))
        .with_ratio_store(MemoryRatioStore::new(200, 20))
        .with_config(CoreCfg {
            stirrer_enabled: false,
            tick_ms: 1,
            ..CoreCfg::default()
        })
        .with_clock(clock.clone())
        .build()
        .unwrap_or_else(|e| panic!("build: {e:?}"));
    for pump in 1..=4 {
        let _ = d.dose_stepper(pump, 1_000.0);
    }
    let _ = d.dose_motor(1, 1_000.0);
    let _ = d.dose_motor(2, 1_000.0);
    (d, clock)
}

fn bench_pass(c: &mut Criterion) {
    c.bench_function("pass_all_pumps_busy", |b| {
        b.iter_batched(
            loaded_doser,
            |(mut d, clock)| {
                for _ in 0..1_000 {
                    clock.advance_ms(1);
                    black_box(d.pass());
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("execute_dose_line", |b| {
        b.iter_batched(
            loaded_doser,
            |(mut d, _clock)| black_box(d.execute(black_box("1 3 2.5"))),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_pass);
criterion_main!(benches);
