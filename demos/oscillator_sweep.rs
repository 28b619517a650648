//! Per-sample evaluation shape: compile once, then update variables and
//! evaluate inside a tight loop. Transient math faults are absorbed by
//! substituting silence for the offending sample.

use formula_vm::Formula;
use log::warn;

const SAMPLE_RATE: f64 = 44_100.0;

fn main() {
    pretty_env_logger::init();

    let mut formula = Formula::new();
    formula
        .compile("sin(2*pi*f*t) * (1 + 0.5 * sin(2*pi*0.5*t)) / d")
        .unwrap();
    formula.set_variable("f", 440.0);

    let mut peak = 0.0f64;
    for n in 0..4410 {
        let t = n as f64 / SAMPLE_RATE;
        // A divisor that passes through zero halfway to provoke a fault.
        formula.set_variables([("t", t), ("d", t - 0.05)]);
        let sample = match formula.evaluate() {
            Ok(v) => v,
            Err(e) if e.is_transient() => {
                warn!("sample {n}: {e}, substituting 0");
                0.0
            }
            Err(e) => panic!("unrecoverable: {e}"),
        };
        peak = peak.max(sample.abs());
    }

    println!("peak over 4410 samples: {peak}");
}
