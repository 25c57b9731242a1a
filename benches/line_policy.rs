// Benchmark for the per-line streaming policy and layer tracking
// Run with: cargo bench
use criterion::{Criterion, criterion_group, criterion_main};
use printhost::gcode::{self, LayerTracker};

fn synthetic_gcode() -> String {
    let mut out = String::new();
    for layer in 0..100 {
        out.push_str(&format!(";LAYER:{layer}\n"));
        out.push_str(&format!("G1 Z{:.1} F300\n", layer as f64 * 0.2));
        for i in 0..100 {
            out.push_str(&format!("G1 X{i} Y{i} E{i} ; perimeter\n"));
        }
        out.push_str("M117 printing\n");
    }
    out
}

fn bench_line_policy(c: &mut Criterion) {
    let gcode_text = synthetic_gcode();
    c.bench_function("policy over 10k lines", |b| {
        b.iter(|| {
            let mut sent = 0usize;
            for line in gcode_text.lines() {
                if let Some(cmd) = gcode::prepare(line) {
                    if !gcode::is_unsupported(cmd) && !gcode::is_heating_command(cmd) {
                        sent += 1;
                    }
                }
            }
            assert_eq!(sent, 10_100);
        });
    });
}

fn bench_layer_tracking(c: &mut Criterion) {
    let gcode_text = synthetic_gcode();
    c.bench_function("layer tracking over 10k lines", |b| {
        b.iter(|| {
            let mut tracker = LayerTracker::new();
            let mut fires = 0usize;
            for line in gcode_text.lines() {
                if tracker.observe(line) {
                    fires += 1;
                }
            }
            assert_eq!(fires, 100);
        });
    });
}

criterion_group!(benches, bench_line_policy, bench_layer_tracking);
criterion_main!(benches);
