#![no_main]

use huntrack::model::{run_map_equivalence, Op};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<Op>| { run_map_equivalence(ops) });
