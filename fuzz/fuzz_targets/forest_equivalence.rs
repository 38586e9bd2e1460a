#![no_main]

use huntrack::model::{run_forest_equivalence, ForestOp};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|ops: Vec<ForestOp>| {
    // Long inputs mostly re-check the same state.
    if ops.len() <= 2000 {
        run_forest_equivalence(ops);
    }
});
