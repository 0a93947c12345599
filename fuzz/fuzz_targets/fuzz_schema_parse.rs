#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use sunspec_rs::model::parse_model_defs;
use sunspec_rs::Model;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(defs) = parse_model_defs(text) else {
        return;
    };

    // Any parsed definition must instantiate or fail cleanly at a few lengths
    for def in defs {
        let def = Arc::new(def);
        let fixed = def.fixed_len();
        let repeating = def.repeating_len();
        for len in [fixed, fixed.saturating_sub(1), fixed.saturating_add(repeating), 1] {
            let _ = Model::new(def.clone(), 40000, len, 1);
        }
    }
});
