#![no_main]

use libfuzzer_sys::fuzz_target;
use risa_core::{decode, disassemble, Engine, HartConfig, NoopHandlers, RunState};

fuzz_target!(|data: &[u8]| {
    for chunk in data.chunks_exact(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if let Ok(instruction) = decode(word) {
            assert_eq!(decode(instruction.encode()), Ok(instruction));
        }
        let _ = disassemble(word);
    }

    let config = HartConfig {
        mem_size: 256,
        timeout: Some(1_024),
        interrupt_period: 7,
        ..HartConfig::default()
    };
    let Ok(mut engine) = Engine::new(config, NoopHandlers) else {
        return;
    };
    if engine.load_image(data).is_err() {
        return;
    }
    let outcome = engine.run();
    assert!(outcome.state.is_terminal());
    assert_ne!(outcome.state, RunState::Running);
    assert_eq!(engine.hart().reg(0), 0);
});
