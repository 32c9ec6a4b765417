#![no_main]
use libfuzzer_sys::fuzz_target;
use pumps_core::Command;

fuzz_target!(|data: &str| {
    if let Ok(cmd) = Command::parse(data) {
        assert!((1..=6).contains(&cmd.code()));
        // The code always comes from the first token.
        let first = data.split_whitespace().next().unwrap_or_default();
        assert_eq!(first.parse::<i64>().ok(), Some(i64::from(cmd.code())));
    }
});
