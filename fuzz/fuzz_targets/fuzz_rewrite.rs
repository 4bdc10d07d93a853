#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((output, summary)) = zipfix::rewrite_with_summary(data) else {
        return;
    };

    assert_eq!(summary.output_len, output.len());
    let _ = zipfix::rewrite(&output);
});
