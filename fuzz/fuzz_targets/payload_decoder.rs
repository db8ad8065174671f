#![no_main]

use libfuzzer_sys::fuzz_target;
use memc_load::codec::UserApps;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder
    let _ = UserApps::decode(data);
});
