#![no_main]

use libfuzzer_sys::fuzz_target;
use memc_load::codec::{encode_record, UserApps};
use memc_load::record::parse_line;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    // Rejections are fine; panics are not. Whatever encodes must decode back.
    if let Ok(record) = parse_line(&input) {
        if let Ok(item) = encode_record(&record) {
            let decoded = UserApps::decode(&item.payload).expect("encoded payload must decode");
            assert_eq!(decoded.apps, record.apps);
        }
    }
});
