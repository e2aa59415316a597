#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use widx::utils::{BitReader, BitWriter};

fuzz_target!(|ops: Vec<(u64, u8)>| {
    // Any accepted write sequence must read back bit-exactly.
    let mut out = Cursor::new(Vec::new());
    let mut writer = BitWriter::new(&mut out);
    let mut accepted = Vec::new();
    let mut offset = 0u64;
    for (value, width) in ops {
        let width = u32::from(width % 56) + 1;
        let value = value & ((1u64 << width) - 1);
        if writer.write(value, width).is_ok() {
            accepted.push((offset, value, width));
            offset += u64::from(width);
        }
    }
    writer.close().unwrap();
    drop(writer);

    let mut reader = BitReader::new(Cursor::new(out.into_inner())).unwrap();
    for (pos, value, width) in accepted {
        assert_eq!(reader.read_at(pos, width).unwrap(), value);
    }
});
