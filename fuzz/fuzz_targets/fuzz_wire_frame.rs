// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use mwc_validation_node::networking::wire::{decode_frame_header, decode_message, FRAME_HEADER_LEN};

const MAGIC: [u8; 2] = [0x1a, 0x36];

fuzz_target!(|data: &[u8]| {
    if data.len() < FRAME_HEADER_LEN {
        return;
    }
    let mut header_bytes = [0u8; FRAME_HEADER_LEN];
    header_bytes.copy_from_slice(&data[..FRAME_HEADER_LEN]);

    let header = match decode_frame_header(MAGIC, &header_bytes) {
        Ok(h) => h,
        Err(_) => return,
    };

    let payload = &data[FRAME_HEADER_LEN..];
    let _ = decode_message(header, payload, 1);
});
