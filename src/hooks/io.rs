//! Stock stream protocols.
//!
//! `IOBase` requires `close`; the stream kinds add `read`, `write`, or
//! `seek` and `tell`, and the combined kinds inherit from several of them.

use super::HookedAbc;
use std::sync::Arc;

/// The stock stream ABCs.
#[derive(Debug, Clone)]
pub struct IoProtocols {
    pub io_base: Arc<HookedAbc>,
    pub input_stream: Arc<HookedAbc>,
    pub output_stream: Arc<HookedAbc>,
    pub seekable_stream: Arc<HookedAbc>,
    pub seekable_input_stream: Arc<HookedAbc>,
    pub seekable_output_stream: Arc<HookedAbc>,
    pub io_stream: Arc<HookedAbc>,
    pub seekable_io_stream: Arc<HookedAbc>,
}

impl IoProtocols {
    pub fn new() -> Self {
        let io_base = HookedAbc::builder("IOBase").hooks(["close"]).build();
        let input_stream = HookedAbc::builder("InputStream")
            .extends(&io_base)
            .hooks(["read"])
            .build();
        let output_stream = HookedAbc::builder("OutputStream")
            .extends(&io_base)
            .hooks(["write"])
            .build();
        let seekable_stream = HookedAbc::builder("SeekableStream")
            .extends(&io_base)
            .hooks(["seek", "tell"])
            .build();
        let seekable_input_stream = HookedAbc::builder("SeekableInputStream")
            .extends(&input_stream)
            .extends(&seekable_stream)
            .build();
        let seekable_output_stream = HookedAbc::builder("SeekableOutputStream")
            .extends(&output_stream)
            .extends(&seekable_stream)
            .build();
        let io_stream = HookedAbc::builder("IOStream")
            .extends(&input_stream)
            .extends(&output_stream)
            .build();
        let seekable_io_stream = HookedAbc::builder("SeekableIOStream")
            .extends(&seekable_input_stream)
            .extends(&seekable_output_stream)
            .build();

        IoProtocols {
            io_base,
            input_stream,
            output_stream,
            seekable_stream,
            seekable_input_stream,
            seekable_output_stream,
            io_stream,
            seekable_io_stream,
        }
    }
}

impl Default for IoProtocols {
    fn default() -> Self {
        Self::new()
    }
}
