//! Built-in Kokoro voice list.
//!
//! Shipped as static defaults; never fetched from or checked against the
//! server.

pub const DEFAULT_VOICE: &str = "af_heart";

pub const VOICES: &[&str] = &[
    "af_heart",
    "af_bella",
    "af_nicole",
    "af_sarah",
    "af_sky",
    "am_adam",
    "am_michael",
    "bf_emma",
    "bf_isabella",
    "bm_george",
    "bm_lewis",
];
