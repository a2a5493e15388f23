//! Byte-stream framings used to carry gateway frames over socket or serial
//! links to the underlying mesh daemons.

pub mod hdlc;
pub mod stream;
