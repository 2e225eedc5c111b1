//! Control protocol between query client and server
//!
//! One long-lived byte stream carries length-prefixed `bincode` frames. The
//! client sends [`ClientFrame`]s and the server answers with [`ServerFrame`]s;
//! a category request is answered by exactly three frames (size, payload,
//! count) and every pause or unpause is acknowledged.

pub mod channel;
pub mod frame;
pub mod wire;

pub use channel::{ControlChannel, QueryResponse};
pub use frame::{ClientFrame, ServerFrame};
pub use wire::{read_frame, write_frame, FrameReader, FrameWriter, FRAME_HEADER_SIZE};
