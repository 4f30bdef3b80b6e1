//! Tagged channel multiplexing and envelope framing for realm transports.
//!
//! Several logical conversations share one physical transport by wrapping
//! every message in an envelope:
//!
//! ```text
//! { "type": <channel tag>, "data": <payload> }
//! ```
//!
//! [`Multiplexed`] filters inbound envelopes by tag so each conversation only
//! sees its own traffic. For byte-stream transports, envelopes are framed with
//! a 2-byte magic number ("RL") and a 4-byte little-endian payload length.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod multiplexed;
#[cfg(feature = "async")]
pub mod stream;

pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
#[cfg(feature = "async")]
pub use codec::EnvelopeCodec;
pub use envelope::Envelope;
pub use error::{FrameError, Result};
pub use multiplexed::Multiplexed;
#[cfg(feature = "async")]
pub use stream::{StreamTransport, CLOSE, MESSAGE_ERROR};
