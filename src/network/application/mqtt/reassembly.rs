//! Fixed-capacity reassembly of fragmented inbound publishes.
//!
//! Capacities are counted the way a C string buffer is: one byte is always
//! kept in reserve, so a topic may hold at most `MAX_TOPIC_SIZE - 2` bytes and
//! the payload at most `MAX_PAYLOAD_SIZE - 1` bytes. The rejection rules below
//! are part of the observable behaviour and must not be relaxed.

use super::error::CommError;
use heapless::{String, Vec};

/// Capacity of the topic buffer.
pub const MAX_TOPIC_SIZE: usize = 128;

/// Capacity of the payload buffer.
pub const MAX_PAYLOAD_SIZE: usize = 512;

const PAYLOAD_LIMIT: usize = MAX_PAYLOAD_SIZE - 1;

/// Topic and payload of the message currently being received.
#[derive(Debug)]
pub struct Reassembler {
    topic: String<MAX_TOPIC_SIZE>,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    new_message: bool,
}

impl Reassembler {
    /// Empty buffers, no message in flight.
    pub const fn new() -> Self {
        Self {
            topic: String::new(),
            payload: Vec::new(),
            new_message: false,
        }
    }

    /// Topic of the message in flight, empty between messages.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Bytes accumulated so far for the message in flight.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True only while a completed message is being dispatched.
    pub fn is_message_ready(&self) -> bool {
        self.new_message
    }

    /// Starts a new message.
    ///
    /// # Errors
    ///
    /// * [`CommError::TopicTooLong`] - `topic` is `MAX_TOPIC_SIZE - 1` bytes or
    ///   longer. The topic buffer and the payload state are left untouched.
    /// * [`CommError::PayloadTooLarge`] - `total_len` is `MAX_PAYLOAD_SIZE - 1`
    ///   or more. The topic is still recorded and the payload reset; later
    ///   fragments are checked one by one as usual.
    pub fn begin(&mut self, topic: &str, total_len: u32) -> Result<(), CommError> {
        if topic.len() >= MAX_TOPIC_SIZE - 1 {
            self.new_message = false;
            return Err(CommError::TopicTooLong);
        }

        self.topic.clear();
        self.topic
            .push_str(topic)
            .map_err(|_| CommError::TopicTooLong)?;

        self.payload.clear();
        self.new_message = false;

        if total_len as usize >= PAYLOAD_LIMIT {
            return Err(CommError::PayloadTooLarge);
        }
        Ok(())
    }

    /// Appends one fragment.
    ///
    /// When `last` is set the reassembler itself is handed to `dispatch`
    /// synchronously, with [`is_message_ready`](Self::is_message_ready) true
    /// for the duration of the call. The buffers and the flag are cleared
    /// afterwards and the closure's return value comes back as `Some`.
    /// Non-final fragments yield `None`.
    ///
    /// # Errors
    ///
    /// [`CommError::FragmentOverflow`] if the fragment does not fit in what is
    /// left of the payload buffer. The fragment is dropped, the accumulated
    /// state is unchanged, and nothing is dispatched even if `last` was set.
    pub fn push_fragment<R>(
        &mut self,
        data: &[u8],
        last: bool,
        dispatch: impl FnOnce(&Self) -> R,
    ) -> Result<Option<R>, CommError> {
        if self.payload.len() + data.len() > PAYLOAD_LIMIT {
            return Err(CommError::FragmentOverflow);
        }
        self.payload
            .extend_from_slice(data)
            .map_err(|_| CommError::FragmentOverflow)?;

        if !last {
            return Ok(None);
        }

        self.new_message = true;
        let outcome = dispatch(&*self);

        self.payload.clear();
        self.new_message = false;
        self.topic.clear();

        Ok(Some(outcome))
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
