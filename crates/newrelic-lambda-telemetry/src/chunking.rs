//! Chunking policy for size-limited log destinations.
//!
//! CloudWatch Logs rejects events over 256 KiB, so a payload bound for it is
//! split into ordered segments that each travel in their own envelope. There
//! is no chunk index: the log processor reassembles by concatenating chunks
//! in arrival order.

use crate::config::Config;
use crate::encoder::EncodedPayload;
use std::num::NonZeroUsize;

/// Default chunk ceiling. Leaves headroom under the 256 KiB CloudWatch Logs
/// event limit for the envelope and the Lambda log line prefix.
pub const DEFAULT_CHUNK_CEILING: usize = 255 * 1024;

/// How an encoded payload is split before being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPolicy {
    /// Emit the payload as a single envelope.
    #[default]
    Unlimited,
    /// Split the payload into segments of at most this many bytes.
    Ceiling(NonZeroUsize),
}

impl ChunkPolicy {
    /// Creates a policy with the given ceiling; zero disables chunking.
    pub fn ceiling(bytes: usize) -> Self {
        NonZeroUsize::new(bytes).map_or(Self::Unlimited, Self::Ceiling)
    }

    /// Derives the stdout chunking policy from configuration.
    pub fn from_config(config: &Config) -> Self {
        if config.to_cloudwatch_mode {
            Self::ceiling(config.cloudwatch_chunk_size)
        } else {
            Self::Unlimited
        }
    }

    /// Splits a payload into ordered chunks.
    ///
    /// Always yields at least one chunk, even for an empty payload.
    pub fn split<'a>(&self, payload: &'a EncodedPayload) -> Chunks<'a> {
        Chunks {
            remaining: Some(payload.as_str()),
            ceiling: match self {
                Self::Unlimited => None,
                Self::Ceiling(limit) => Some(limit.get()),
            },
        }
    }
}

/// Iterator over the chunks of an encoded payload.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    remaining: Option<&'a str>,
    ceiling: Option<usize>,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.remaining?;

        match self.ceiling {
            Some(limit) if rest.len() > limit => {
                // EncodedPayload is ASCII, so every offset is a char boundary.
                let (head, tail) = rest.split_at(limit);
                self.remaining = Some(tail);
                Some(head)
            }
            _ => {
                self.remaining = None;
                Some(rest)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = match (self.remaining, self.ceiling) {
            (None, _) => 0,
            (Some(rest), Some(limit)) if rest.len() > limit => rest.len().div_ceil(limit),
            (Some(_), _) => 1,
        };
        (count, Some(count))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
