//! Configuration and limits for the server.

use std::net::SocketAddr;
use std::time::Duration;

/// Resource limits applied per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a request header block in bytes, terminator included.
    ///
    /// Default: 8 KB (8192)
    pub max_header_size: usize,

    /// Maximum size of a request body in bytes.
    ///
    /// Default: None (unbounded)
    pub max_body_size: Option<usize>,

    /// Maximum payload size of a single inbound WebSocket frame.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of a reassembled WebSocket message.
    ///
    /// Default: 64 MB (64 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single WebSocket message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: 8192,
            max_body_size: None,
            max_frame_size: 16 * 1024 * 1024,   // 16 MB
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_fragment_count: 128,
        }
    }
}

impl Limits {
    /// Validate that a header block size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderTooLarge`](crate::Error::HeaderTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_header_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_header_size {
            Err(crate::Error::HeaderTooLarge {
                size,
                max: self.max_header_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a body size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyTooLarge`](crate::Error::BodyTooLarge) if a maximum is configured and `size` exceeds it.
    pub const fn check_body_size(&self, size: usize) -> Result<(), crate::Error> {
        match self.max_body_size {
            Some(max) if size > max => Err(crate::Error::BodyTooLarge { size, max }),
            _ => Ok(()),
        }
    }

    /// Validate that a frame payload size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    ///
    /// Default: 127.0.0.1:1234
    pub bind_addr: SocketAddr,

    /// Resource limits.
    pub limits: Limits,

    /// Read buffer reservation per socket read (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Time a connection may wait for the next bytes of a request.
    ///
    /// If `None`, connections may stay idle forever.
    /// Default: None
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 1234)),
            limits: Limits::default(),
            read_buffer_size: 8192,
            idle_timeout: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listener address.
    #[must_use]
    pub const fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum request body size.
    #[must_use]
    pub const fn with_max_body_size(mut self, size: usize) -> Self {
        self.limits.max_body_size = Some(size);
        self
    }
}
