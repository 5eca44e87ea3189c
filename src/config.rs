use std::time::Duration;

use ntex_util::time::Seconds;

use crate::{consts, frame::Setting, frame::WindowSize};

#[derive(Copy, Clone, Debug)]
/// Http/2 session configuration
pub struct Config {
    /// Maximum number of remote initiated streams
    pub(crate) max_concurrent_streams: u32,
    /// Initial window size of streams, advertised when set
    pub(crate) initial_window_sz: Option<WindowSize>,
    /// Max header list size, advertised when set
    pub(crate) max_header_list_size: Option<u32>,
    /// Receive idle timeout
    pub(crate) recv_timeout: Seconds,
    /// Blocked send timeout
    pub(crate) send_timeout: Seconds,
    /// Time to wait for SETTINGS ack
    pub(crate) settings_timeout: Seconds,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    /// Create configuration
    pub fn new() -> Self {
        Config {
            max_concurrent_streams: consts::DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_sz: None,
            max_header_list_size: None,
            recv_timeout: consts::DEFAULT_RECV_TIMEOUT,
            send_timeout: consts::DEFAULT_SEND_TIMEOUT,
            settings_timeout: consts::DEFAULT_SETTINGS_TIMEOUT,
        }
    }

    /// Sets the maximum number of concurrent streams.
    ///
    /// The maximum concurrent streams setting only controls the maximum number
    /// of streams that can be initiated by the remote peer.
    ///
    /// By default value is set to 100.
    pub fn set_max_concurrent_streams(mut self, max: u32) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    /// Indicates the initial window size (in octets) for stream-level
    /// flow control for received data.
    ///
    /// The value is sent to the peer in the initial SETTINGS frame. If it is
    /// not set, the protocol default of 65,535 is in effect.
    ///
    /// # Panics
    ///
    /// This function panics if `size` exceeds 2^31-1.
    pub fn set_initial_window_size(mut self, size: WindowSize) -> Self {
        assert!(size <= consts::MAX_WINDOW_SIZE);
        self.initial_window_sz = Some(size);
        self
    }

    /// Sets the max size of received header list.
    ///
    /// This advisory setting informs a peer of the maximum size of header list
    /// that the sender is prepared to accept, in octets.
    pub fn set_max_header_list_size(mut self, max: u32) -> Self {
        self.max_header_list_size = Some(max);
        self
    }

    /// Set receive idle timeout.
    ///
    /// A stream is reset if the peer does not send anything on it for this
    /// long while more request input is expected.
    ///
    /// By default timeout is 60 seconds.
    pub fn set_recv_timeout(mut self, timeout: Seconds) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set blocked send timeout.
    ///
    /// A stream is reset if the peer keeps its flow-control window closed for
    /// this long while we have data to send.
    ///
    /// By default timeout is 60 seconds.
    pub fn set_send_timeout(mut self, timeout: Seconds) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set SETTINGS ack timeout.
    ///
    /// Connection is terminated with `SETTINGS_TIMEOUT` if the peer does not
    /// acknowledge the server SETTINGS in time.
    ///
    /// By default timeout is 10 seconds.
    pub fn set_settings_timeout(mut self, timeout: Seconds) -> Self {
        self.settings_timeout = timeout;
        self
    }

    pub(crate) fn recv_delay(&self) -> Duration {
        self.recv_timeout.into()
    }

    pub(crate) fn send_delay(&self) -> Duration {
        self.send_timeout.into()
    }

    pub(crate) fn settings_delay(&self) -> Duration {
        self.settings_timeout.into()
    }

    /// Server SETTINGS entries
    pub(crate) fn settings(&self) -> Vec<Setting> {
        let mut settings = vec![Setting::MaxConcurrentStreams(self.max_concurrent_streams)];
        if let Some(sz) = self.initial_window_sz {
            settings.push(Setting::InitialWindowSize(sz));
        }
        if let Some(max) = self.max_header_list_size {
            settings.push(Setting::MaxHeaderListSize(max));
        }
        settings
    }
}
