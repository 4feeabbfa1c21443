use crate::{client::ClientImpl, Client, HeaderFn, HeaderPair};
use parking_lot::Mutex;
use stable_vec::StableVec;
use std::{sync::Arc, time::Duration};

const DEFAULT_CAPACITY: usize = 16;
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ClientBuilder {
    http: Option<reqwest::Client>,
    extra_headers: Option<HeaderFn>,
    capacity: usize,
    ack_timeout: Duration
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            http: None,
            extra_headers: None,
            capacity: DEFAULT_CAPACITY,
            ack_timeout: DEFAULT_ACK_TIMEOUT
        }
    }

    /// Headers added to every request, evaluated each time a feed is opened. Headers set on
    /// the request itself are sent after these.
    pub fn with_extra_headers<F: Fn() -> Vec<HeaderPair> + Send + Sync + 'static>(
        mut self,
        header_fn: F
    ) -> Self {
        self.extra_headers = Some(Arc::new(header_fn));
        self
    }

    /// Use a preconfigured HTTP client, e.g. one with a proxy or custom timeouts.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// How many socket events may be buffered before the connection stops reading.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// How long to wait for `connection_ack` after opening a socket.
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn build(self) -> Client {
        let client = ClientImpl {
            http: self.http.unwrap_or_default(),
            extra_headers: self.extra_headers,
            capacity: self.capacity,
            ack_timeout: self.ack_timeout,
            active_feeds: Arc::new(Mutex::new(StableVec::new()))
        };

        Client(Arc::new(client))
    }
}
