//! FailingHttp: every exchange fails with a canned dependency error.

use crate::effect::HttpRequest;
use crate::error::HttpFailure;
use crate::output::HttpResponse;
use crate::runner::HttpRunner;
use async_trait::async_trait;

/// An [`HttpRunner`] whose client always fails, e.g. with a connection reset.
pub struct FailingHttp {
    failure: HttpFailure,
}

impl FailingHttp {
    /// Fail every request with `failure`.
    pub fn new(failure: HttpFailure) -> Self {
        Self { failure }
    }

    /// Fail every request as a peer connection reset.
    pub fn connection_reset() -> Self {
        Self::new(HttpFailure::Connection("connection reset by peer".into()))
    }
}

#[async_trait]
impl HttpRunner for FailingHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        request.check()?;
        Err(self.failure.clone())
    }
}
