//! Local HTTP stub for exercising the blocking clients. The mock server
//! runs on its own runtime so the test thread stays free to block.

use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer};

pub struct StubServer {
    server: MockServer,
    runtime: Runtime,
}

impl StubServer {
    pub fn start() -> Self {
        let runtime = Runtime::new().expect("test runtime");
        let server = runtime.block_on(MockServer::start());
        StubServer { server, runtime }
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }
}
