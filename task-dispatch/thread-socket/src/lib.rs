// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod wire;
pub use wire::WireFrame;

mod socket_hub;
pub use socket_hub::{SocketCoordinator, SocketHub};

mod socket_endpoint;
pub use socket_endpoint::{SocketEndpoint, CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY};
