pub mod bridge;
pub mod cursor;
pub mod fallback;
pub mod protocol;
pub mod token;

pub use bridge::{BridgeEvent, CredentialProvider, StaticCredential, StreamBridge};
pub use cursor::SentTextCursor;
pub use fallback::FallbackSynth;
pub use protocol::{parse_server_frame, ClientFrame, ServerFrame};
