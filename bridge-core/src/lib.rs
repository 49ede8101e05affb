#![forbid(unsafe_code)]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod publish;
pub mod scan;
pub mod session;
pub mod tcp;
pub mod template;

pub use catalog::{FieldDesc, FieldType, FieldValue, MqttTemplate, PacketCatalog, PacketDesc};
pub use codec::{FrameBuffer, FrameError};
pub use config::{load_from_path, Config};
pub use error::{BridgeError, Result};
pub use publish::{PublishError, PublishOutcome, PublishSink};
pub use scan::{scan, FieldView};
pub use session::SessionProcessor;
