pub mod decoder;
pub mod link;
pub mod serial;

pub use decoder::{encode_frame, FrameDecoder, WireFrame, TYPE_DIFF, TYPE_SCREENSHOT};
pub use link::{FrameLink, KEEPALIVE};
pub use serial::{list_usb_ports, open_port, PortDescription};
