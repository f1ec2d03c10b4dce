#![forbid(unsafe_code)]
//! maildesk_lib — local SMTP receiving endpoint plus outbound delivery.
//!
//! The crate exposes four building blocks: syntactic [`validator`] checks,
//! the [`message`] builder with its MIME wire format, the [`inbound`]
//! listener feeding a [`store::MailStore`], and the [`delivery`] engines
//! (local relay, direct-to-MX, authenticated relay).

pub mod delivery;
pub mod inbound;
pub mod message;
pub mod store;
pub mod validator;

pub use delivery::{
    Credentials, DeliveryError, DeliveryOutcome, DirectSendOptions, DirectSendReport, OutcomeKind,
    RelayOptions, RelayReceipt, SendOutcome, Strategy, send, send_authenticated, send_direct,
    send_local,
};
pub use inbound::{InboundError, Listener, ListenerEvent, ListenerState};
pub use message::{Attachment, BuildError, Message, MessageBuilder};
pub use store::{MailStore, ReceivedRecord};
pub use validator::{
    AddressList, PortError, validate_address, validate_address_list, validate_port,
};
