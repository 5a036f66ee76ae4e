//! Message protocol shared by every context
//!
//! Every message is an [`Envelope`]: `{ "id": <MessageId>, "data"?: <payload> }`.
//! Ids come from a closed registry, and each id belongs to exactly one
//! [`Direction`]. Payloads that carry no `id` at all are not part of this
//! protocol and are ignored by whoever receives them.

mod message;
mod payloads;
mod replies;

pub use message::{Direction, Envelope, MessageId, PageId, ProtocolError, Sender};
pub use payloads::{Ack, ClearUnseenRequest, ErrorReport, PageHello, RelayFailure, RelayReport, RunStateView, WarnReport};
pub use replies::{InjectReply, StatusReply, ToggleReply};
