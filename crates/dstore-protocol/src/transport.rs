//! Callback delivery over TCP.
//!
//! The server dials the address a node supplied at registration and sends a
//! [`CallbackMessage::Release`]; the node answers [`CallbackMessage::Ack`]
//! once it has dropped or relaxed the cached entry.

use async_trait::async_trait;
use dstore_types::{CallbackError, CallbackKey, CallbackServer, ReleaseKind};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::codec::DstoreCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{CallbackMessage, Message};

/// Callback endpoint of a remote node, reached by dialing its address.
///
/// Each request opens a fresh connection so a broken socket never outlives
/// one attempt. Timeouts belong to the caller.
#[derive(Clone, Debug)]
pub struct RemoteCallbackServer {
    addr: String,
}

impl RemoteCallbackServer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn exchange(&self, request: &CallbackMessage) -> ProtocolResult<CallbackMessage> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        DstoreCodec::write_frame(&mut stream, request).await?;
        DstoreCodec::read_frame(&mut stream)
            .await?
            .ok_or_else(|| ProtocolError::Framing("connection closed before reply".into()))
    }
}

#[async_trait]
impl CallbackServer for RemoteCallbackServer {
    fn identity(&self) -> &str {
        &self.addr
    }

    async fn request_release(
        &self,
        key: &CallbackKey,
        release: ReleaseKind,
    ) -> Result<(), CallbackError> {
        let request = CallbackMessage::Release {
            key: key.clone(),
            release,
        };
        match self.exchange(&request).await {
            Ok(CallbackMessage::Ack) => Ok(()),
            Ok(CallbackMessage::Refused { reason }) => Err(CallbackError::Refused(reason)),
            Ok(other) => Err(CallbackError::Protocol(format!(
                "unexpected {} reply",
                other.type_name()
            ))),
            Err(e) if e.is_transport() => Err(CallbackError::Unreachable(e.to_string())),
            Err(e) => Err(CallbackError::Protocol(e.to_string())),
        }
    }
}

/// Answer release callbacks arriving on `stream` with `handler` until the
/// server closes the connection.
pub async fn serve_callbacks<H>(mut stream: TcpStream, handler: &H) -> ProtocolResult<()>
where
    H: CallbackServer + ?Sized,
{
    while let Some(message) = DstoreCodec::read_frame::<_, CallbackMessage>(&mut stream).await? {
        let reply = match message {
            CallbackMessage::Release { key, release } => {
                debug!(%key, %release, "release callback received");
                match handler.request_release(&key, release).await {
                    Ok(()) => CallbackMessage::Ack,
                    Err(error) => {
                        warn!(%key, %error, "refusing release callback");
                        CallbackMessage::Refused {
                            reason: error.to_string(),
                        }
                    }
                }
            }
            other => CallbackMessage::Refused {
                reason: format!("unexpected {}", other.type_name()),
            },
        };
        DstoreCodec::write_frame(&mut stream, &reply).await?;
    }
    Ok(())
}
