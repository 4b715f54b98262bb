use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Message, MAX_MESSAGE_SIZE};

/// Length-prefixed bincode framing shared by requests, responses and callbacks.
pub struct DstoreCodec;

impl DstoreCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode<M: Message>(msg: &M) -> ProtocolResult<Bytes> {
        let payload =
            bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
        buf.put_u32((payload.len() + 1) as u32);
        buf.put_u8(msg.type_tag());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode<M: Message>(data: &[u8]) -> ProtocolResult<(M, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::Framing("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        check_len(len)?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::Framing(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = decode_body(data[4], &data[5..total])?;
        Ok((msg, total))
    }

    /// Write one framed message and flush.
    pub async fn write_frame<W, M>(writer: &mut W, msg: &M) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin + Send,
        M: Message + Sync,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message. Returns `None` if the peer closed the stream
    /// cleanly before a new frame started.
    pub async fn read_frame<R, M>(reader: &mut R) -> ProtocolResult<Option<M>>
    where
        R: AsyncRead + Unpin + Send,
        M: Message,
    {
        let mut header = [0u8; 4];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes(header) as usize;
        check_len(len)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        decode_body(body[0], &body[1..]).map(Some)
    }
}

fn check_len(len: usize) -> ProtocolResult<()> {
    if len < 1 {
        return Err(ProtocolError::Framing("zero-length frame".into()));
    }
    if len - 1 > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len - 1,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

fn decode_body<M: Message>(tag: u8, payload: &[u8]) -> ProtocolResult<M> {
    let msg: M =
        bincode::deserialize(payload).map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    if msg.type_tag() != tag {
        return Err(ProtocolError::Framing(format!(
            "tag {tag} does not match {} ({})",
            msg.type_name(),
            msg.type_tag()
        )));
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message::{CallbackMessage, Request, Response};
    use dstore_types::{CallbackKey, GetBindingResults, NodeId, ReleaseKind};

    #[test]
    fn request_frame_roundtrip() {
        let msg = Request::GetBinding {
            node_id: NodeId::new(3),
            name: "players.alice".into(),
        };
        let encoded = DstoreCodec::encode(&msg).unwrap();
        assert_eq!(encoded[4], msg.type_tag());
        let (decoded, consumed) = DstoreCodec::decode::<Request>(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let first = DstoreCodec::encode(&Response::ObjectIds { first: 10 }).unwrap();
        let second = DstoreCodec::encode(&Response::Binding(GetBindingResults {
            found: false,
            next_name: None,
            oid: -1,
            callback_evict: false,
        }))
        .unwrap();
        let mut stream = first.to_vec();
        stream.extend_from_slice(&second);

        let (msg, consumed) = DstoreCodec::decode::<Response>(&stream).unwrap();
        assert_eq!(msg, Response::ObjectIds { first: 10 });
        assert_eq!(consumed, first.len());
        let (msg, _) = DstoreCodec::decode::<Response>(&stream[consumed..]).unwrap();
        assert_eq!(msg.type_name(), "Binding");
    }

    #[test]
    fn decode_truncated() {
        let err = DstoreCodec::decode::<Request>(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));

        let encoded = DstoreCodec::encode(&CallbackMessage::Ack).unwrap();
        let err = DstoreCodec::decode::<CallbackMessage>(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = DstoreCodec::decode::<Request>(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }

    #[test]
    fn oversized_frame_rejected_before_reading_body() {
        let mut data = ((MAX_MESSAGE_SIZE + 2) as u32).to_be_bytes().to_vec();
        data.push(1);
        let err = DstoreCodec::decode::<Request>(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn mismatched_tag_rejected() {
        let mut encoded = DstoreCodec::encode(&Request::NewObjectIds { count: 4 })
            .unwrap()
            .to_vec();
        encoded[4] = 99;
        let err = DstoreCodec::decode::<Request>(&encoded).unwrap_err();
        assert!(matches!(err, ProtocolError::Framing(_)));
    }

    #[tokio::test]
    async fn frames_over_a_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let release = CallbackMessage::Release {
            key: CallbackKey::Object(5),
            release: ReleaseKind::Evict,
        };
        DstoreCodec::write_frame(&mut client, &release).await.unwrap();
        let error = Response::Error {
            kind: ErrorKind::UnknownNode,
            message: "gone".into(),
        };
        DstoreCodec::write_frame(&mut server, &error).await.unwrap();

        let got: Option<CallbackMessage> = DstoreCodec::read_frame(&mut server).await.unwrap();
        assert_eq!(got, Some(release));
        let got: Option<Response> = DstoreCodec::read_frame(&mut client).await.unwrap();
        assert_eq!(got, Some(error));

        drop(client);
        let eof: Option<CallbackMessage> = DstoreCodec::read_frame(&mut server).await.unwrap();
        assert!(eof.is_none());
    }
}
