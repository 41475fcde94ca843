//! Wire messages and length-prefixed framing.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! bincode-encoded [`Message`].

use crate::error::{NetworkError, Result};
use powchain_core::{Block, Hash, Transaction};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Messages exchanged between nodes.
///
/// Gossip variants carry the sender's listen address so receivers can
/// skip it when relaying. Clients that are not peers leave it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    NewBlock { from: String, block: Block },
    NewTransaction { from: String, tx: Transaction },
    HeadQuery,
    Head { number: u64, hash: Hash },
    /// Canonical blocks in `[from, to]`.
    BlockRangeRequest { from: u64, to: u64 },
    Blocks(Vec<Block>),
    Ack,
    Error(String),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::NewBlock { .. } => "new_block",
            Message::NewTransaction { .. } => "new_transaction",
            Message::HeadQuery => "head_query",
            Message::Head { .. } => "head",
            Message::BlockRangeRequest { .. } => "block_range_request",
            Message::Blocks(_) => "blocks",
            Message::Ack => "ack",
            Message::Error(_) => "error",
        }
    }
}

pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = message.encode()?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. A stream that ends before the length prefix yields
/// [`NetworkError::Closed`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len = [0u8; 4];
    match reader.read_exact(&mut len).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(NetworkError::Closed),
        Err(e) => return Err(e.into()),
    }
    let size = u32::from_be_bytes(len) as usize;
    if size > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Message::decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_core::{Address, Keypair};

    #[tokio::test]
    async fn test_frames_in_sequence() {
        let keypair = Keypair::generate();
        let tx = Transaction::transfer(keypair.address(), Address([7; 20]), 5u64, 1u64, 0)
            .signed(&keypair);
        let messages = vec![
            Message::NewTransaction {
                from: "127.0.0.1:6060".into(),
                tx,
            },
            Message::NewBlock {
                from: "127.0.0.1:6060".into(),
                block: Block::genesis(vec![1, 2, 3]),
            },
            Message::Head {
                number: 9,
                hash: Hash([3; 32]),
            },
            Message::Ack,
        ];

        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        for message in &messages {
            write_frame(&mut client, message).await.unwrap();
        }
        drop(client);

        for expected in &messages {
            assert_eq!(&read_frame(&mut server).await.unwrap(), expected);
        }
        assert!(matches!(read_frame(&mut server).await, Err(NetworkError::Closed)));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes())
            .await
            .unwrap();

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(NetworkError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_garbage_body_is_codec_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&3u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0xFF, 0xFF, 0xFF]).await.unwrap();

        assert!(matches!(read_frame(&mut server).await, Err(NetworkError::Codec(_))));
    }

    #[test]
    fn test_kind() {
        assert_eq!(Message::HeadQuery.kind(), "head_query");
        assert_eq!(Message::Blocks(vec![]).kind(), "blocks");
    }
}
