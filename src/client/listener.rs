use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::broker::Message;
use crate::transport::message::PubSubCommand;
use crate::utils::ClientError;

/// Client end of a pub/sub connection: sends subscribe/unsubscribe lines and
/// reads published messages, one per line.
pub struct TopicListener {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TopicListener {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.send(PubSubCommand::Subscribe(topic.to_string())).await
    }

    pub async fn unsubscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.send(PubSubCommand::Unsubscribe(topic.to_string())).await
    }

    async fn send(&mut self, command: PubSubCommand) -> Result<(), ClientError> {
        self.writer.write_all(command.to_line().as_bytes()).await?;
        Ok(())
    }

    /// Next published message, or `None` once the broker closes the stream.
    pub async fn next_message(&mut self) -> Result<Option<Message>, ClientError> {
        Ok(self.lines.next_line().await?.map(Message::from))
    }
}
