//! Per-connection task: reads command lines, writes queued output.
//!
//! Each session runs a reader loop and a writer task. Parsed commands become
//! [`GameEvent`]s on the tick loop's channel. When either side ends, or the
//! registry evicts a client that stopped reading, the session is removed from
//! the registry and from the world exactly once.

use crate::client_manager::ClientManager;
use crate::world::{GameEvent, WorldStore};
use log::{debug, info, warn};
use shared::{ClientCommand, MAX_LINE_LEN};
use std::io;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{mpsc, Notify, RwLock};

/// Everything a session needs besides its socket halves.
#[derive(Clone)]
pub struct SessionContext {
    pub player_id: u32,
    pub events: mpsc::Sender<GameEvent>,
    pub clients: Arc<RwLock<ClientManager>>,
    pub world: WorldStore,
    /// Notified by the registry when this client's queue overflows
    pub evicted: Arc<Notify>,
}

/// One read from the client
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line(String),
    /// Longer than [`MAX_LINE_LEN`]; the rest of it was discarded
    Oversized,
    Eof,
}

pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    outbound: mpsc::Receiver<String>,
    ctx: SessionContext,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let player_id = ctx.player_id;
    let mut writer_task = tokio::spawn(write_lines(writer, outbound));
    let mut reader = BufReader::new(reader);

    loop {
        tokio::select! {
            read = read_capped_line(&mut reader, MAX_LINE_LEN) => match read {
                Ok(LineRead::Line(line)) => {
                    if !forward_line(&ctx, &line).await {
                        break;
                    }
                }
                Ok(LineRead::Oversized) => {
                    debug!("Ignoring oversized line from client {}", player_id);
                }
                Ok(LineRead::Eof) => {
                    info!("Client {} closed the connection", player_id);
                    break;
                }
                Err(e) => {
                    warn!("Read error from client {}: {}", player_id, e);
                    break;
                }
            },
            result = &mut writer_task => {
                match result {
                    Ok(Err(e)) => warn!("Write error to client {}: {}", player_id, e),
                    Err(e) => warn!("Writer task for client {} failed: {}", player_id, e),
                    Ok(Ok(())) => debug!("Writer for client {} finished", player_id),
                }
                break;
            }
            _ = ctx.evicted.notified() => {
                warn!("Client {} stopped reading, closing session", player_id);
                break;
            }
        }
    }

    disconnect_cleanup(&ctx).await;
    writer_task.abort();
}

/// Reads one newline-terminated line, buffering at most `max_len + 1` bytes.
///
/// Invalid UTF-8 is replaced rather than treated as a read error, so such a
/// line is simply not a command.
async fn read_capped_line<R>(reader: &mut R, max_len: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(max_len as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > max_len {
        discard_rest_of_line(reader).await?;
        return Ok(LineRead::Oversized);
    }

    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}

/// Skips input up to and including the next newline, or to end of stream.
async fn discard_rest_of_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, found) = {
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok(());
            }
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (chunk.len(), false),
            }
        };
        reader.consume(consumed);
        if found {
            return Ok(());
        }
    }
}

/// Queues the event for a recognized line. Returns false once the tick loop
/// has stopped accepting events.
async fn forward_line(ctx: &SessionContext, line: &str) -> bool {
    let Some(command) = ClientCommand::parse(line) else {
        debug!("Ignoring line from client {}: {:?}", ctx.player_id, line);
        return true;
    };

    let event = GameEvent::from_command(ctx.player_id, command);
    if ctx.events.send(event).await.is_err() {
        warn!("Tick loop stopped, closing client {}", ctx.player_id);
        return false;
    }
    true
}

/// Writes each queued line followed by a newline until the queue closes.
pub async fn write_lines<W>(mut writer: W, mut outbound: mpsc::Receiver<String>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = outbound.recv().await {
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Removes the session from the registry and its player from the world.
///
/// The registry write lock is held across both removals so a reconnect
/// cannot claim the slot in between. Returns false if another path already
/// cleaned this session up.
pub async fn disconnect_cleanup(ctx: &SessionContext) -> bool {
    let mut clients = ctx.clients.write().await;
    if !clients.remove_client(&ctx.player_id) {
        return false;
    }

    ctx.world.remove_player(ctx.player_id).await;
    true
}
