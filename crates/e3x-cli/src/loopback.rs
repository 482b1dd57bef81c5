//! Two-party handshake and packet exchange over localhost UDP.
//!
//! The initiator knows the responder's public key up front. The responder
//! learns the initiator from its first handshake.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

use e3x_cipherset::{extract_csid, Csid, Key, Registry, State, Token};
use e3x_lob::Packet;

use crate::identity::Identity;

const MAX_DATAGRAM: usize = 2048;
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Options {
    pub at: u32,
    pub message: String,
}

/// Summary of a finished exchange.
#[derive(Debug)]
pub struct Report {
    pub csid: Csid,
    pub initiator_token: Token,
    pub responder_token: Token,
    pub request: String,
    pub reply: String,
}

/// Run the exchange between `initiator` and a freshly generated responder.
pub async fn run(registry: &Registry, initiator: &Identity, options: &Options) -> Result<Report> {
    let responder = Identity::generate(registry)?;
    let csid = registry
        .select(&responder.parts)
        .filter(|csid| initiator.key(*csid).is_some())
        .ok_or_else(|| anyhow!("no cipher set in common"))?;
    info!(%csid, "selected cipher set");

    let a_socket = UdpSocket::bind("127.0.0.1:0").await?;
    let b_socket = UdpSocket::bind("127.0.0.1:0").await?;
    let b_addr = b_socket.local_addr()?;
    info!(initiator = %a_socket.local_addr()?, responder = %b_addr, "sockets bound");

    let a_key = key_for(initiator, csid)?;
    let b_key = key_for(&responder, csid)?;

    let mut a_state = registry.new_state(a_key)?;
    a_state.set_remote_key(b_key)?;
    let mut b_state = registry.new_state(b_key)?;

    // initiator -> responder: handshake
    let hello = frame_handshake(csid, a_state.encrypt_handshake(options.at, &initiator.parts)?)?;
    a_socket.send_to(&hello, b_addr).await?;
    debug!(len = hello.len(), "initiator sent handshake");

    let (raw, a_addr) = recv(&b_socket).await?;
    accept_handshake(registry, b_key, b_state.as_mut(), &raw)?;
    info!(token = %Token::extract(&raw), "responder accepted handshake");

    // responder -> initiator: handshake
    let reply = frame_handshake(csid, b_state.encrypt_handshake(options.at, &responder.parts)?)?;
    b_socket.send_to(&reply, a_addr).await?;

    let (raw, _) = recv(&a_socket).await?;
    let at = accept_handshake(registry, a_key, a_state.as_mut(), &raw)?;
    info!(at, "initiator accepted handshake");

    // one packet each way
    send_packet(&a_socket, b_addr, a_state.as_ref(), &options.message).await?;
    let request = recv_packet(&b_socket, b_state.as_ref()).await?;
    info!(body = %request, "responder received packet");

    let echo = format!("ack: {}", request);
    send_packet(&b_socket, a_addr, b_state.as_ref(), &echo).await?;
    let reply = recv_packet(&a_socket, a_state.as_ref()).await?;
    info!(body = %reply, "initiator received packet");

    Ok(Report {
        csid,
        initiator_token: a_state.local_token().unwrap_or(Token::ZERO),
        responder_token: b_state.local_token().unwrap_or(Token::ZERO),
        request,
        reply,
    })
}

fn key_for(identity: &Identity, csid: Csid) -> Result<&dyn Key> {
    identity
        .key(csid)
        .ok_or_else(|| anyhow!("identity has no {} key", csid))
}

fn frame_handshake(csid: Csid, message: Vec<u8>) -> Result<Vec<u8>> {
    Ok(Packet::with_binary_header(vec![csid.0], message)
        .encode()?
        .to_vec())
}

/// Decrypt a framed handshake and apply it. Returns its `at`.
fn accept_handshake(
    registry: &Registry,
    local: &dyn Key,
    state: &mut dyn State,
    raw: &[u8],
) -> Result<u32> {
    let csid = extract_csid(raw).ok_or_else(|| anyhow!("not a handshake"))?;
    if csid != local.csid() {
        bail!("handshake for CSID {}, expected {}", csid, local.csid());
    }
    let framed = Packet::decode(raw)?;
    let handshake = registry
        .decrypt_handshake(local, framed.body())
        .context("decrypting handshake")?;
    let at = handshake.at;
    if !state.apply_handshake(handshake) {
        bail!("handshake rejected");
    }
    Ok(at)
}

async fn send_packet(
    socket: &UdpSocket,
    to: SocketAddr,
    state: &dyn State,
    text: &str,
) -> Result<()> {
    let mut inner = Packet::new(text.as_bytes().to_vec());
    inner.header_mut().set("type", "loopback");
    let sealed = state.encrypt_packet(&inner)?.encode()?;
    socket.send_to(&sealed, to).await?;
    debug!(len = sealed.len(), "sent line packet");
    Ok(())
}

async fn recv_packet(socket: &UdpSocket, state: &dyn State) -> Result<String> {
    let (raw, _) = recv(socket).await?;
    let token = Token::extract(&raw);
    if Some(token) != state.remote_token() {
        bail!("packet for unknown line {}", token);
    }
    let inner = state
        .decrypt_packet(&Packet::decode(&raw)?)
        .context("decrypting line packet")?;
    Ok(String::from_utf8_lossy(inner.body()).into_owned())
}

async fn recv(socket: &UdpSocket) -> Result<(Vec<u8>, SocketAddr)> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let (len, from) = match timeout(RECV_TIMEOUT, socket.recv_from(&mut buf)).await {
        Ok(received) => received?,
        Err(_) => bail!("timed out waiting on {}", socket.local_addr()?),
    };
    buf.truncate(len);
    Ok((buf, from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_exchange() {
        let registry = Registry::with_defaults();
        let initiator = Identity::generate(&registry).unwrap();
        let options = Options {
            at: 7,
            message: "hello".into(),
        };

        let report = run(&registry, &initiator, &options).await.unwrap();
        assert_eq!(report.csid, Csid::CS1A);
        assert_eq!(report.request, "hello");
        assert_eq!(report.reply, "ack: hello");
        assert_ne!(report.initiator_token, report.responder_token);
    }

    #[tokio::test]
    async fn test_public_only_identity_cannot_initiate() {
        let registry = Registry::with_defaults();
        let full = Identity::generate(&registry).unwrap();
        let mut file = full.to_file().unwrap();
        for pair in file.keys.values_mut() {
            pair.private.clear();
        }
        let public_only = Identity::from_file(&registry, &file).unwrap();

        let options = Options {
            at: 1,
            message: "x".into(),
        };
        assert!(run(&registry, &public_only, &options).await.is_err());
    }
}
